use super::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// How a union combines the scores of the children matching the current
/// document.
#[derive(Clone, Copy, Debug)]
pub enum OrScoring {
    /// Plain sum of the matching children's scores.
    Sum,
    /// Sum, multiplied by `1 + factor * (matching_children - 1)`:
    /// documents matching more sub-queries get a bonus.
    CountBonus(f32),
}

/// Shared mechanics of the union-shaped matchers: tracks the minimum
/// current document across the active children.
struct UnionCore {
    children: Vec<Box<dyn Matcher>>,
    current: DocId,
    active: bool,
}

impl UnionCore {
    fn new(children: Vec<Box<dyn Matcher>>) -> UnionCore {
        let mut core = UnionCore {
            children,
            current: 0,
            active: true,
        };
        core.recompute_current();
        core
    }

    fn recompute_current(&mut self) {
        let mut min_doc: Option<DocId> = None;
        for child in &self.children {
            if child.is_active() {
                let doc = child.doc();
                min_doc = Some(min_doc.map(|min| min.min(doc)).unwrap_or(doc));
            }
        }
        match min_doc {
            Some(doc) => {
                self.current = doc;
                self.active = true;
            }
            None => {
                self.active = false;
            }
        }
    }

    /// Number of children aligned on the current document.
    fn matched_count(&self) -> usize {
        self.children
            .iter()
            .filter(|child| child.is_active() && child.doc() == self.current)
            .count()
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        let current = self.current;
        for child in self.children.iter_mut() {
            if child.is_active() && child.doc() == current {
                child.advance();
            }
        }
        self.recompute_current();
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        for child in self.children.iter_mut() {
            if child.is_active() && child.doc() < target {
                child.skip_to(target);
            }
        }
        self.recompute_current();
        self.active
    }

    /// Sum and max of the scores of the children aligned on the current
    /// document, with the matched count.
    fn aligned_scores(&mut self) -> (Score, Score, usize) {
        let current = self.current;
        let mut sum = 0.0;
        let mut max = std::f32::NEG_INFINITY;
        let mut count = 0usize;
        for child in self.children.iter_mut() {
            if child.is_active() && child.doc() == current {
                let score = child.score();
                sum += score;
                max = max.max(score);
                count += 1;
            }
        }
        (sum, max, count)
    }

    fn supports_block_quality(&self) -> bool {
        self.children
            .iter()
            .all(|child| child.supports_block_quality())
    }

    /// Sum of the active children's block bounds: an upper bound on any
    /// union score in the current blocks.
    fn block_max_sum(&mut self) -> Score {
        self.children
            .iter_mut()
            .filter(|child| child.is_active())
            .map(|child| child.block_max_score())
            .sum()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.advance() {
            return false;
        }
        // any document's score is at most the sum of the active
        // children's current block bounds; advancing keeps that cap
        // valid, so this never skips a document that could beat the
        // threshold.
        while self.active && self.block_max_sum() <= threshold {
            if !self.advance() {
                return false;
            }
        }
        self.active
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        for child in &self.children {
            child.matching_terms(doc, terms);
        }
    }
}

/// Union of several matchers: a document matches iff at least
/// `minimum_match` children match it.
pub struct UnionMatcher {
    core: UnionCore,
    minimum_match: usize,
    scoring: OrScoring,
}

impl UnionMatcher {
    pub fn new(children: Vec<Box<dyn Matcher>>, scoring: OrScoring) -> UnionMatcher {
        UnionMatcher::with_minimum_match(children, scoring, 1)
    }

    pub fn with_minimum_match(
        children: Vec<Box<dyn Matcher>>,
        scoring: OrScoring,
        minimum_match: usize,
    ) -> UnionMatcher {
        let mut matcher = UnionMatcher {
            core: UnionCore::new(children),
            minimum_match: minimum_match.max(1),
            scoring,
        };
        matcher.ensure_minimum_match();
        matcher
    }

    fn ensure_minimum_match(&mut self) {
        while self.core.active && self.core.matched_count() < self.minimum_match {
            self.core.advance();
        }
    }
}

impl Matcher for UnionMatcher {
    fn is_active(&self) -> bool {
        self.core.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.core.active);
        self.core.current
    }

    fn advance(&mut self) -> bool {
        self.core.advance();
        self.ensure_minimum_match();
        self.core.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.core.skip_to(target);
        self.ensure_minimum_match();
        self.core.active
    }

    fn weight(&self) -> f32 {
        let current = self.core.current;
        self.core
            .children
            .iter()
            .filter(|child| child.is_active() && child.doc() == current)
            .map(|child| child.weight())
            .sum()
    }

    fn score(&mut self) -> Score {
        let (sum, _max, count) = self.core.aligned_scores();
        match self.scoring {
            OrScoring::Sum => sum,
            OrScoring::CountBonus(factor) => sum * (1.0 + factor * (count as f32 - 1.0)),
        }
    }

    fn supports_block_quality(&self) -> bool {
        match self.scoring {
            // the bonus factor scales with the matched count, which the
            // block bound does not account for.
            OrScoring::CountBonus(_) => false,
            OrScoring::Sum => self.core.supports_block_quality(),
        }
    }

    fn block_max_score(&mut self) -> Score {
        match self.scoring {
            OrScoring::Sum => self.core.block_max_sum(),
            OrScoring::CountBonus(_) => std::f32::INFINITY,
        }
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        match self.scoring {
            OrScoring::Sum => {
                let alive = self.core.skip_to_quality(threshold);
                if alive {
                    self.ensure_minimum_match();
                }
                self.core.active
            }
            OrScoring::CountBonus(_) => self.advance(),
        }
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.core.matching_terms(doc, terms);
    }
}

/// Union scored as `max + tie_break_factor * (sum - max)`.
pub struct DisjunctionMaxMatcher {
    core: UnionCore,
    tie_break_factor: f32,
}

impl DisjunctionMaxMatcher {
    pub fn new(children: Vec<Box<dyn Matcher>>, tie_break_factor: f32) -> DisjunctionMaxMatcher {
        DisjunctionMaxMatcher {
            core: UnionCore::new(children),
            tie_break_factor,
        }
    }
}

impl Matcher for DisjunctionMaxMatcher {
    fn is_active(&self) -> bool {
        self.core.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.core.active);
        self.core.current
    }

    fn advance(&mut self) -> bool {
        self.core.advance()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.core.skip_to(target)
    }

    fn score(&mut self) -> Score {
        let (sum, max, _count) = self.core.aligned_scores();
        max + self.tie_break_factor * (sum - max)
    }

    fn supports_block_quality(&self) -> bool {
        self.core.supports_block_quality()
    }

    fn block_max_score(&mut self) -> Score {
        // sum bounds the dis-max combination for any tie factor in [0, 1]
        self.core.block_max_sum()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        self.core.skip_to_quality(threshold)
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.core.matching_terms(doc, terms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    fn boxed(entries: Vec<(DocId, Score)>) -> Box<dyn Matcher> {
        Box::new(VecMatcher::new(entries))
    }

    #[test]
    fn test_union() {
        let mut union = UnionMatcher::new(
            vec![
                boxed(vec![(1, 1.0), (4, 1.0)]),
                boxed(vec![(1, 2.0), (2, 1.0), (9, 1.0)]),
            ],
            OrScoring::Sum,
        );
        let results = drain_matcher(&mut union);
        assert_eq!(results, vec![(1, 3.0), (2, 1.0), (4, 1.0), (9, 1.0)]);
    }

    #[test]
    fn test_union_minimum_match() {
        let mut union = UnionMatcher::with_minimum_match(
            vec![
                boxed(vec![(1, 1.0), (4, 1.0), (7, 1.0)]),
                boxed(vec![(1, 1.0), (2, 1.0), (7, 1.0)]),
                boxed(vec![(2, 1.0), (7, 1.0)]),
            ],
            OrScoring::Sum,
            2,
        );
        let docs: Vec<DocId> = drain_matcher(&mut union)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![1, 2, 7]);
    }

    #[test]
    fn test_union_count_bonus() {
        let mut union = UnionMatcher::new(
            vec![boxed(vec![(1, 1.0), (2, 1.0)]), boxed(vec![(2, 1.0)])],
            OrScoring::CountBonus(0.5),
        );
        let results = drain_matcher(&mut union);
        assert_eq!(results, vec![(1, 1.0), (2, 3.0)]);
    }

    #[test]
    fn test_union_skip_to() {
        let mut union = UnionMatcher::new(
            vec![boxed(vec![(1, 1.0), (8, 1.0)]), boxed(vec![(3, 1.0), (12, 1.0)])],
            OrScoring::Sum,
        );
        assert!(union.skip_to(4));
        assert_eq!(union.doc(), 8);
        assert!(union.skip_to(9));
        assert_eq!(union.doc(), 12);
        assert!(!union.advance());
    }

    #[test]
    fn test_disjunction_max() {
        let mut dismax = DisjunctionMaxMatcher::new(
            vec![boxed(vec![(1, 2.0), (3, 1.0)]), boxed(vec![(1, 1.0)])],
            0.5,
        );
        let results = drain_matcher(&mut dismax);
        assert_eq!(results, vec![(1, 2.5), (3, 1.0)]);
    }
}
