use super::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// Intersection of several matchers: a document matches iff every child
/// matches it. Scores are summed.
pub struct IntersectionMatcher {
    children: Vec<Box<dyn Matcher>>,
    active: bool,
}

impl IntersectionMatcher {
    pub fn new(children: Vec<Box<dyn Matcher>>) -> IntersectionMatcher {
        assert!(!children.is_empty());
        let mut matcher = IntersectionMatcher {
            active: children.iter().all(Matcher::is_active),
            children,
        };
        matcher.align();
        matcher
    }

    /// Leapfrog: repeatedly advance the lagging children to the current
    /// maximum until all children agree on one document.
    fn align(&mut self) {
        if !self.active {
            return;
        }
        let mut candidate = self
            .children
            .iter()
            .map(|child| child.doc())
            .max()
            .expect("at least one child");
        'outer: loop {
            for child in self.children.iter_mut() {
                if child.doc() < candidate {
                    if !child.skip_to(candidate) {
                        self.active = false;
                        return;
                    }
                    if child.doc() > candidate {
                        candidate = child.doc();
                        continue 'outer;
                    }
                }
            }
            return;
        }
    }
}

impl Matcher for IntersectionMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.active);
        self.children[0].doc()
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        if !self.children[0].advance() {
            self.active = false;
            return false;
        }
        self.align();
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        if !self.children[0].skip_to(target) {
            self.active = false;
            return false;
        }
        self.align();
        self.active
    }

    fn weight(&self) -> f32 {
        self.children.iter().map(|child| child.weight()).sum()
    }

    fn score(&mut self) -> Score {
        self.children.iter_mut().map(|child| child.score()).sum()
    }

    fn supports_block_quality(&self) -> bool {
        self.children
            .iter()
            .all(|child| child.supports_block_quality())
    }

    fn block_max_score(&mut self) -> Score {
        self.children
            .iter_mut()
            .map(|child| child.block_max_score())
            .sum()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.advance() {
            return false;
        }
        // the current document is covered by every child's current
        // block, so the sum of the block bounds caps its score; skip
        // documents while that cap cannot beat the threshold.
        while self.active && self.block_max_score() <= threshold {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::test_helpers::VecMatcher;
    use crate::matcher::drain_matcher;

    fn intersection_of(lists: Vec<Vec<DocId>>) -> Vec<DocId> {
        let children: Vec<Box<dyn Matcher>> = lists
            .into_iter()
            .map(|docs| Box::new(VecMatcher::from_docs(&docs)) as Box<dyn Matcher>)
            .collect();
        drain_matcher(&mut IntersectionMatcher::new(children))
            .into_iter()
            .map(|(doc, _)| doc)
            .collect()
    }

    #[test]
    fn test_intersection() {
        assert_eq!(
            intersection_of(vec![vec![1, 3, 9], vec![3, 4, 9, 18]]),
            vec![3, 9]
        );
        assert_eq!(
            intersection_of(vec![vec![1, 3, 9], vec![3, 4, 9, 18], vec![1, 5, 9, 111]]),
            vec![9]
        );
        assert_eq!(intersection_of(vec![vec![1, 2], vec![5, 6]]), Vec::<DocId>::new());
    }

    #[test]
    fn test_intersection_skip_to() {
        let children: Vec<Box<dyn Matcher>> = vec![
            Box::new(VecMatcher::from_docs(&[1, 3, 7, 9, 102])),
            Box::new(VecMatcher::from_docs(&[1, 2, 7, 9, 100, 102])),
        ];
        let mut intersection = IntersectionMatcher::new(children);
        assert_eq!(intersection.doc(), 1);
        assert!(intersection.skip_to(5));
        assert_eq!(intersection.doc(), 7);
        assert!(intersection.skip_to(100));
        assert_eq!(intersection.doc(), 102);
        assert!(!intersection.advance());
    }

    #[test]
    fn test_intersection_scores_sum() {
        let children: Vec<Box<dyn Matcher>> = vec![
            Box::new(VecMatcher::new(vec![(1, 0.5), (4, 1.0)])),
            Box::new(VecMatcher::new(vec![(1, 0.25), (3, 1.0), (4, 2.0)])),
        ];
        let results = drain_matcher(&mut IntersectionMatcher::new(children));
        assert_eq!(results, vec![(1, 0.75), (4, 3.0)]);
    }
}
