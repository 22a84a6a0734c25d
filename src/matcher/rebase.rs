use super::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// Concatenates per-segment matchers into one stream of index-wide
/// document ids.
///
/// Each part carries the document-number base of its segment; since
/// bases follow the table-of-contents order, the concatenation yields
/// strictly ascending rebased ids.
pub struct ChainedMatcher {
    parts: Vec<(DocId, Box<dyn Matcher>)>,
    part_idx: usize,
}

impl ChainedMatcher {
    pub fn new(parts: Vec<(DocId, Box<dyn Matcher>)>) -> ChainedMatcher {
        let mut matcher = ChainedMatcher { parts, part_idx: 0 };
        matcher.settle();
        matcher
    }

    fn settle(&mut self) {
        while self.part_idx < self.parts.len() && !self.parts[self.part_idx].1.is_active() {
            self.part_idx += 1;
        }
    }

    fn current_part(&self) -> &(DocId, Box<dyn Matcher>) {
        &self.parts[self.part_idx]
    }
}

impl Matcher for ChainedMatcher {
    fn is_active(&self) -> bool {
        self.part_idx < self.parts.len()
    }

    fn doc(&self) -> DocId {
        let (base, ref inner) = *self.current_part();
        base + inner.doc()
    }

    fn advance(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.parts[self.part_idx].1.advance();
        self.settle();
        self.is_active()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        while self.part_idx < self.parts.len() {
            let next_base = self
                .parts
                .get(self.part_idx + 1)
                .map(|&(base, _)| base);
            if let Some(next_base) = next_base {
                if next_base <= target {
                    self.part_idx += 1;
                    continue;
                }
            }
            break;
        }
        if !self.is_active() {
            return false;
        }
        let (base, ref mut inner) = self.parts[self.part_idx];
        if inner.is_active() {
            let local_target = target.saturating_sub(base);
            inner.skip_to(local_target);
        }
        self.settle();
        self.is_active()
    }

    fn weight(&self) -> f32 {
        self.current_part().1.weight()
    }

    fn score(&mut self) -> Score {
        self.parts[self.part_idx].1.score()
    }

    fn supports_block_quality(&self) -> bool {
        self.parts
            .iter()
            .all(|(_, inner)| !inner.is_active() || inner.supports_block_quality())
    }

    fn block_max_score(&mut self) -> Score {
        if !self.is_active() {
            return 0.0;
        }
        self.parts[self.part_idx].1.block_max_score()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.is_active() {
            return false;
        }
        self.parts[self.part_idx].1.skip_to_quality(threshold);
        self.settle();
        self.is_active()
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        if !self.is_active() {
            return;
        }
        let (base, ref inner) = *self.current_part();
        if doc >= base {
            inner.matching_terms(doc - base, terms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    #[test]
    fn test_chained_rebase() {
        let mut matcher = ChainedMatcher::new(vec![
            (0, Box::new(VecMatcher::from_docs(&[0, 2])) as Box<dyn Matcher>),
            (10, Box::new(VecMatcher::from_docs(&[1, 3])) as Box<dyn Matcher>),
            (20, Box::new(VecMatcher::from_docs(&[0])) as Box<dyn Matcher>),
        ]);
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![0, 2, 11, 13, 20]);
    }

    #[test]
    fn test_chained_skip_to() {
        let mut matcher = ChainedMatcher::new(vec![
            (0, Box::new(VecMatcher::from_docs(&[0, 2])) as Box<dyn Matcher>),
            (10, Box::new(VecMatcher::from_docs(&[1, 3])) as Box<dyn Matcher>),
        ]);
        assert!(matcher.skip_to(3));
        assert_eq!(matcher.doc(), 11);
        assert!(matcher.skip_to(12));
        assert_eq!(matcher.doc(), 13);
        assert!(!matcher.skip_to(15));
    }
}
