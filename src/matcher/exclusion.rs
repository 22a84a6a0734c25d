use super::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// `a AND NOT b`: the documents of `positive` absent from `negative`.
///
/// Scoring and block bounds come from `positive` alone.
pub struct ExclusionMatcher {
    positive: Box<dyn Matcher>,
    negative: Box<dyn Matcher>,
}

impl ExclusionMatcher {
    pub fn new(positive: Box<dyn Matcher>, negative: Box<dyn Matcher>) -> ExclusionMatcher {
        let mut matcher = ExclusionMatcher { positive, negative };
        matcher.skip_excluded();
        matcher
    }

    /// Advances `positive` past any document present in `negative`.
    fn skip_excluded(&mut self) {
        while self.positive.is_active() {
            let doc = self.positive.doc();
            if self.negative.is_active() && self.negative.doc() < doc {
                self.negative.skip_to(doc);
            }
            let excluded = self.negative.is_active() && self.negative.doc() == doc;
            if !excluded {
                return;
            }
            self.positive.advance();
        }
    }
}

impl Matcher for ExclusionMatcher {
    fn is_active(&self) -> bool {
        self.positive.is_active()
    }

    fn doc(&self) -> DocId {
        self.positive.doc()
    }

    fn advance(&mut self) -> bool {
        if !self.positive.advance() {
            return false;
        }
        self.skip_excluded();
        self.positive.is_active()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.positive.skip_to(target) {
            return false;
        }
        self.skip_excluded();
        self.positive.is_active()
    }

    fn weight(&self) -> f32 {
        self.positive.weight()
    }

    fn score(&mut self) -> Score {
        self.positive.score()
    }

    fn supports_block_quality(&self) -> bool {
        self.positive.supports_block_quality()
    }

    fn block_max_score(&mut self) -> Score {
        self.positive.block_max_score()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.positive.skip_to_quality(threshold) {
            return false;
        }
        self.skip_excluded();
        self.positive.is_active()
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.positive.matching_terms(doc, terms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    #[test]
    fn test_exclusion() {
        let mut matcher = ExclusionMatcher::new(
            Box::new(VecMatcher::from_docs(&[1, 2, 5, 8, 10])),
            Box::new(VecMatcher::from_docs(&[2, 3, 8])),
        );
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![1, 5, 10]);
    }

    #[test]
    fn test_exclusion_of_first_doc() {
        let mut matcher = ExclusionMatcher::new(
            Box::new(VecMatcher::from_docs(&[3, 4])),
            Box::new(VecMatcher::from_docs(&[3])),
        );
        assert!(matcher.is_active());
        assert_eq!(matcher.doc(), 4);
        assert!(!matcher.advance());
    }
}
