use super::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// `a AND MAYBE b`: matches whatever `required` matches; `optional`
/// adds to the score when it matches the same document.
pub struct AndMaybeMatcher {
    required: Box<dyn Matcher>,
    optional: Box<dyn Matcher>,
}

impl AndMaybeMatcher {
    pub fn new(required: Box<dyn Matcher>, optional: Box<dyn Matcher>) -> AndMaybeMatcher {
        let mut matcher = AndMaybeMatcher { required, optional };
        matcher.align_optional();
        matcher
    }

    fn align_optional(&mut self) {
        if self.required.is_active() && self.optional.is_active() {
            let doc = self.required.doc();
            if self.optional.doc() < doc {
                self.optional.skip_to(doc);
            }
        }
    }

    fn optional_aligned(&self) -> bool {
        self.required.is_active()
            && self.optional.is_active()
            && self.optional.doc() == self.required.doc()
    }
}

impl Matcher for AndMaybeMatcher {
    fn is_active(&self) -> bool {
        self.required.is_active()
    }

    fn doc(&self) -> DocId {
        self.required.doc()
    }

    fn advance(&mut self) -> bool {
        let alive = self.required.advance();
        self.align_optional();
        alive
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        let alive = self.required.skip_to(target);
        self.align_optional();
        alive
    }

    fn weight(&self) -> f32 {
        let mut weight = self.required.weight();
        if self.optional_aligned() {
            weight += self.optional.weight();
        }
        weight
    }

    fn score(&mut self) -> Score {
        let mut score = self.required.score();
        if self.optional_aligned() {
            score += self.optional.score();
        }
        score
    }

    fn supports_block_quality(&self) -> bool {
        self.required.supports_block_quality() && self.optional.supports_block_quality()
    }

    fn block_max_score(&mut self) -> Score {
        let mut bound = self.required.block_max_score();
        if self.optional.is_active() {
            bound += self.optional.block_max_score();
        }
        bound
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.advance() {
            return false;
        }
        while self.required.is_active() && self.block_max_score() <= threshold {
            if !self.advance() {
                return false;
            }
        }
        self.required.is_active()
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.required.matching_terms(doc, terms);
        self.optional.matching_terms(doc, terms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    #[test]
    fn test_and_maybe() {
        let mut matcher = AndMaybeMatcher::new(
            Box::new(VecMatcher::new(vec![(1, 1.0), (4, 1.0), (9, 1.0)])),
            Box::new(VecMatcher::new(vec![(2, 5.0), (4, 5.0)])),
        );
        let results = drain_matcher(&mut matcher);
        assert_eq!(results, vec![(1, 1.0), (4, 6.0), (9, 1.0)]);
    }
}
