use super::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// `scored REQUIRE required`: both must match, only `scored` scores.
pub struct RequireMatcher {
    scored: Box<dyn Matcher>,
    required: Box<dyn Matcher>,
    active: bool,
}

impl RequireMatcher {
    pub fn new(scored: Box<dyn Matcher>, required: Box<dyn Matcher>) -> RequireMatcher {
        let mut matcher = RequireMatcher {
            active: true,
            scored,
            required,
        };
        matcher.align();
        matcher
    }

    fn align(&mut self) {
        loop {
            if !self.scored.is_active() || !self.required.is_active() {
                self.active = false;
                return;
            }
            let scored_doc = self.scored.doc();
            let required_doc = self.required.doc();
            if scored_doc == required_doc {
                return;
            }
            if scored_doc < required_doc {
                self.scored.skip_to(required_doc);
            } else {
                self.required.skip_to(scored_doc);
            }
        }
    }
}

impl Matcher for RequireMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        self.scored.doc()
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.scored.advance();
        self.align();
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        self.scored.skip_to(target);
        self.align();
        self.active
    }

    fn weight(&self) -> f32 {
        self.scored.weight()
    }

    fn score(&mut self) -> Score {
        self.scored.score()
    }

    fn supports_block_quality(&self) -> bool {
        self.scored.supports_block_quality()
    }

    fn block_max_score(&mut self) -> Score {
        self.scored.block_max_score()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.active {
            return false;
        }
        self.scored.skip_to_quality(threshold);
        self.align();
        self.active
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.scored.matching_terms(doc, terms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    #[test]
    fn test_require_scores_from_first_only() {
        let mut matcher = RequireMatcher::new(
            Box::new(VecMatcher::new(vec![(1, 2.0), (3, 4.0), (5, 8.0)])),
            Box::new(VecMatcher::new(vec![(3, 100.0), (5, 100.0), (9, 100.0)])),
        );
        let results = drain_matcher(&mut matcher);
        assert_eq!(results, vec![(3, 4.0), (5, 8.0)]);
    }
}
