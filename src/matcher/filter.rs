use super::Matcher;
use crate::common::BitSet;
use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Restricts a matcher by an allow-set and/or a deny-set bitmap.
///
/// Search filters and masks compile their queries to bitmaps once and
/// wrap the main matcher with this.
pub struct FilterMatcher {
    inner: Box<dyn Matcher>,
    allow: Option<Arc<BitSet>>,
    deny: Option<Arc<BitSet>>,
}

impl FilterMatcher {
    pub fn new(
        inner: Box<dyn Matcher>,
        allow: Option<Arc<BitSet>>,
        deny: Option<Arc<BitSet>>,
    ) -> FilterMatcher {
        let mut matcher = FilterMatcher { inner, allow, deny };
        matcher.settle();
        matcher
    }

    fn accepts(&self, doc: DocId) -> bool {
        if let Some(ref allow) = self.allow {
            if !allow.contains(doc) {
                return false;
            }
        }
        if let Some(ref deny) = self.deny {
            if deny.contains(doc) {
                return false;
            }
        }
        true
    }

    fn settle(&mut self) {
        while self.inner.is_active() && !self.accepts(self.inner.doc()) {
            self.inner.advance();
        }
    }
}

impl Matcher for FilterMatcher {
    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn doc(&self) -> DocId {
        self.inner.doc()
    }

    fn advance(&mut self) -> bool {
        if !self.inner.advance() {
            return false;
        }
        self.settle();
        self.inner.is_active()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.inner.skip_to(target) {
            return false;
        }
        self.settle();
        self.inner.is_active()
    }

    fn weight(&self) -> f32 {
        self.inner.weight()
    }

    fn score(&mut self) -> Score {
        self.inner.score()
    }

    fn supports_block_quality(&self) -> bool {
        self.inner.supports_block_quality()
    }

    fn block_max_score(&mut self) -> Score {
        self.inner.block_max_score()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.inner.skip_to_quality(threshold) {
            return false;
        }
        self.settle();
        self.inner.is_active()
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.inner.matching_terms(doc, terms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    #[test]
    fn test_filter_allow_and_deny() {
        let mut allow = BitSet::with_max_value(10);
        for doc in &[1u32, 2, 5, 7] {
            allow.insert(*doc);
        }
        let mut deny = BitSet::with_max_value(10);
        deny.insert(5);
        let mut matcher = FilterMatcher::new(
            Box::new(VecMatcher::from_docs(&[0, 1, 2, 3, 5, 7, 9])),
            Some(Arc::new(allow)),
            Some(Arc::new(deny)),
        );
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![1, 2, 7]);
    }
}
