use super::Matcher;
use crate::core::LiveDocs;
use crate::DocId;
use crate::Score;

/// Emits the live documents NOT matched by the wrapped matcher.
///
/// Needs the segment's document range to enumerate candidates; deleted
/// documents are never emitted.
pub struct InverseMatcher {
    child: Box<dyn Matcher>,
    live_docs: Option<LiveDocs>,
    max_doc: DocId,
    current: DocId,
    active: bool,
}

impl InverseMatcher {
    pub fn new(
        child: Box<dyn Matcher>,
        max_doc: DocId,
        live_docs: Option<LiveDocs>,
    ) -> InverseMatcher {
        let mut matcher = InverseMatcher {
            child,
            live_docs,
            max_doc,
            current: 0,
            active: max_doc > 0,
        };
        matcher.settle();
        matcher
    }

    fn is_emittable(&mut self) -> bool {
        let doc = self.current;
        if let Some(ref live) = self.live_docs {
            if live.is_deleted(doc) {
                return false;
            }
        }
        if self.child.is_active() && self.child.doc() < doc {
            self.child.skip_to(doc);
        }
        !(self.child.is_active() && self.child.doc() == doc)
    }

    fn settle(&mut self) {
        while self.active {
            if self.current >= self.max_doc {
                self.active = false;
                return;
            }
            if self.is_emittable() {
                return;
            }
            self.current += 1;
        }
    }
}

impl Matcher for InverseMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.current += 1;
        self.settle();
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        if self.current < target {
            self.current = target;
        }
        self.settle();
        self.active
    }

    fn score(&mut self) -> Score {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    #[test]
    fn test_inverse() {
        let mut matcher = InverseMatcher::new(
            Box::new(VecMatcher::from_docs(&[0, 2, 5])),
            7,
            None,
        );
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![1, 3, 4, 6]);
    }

    #[test]
    fn test_inverse_respects_deletions() {
        use crate::common::BitSet;
        let mut live = BitSet::full(6);
        live.remove(3);
        let mut matcher = InverseMatcher::new(
            Box::new(VecMatcher::from_docs(&[0, 1])),
            6,
            Some(LiveDocs::from_bitset(live)),
        );
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![2, 4, 5]);
    }
}
