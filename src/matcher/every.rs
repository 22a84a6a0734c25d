use super::Matcher;
use crate::core::LiveDocs;
use crate::DocId;
use crate::Score;
use std::sync::Arc;

/// Matches every live document of a segment, optionally restricted to
/// the documents where some predicate holds (e.g. "field is present").
pub struct EveryMatcher {
    max_doc: DocId,
    live_docs: Option<LiveDocs>,
    predicate: Option<Arc<dyn Fn(DocId) -> bool + Send + Sync>>,
    current: DocId,
    active: bool,
}

impl EveryMatcher {
    pub fn new(max_doc: DocId, live_docs: Option<LiveDocs>) -> EveryMatcher {
        let mut matcher = EveryMatcher {
            max_doc,
            live_docs,
            predicate: None,
            current: 0,
            active: max_doc > 0,
        };
        matcher.settle();
        matcher
    }

    /// Restricts the matcher to documents satisfying `predicate`.
    pub fn with_predicate(
        max_doc: DocId,
        live_docs: Option<LiveDocs>,
        predicate: Arc<dyn Fn(DocId) -> bool + Send + Sync>,
    ) -> EveryMatcher {
        let mut matcher = EveryMatcher {
            max_doc,
            live_docs,
            predicate: Some(predicate),
            current: 0,
            active: max_doc > 0,
        };
        matcher.settle();
        matcher
    }

    fn accepts(&self, doc: DocId) -> bool {
        if let Some(ref live) = self.live_docs {
            if live.is_deleted(doc) {
                return false;
            }
        }
        match self.predicate {
            Some(ref predicate) => predicate(doc),
            None => true,
        }
    }

    fn settle(&mut self) {
        while self.active {
            if self.current >= self.max_doc {
                self.active = false;
                return;
            }
            if self.accepts(self.current) {
                return;
            }
            self.current += 1;
        }
    }
}

impl Matcher for EveryMatcher {
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

    #[test]
    fn test_every_matcher() {
        let mut matcher = EveryMatcher::new(4, None);
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_every_with_predicate() {
        let mut matcher = EveryMatcher::with_predicate(10, None, Arc::new(|doc| doc % 3 == 0));
        let docs: Vec<DocId> = drain_matcher(&mut matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        assert_eq!(docs, vec![0, 3, 6, 9]);
    }
}
