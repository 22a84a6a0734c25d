use super::Matcher;
use crate::common::BitSet;
use crate::core::LiveDocs;
use crate::DocId;
use crate::Score;
use std::sync::Arc;

/// Maps matching child documents to their parent.
///
/// Relies on the contiguous-block invariant: a nested group is indexed
/// as the parent document immediately followed by its children, within
/// one segment. `parents` is the bitmap of all parent documents of the
/// segment (computed from the parent query); for each matching child,
/// the nearest prior parent is emitted, once, with the children's
/// scores summed.
pub struct NestedParentMatcher {
    children: Box<dyn Matcher>,
    parents: Arc<BitSet>,
    current_parent: DocId,
    current_score: Score,
    active: bool,
}

impl NestedParentMatcher {
    pub fn new(children: Box<dyn Matcher>, parents: Arc<BitSet>) -> NestedParentMatcher {
        let mut matcher = NestedParentMatcher {
            children,
            parents,
            current_parent: 0,
            current_score: 0.0,
            active: true,
        };
        matcher.pull_next_group();
        matcher
    }

    /// Consumes the children of the next group, accumulating scores.
    fn pull_next_group(&mut self) {
        loop {
            if !self.children.is_active() {
                self.active = false;
                return;
            }
            let child_doc = self.children.doc();
            match self.parents.prev_set(child_doc) {
                Some(parent) => {
                    self.current_parent = parent;
                    self.current_score = 0.0;
                    let group_end = self
                        .parents
                        .next_set(parent + 1)
                        .unwrap_or(u32::max_value());
                    while self.children.is_active() && self.children.doc() < group_end {
                        self.current_score += self.children.score();
                        self.children.advance();
                    }
                    return;
                }
                None => {
                    // child before the first parent: orphan, skip it
                    if !self.children.advance() {
                        self.active = false;
                        return;
                    }
                }
            }
        }
    }
}

impl Matcher for NestedParentMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.active);
        self.current_parent
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.pull_next_group();
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        while self.active && self.current_parent < target {
            self.pull_next_group();
        }
        self.active
    }

    fn score(&mut self) -> Score {
        self.current_score
    }
}

/// Inverse of [`NestedParentMatcher`]: for each matching parent, emits
/// the documents of its contiguous child range.
pub struct NestedChildrenMatcher {
    parent_matcher: Box<dyn Matcher>,
    parents: Arc<BitSet>,
    live_docs: Option<LiveDocs>,
    max_doc: DocId,
    current_child: DocId,
    group_end: DocId,
    parent_score: Score,
    active: bool,
}

impl NestedChildrenMatcher {
    pub fn new(
        parent_matcher: Box<dyn Matcher>,
        parents: Arc<BitSet>,
        max_doc: DocId,
        live_docs: Option<LiveDocs>,
    ) -> NestedChildrenMatcher {
        let mut matcher = NestedChildrenMatcher {
            parent_matcher,
            parents,
            live_docs,
            max_doc,
            current_child: 0,
            group_end: 0,
            parent_score: 0.0,
            active: true,
        };
        matcher.pull_next_parent();
        matcher
    }

    fn is_live_child(&self, doc: DocId) -> bool {
        if self.parents.contains(doc) {
            return false;
        }
        match self.live_docs {
            Some(ref live) => !live.is_deleted(doc),
            None => true,
        }
    }

    /// Positions on the first live child of the next matching parent
    /// that has any.
    fn pull_next_parent(&mut self) {
        loop {
            if !self.parent_matcher.is_active() {
                self.active = false;
                return;
            }
            let parent = self.parent_matcher.doc();
            self.parent_score = self.parent_matcher.score();
            self.group_end = self
                .parents
                .next_set(parent + 1)
                .unwrap_or(self.max_doc)
                .min(self.max_doc);
            self.current_child = parent + 1;
            self.parent_matcher.advance();
            if self.settle_within_group() {
                return;
            }
        }
    }

    fn settle_within_group(&mut self) -> bool {
        while self.current_child < self.group_end {
            if self.is_live_child(self.current_child) {
                return true;
            }
            self.current_child += 1;
        }
        false
    }
}

impl Matcher for NestedChildrenMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.active);
        self.current_child
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.current_child += 1;
        if !self.settle_within_group() {
            self.pull_next_parent();
        }
        self.active
    }

    fn score(&mut self) -> Score {
        self.parent_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::drain_matcher;
    use crate::matcher::test_helpers::VecMatcher;

    fn parents_at(bits: &[u32], max: u32) -> Arc<BitSet> {
        let mut set = BitSet::with_max_value(max);
        for &bit in bits {
            set.insert(bit);
        }
        Arc::new(set)
    }

    #[test]
    fn test_nested_parent() {
        // groups: parent 0 (children 1, 2), parent 3 (children 4, 5, 6)
        let parents = parents_at(&[0, 3], 7);
        let children_matches = Box::new(VecMatcher::new(vec![(2, 1.0), (4, 2.0), (6, 3.0)]));
        let mut matcher = NestedParentMatcher::new(children_matches, parents);
        let results = drain_matcher(&mut matcher);
        assert_eq!(results, vec![(0, 1.0), (3, 5.0)]);
    }

    #[test]
    fn test_nested_parent_emits_each_parent_once() {
        let parents = parents_at(&[0, 4], 8);
        let children_matches = Box::new(VecMatcher::new(vec![(1, 1.0), (2, 1.0), (3, 1.0)]));
        let mut matcher = NestedParentMatcher::new(children_matches, parents);
        let results = drain_matcher(&mut matcher);
        assert_eq!(results, vec![(0, 3.0)]);
    }

    #[test]
    fn test_nested_children() {
        let parents = parents_at(&[0, 3, 6], 8);
        // parents 0 and 6 match
        let parent_matches = Box::new(VecMatcher::new(vec![(0, 1.5), (6, 2.5)]));
        let mut matcher = NestedChildrenMatcher::new(parent_matches, parents, 8, None);
        let results = drain_matcher(&mut matcher);
        assert_eq!(results, vec![(1, 1.5), (2, 1.5), (7, 2.5)]);
    }
}
