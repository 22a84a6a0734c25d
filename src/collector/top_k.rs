use super::collapse::Collapser;
use super::{Collector, Hit, Results, TotalHits};
use crate::matcher::Matcher;
use crate::DocId;
use crate::Result;
use crate::Score;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered worst-first: the top of the max-heap is the entry
/// to displace. Worse means lower score, ties broken by larger docnum
/// (so that equal scores keep the earliest documents).
#[derive(Clone, Copy, Debug, PartialEq)]
struct HeapEntry {
    score: Score,
    doc: DocId,
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &HeapEntry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &HeapEntry) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

/// Keeps the K best-scoring documents.
///
/// Once the heap is full, its minimum becomes the quality threshold the
/// driver feeds back to the matcher for block-max skipping. Collapsing
/// disables the threshold: evicted entries would make it overshoot.
pub struct TopKCollector {
    limit: usize,
    heap: BinaryHeap<HeapEntry>,
    collapser: Option<Collapser>,
    seen: u64,
}

impl TopKCollector {
    pub fn with_limit(limit: usize) -> TopKCollector {
        assert!(limit > 0, "a top-K collector requires a limit >= 1");
        TopKCollector {
            limit,
            heap: BinaryHeap::with_capacity(limit + 1),
            collapser: None,
            seen: 0,
        }
    }

    pub(crate) fn with_collapser(limit: usize, collapser: Collapser) -> TopKCollector {
        let mut collector = TopKCollector::with_limit(limit);
        collector.collapser = Some(collapser);
        collector
    }
}

impl Collector for TopKCollector {
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()> {
        let score = matcher.score();
        self.seen += 1;
        if let Some(ref mut collapser) = self.collapser {
            if !collapser.offer_scored(doc, score) {
                return Ok(());
            }
        }
        let entry = HeapEntry { score, doc };
        if self.heap.len() < self.limit {
            self.heap.push(entry);
        } else if let Some(worst) = self.heap.peek() {
            // `entry < worst` means the candidate is better than the
            // current worst (the ordering is worst-first).
            if entry < *worst {
                self.heap.pop();
                self.heap.push(entry);
            }
        }
        Ok(())
    }

    fn quality_threshold(&self) -> Option<Score> {
        if self.collapser.is_some() {
            return None;
        }
        if self.heap.len() < self.limit {
            return None;
        }
        self.heap.peek().map(|worst| worst.score)
    }

    fn harvest(self: Box<Self>) -> Results {
        let collapser = self.collapser;
        let mut entries: Vec<HeapEntry> = self.heap.into_vec();
        if let Some(ref collapser) = collapser {
            entries.retain(|entry| !collapser.is_evicted(entry.doc));
        }
        // best first: score descending, docnum ascending on ties
        entries.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.doc.cmp(&right.doc))
        });
        entries.truncate(self.limit);
        let mut results = Results::new();
        results.total = TotalHits::exact(self.seen);
        results.hits = entries
            .into_iter()
            .map(|entry| Hit {
                doc: entry.doc,
                score: Some(entry.score),
                sort_key: None,
            })
            .collect();
        if let Some(collapser) = collapser {
            results.collapsed_counts = collapser.into_counts();
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::test_helpers::VecMatcher;

    fn collect_all(collector: &mut TopKCollector, entries: Vec<(DocId, Score)>) {
        let mut matcher = VecMatcher::new(entries);
        while matcher.is_active() {
            let doc = matcher.doc();
            collector.collect(doc, &mut matcher).unwrap();
            matcher.advance();
        }
    }

    #[test]
    fn test_top_k_keeps_best() {
        let mut collector = TopKCollector::with_limit(2);
        collect_all(
            &mut collector,
            vec![(0, 0.8), (1, 0.2), (2, 0.3), (3, 0.9)],
        );
        let results = Box::new(collector).harvest();
        let docs: Vec<DocId> = results.docs().collect();
        assert_eq!(docs, vec![3, 0]);
        assert_eq!(results.total.get_exact(), Some(4));
    }

    #[test]
    fn test_top_k_tie_break_by_doc() {
        let mut collector = TopKCollector::with_limit(2);
        collect_all(&mut collector, vec![(0, 0.5), (1, 0.5), (2, 0.5)]);
        let results = Box::new(collector).harvest();
        let docs: Vec<DocId> = results.docs().collect();
        assert_eq!(docs, vec![0, 1]);
    }

    #[test]
    fn test_quality_threshold_appears_when_full() {
        let mut collector = TopKCollector::with_limit(2);
        assert_eq!(collector.quality_threshold(), None);
        collect_all(&mut collector, vec![(0, 0.8), (1, 0.2)]);
        assert_eq!(collector.quality_threshold(), Some(0.2));
    }

    #[test]
    #[should_panic]
    fn test_top_0_panics() {
        TopKCollector::with_limit(0);
    }
}
