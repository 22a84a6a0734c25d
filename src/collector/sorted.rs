use super::collapse::Collapser;
use super::facet::FacetEvaluator;
use super::{Collector, FacetKey, Hit, Results, TotalHits};
use crate::matcher::Matcher;
use crate::DocId;
use crate::Result;
use crate::Score;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Multi-component sort key; components compare lexicographically,
/// each one optionally reversed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    components: SmallVec<[(FacetKey, bool); 2]>,
}

impl SortKey {
    pub(crate) fn new(components: SmallVec<[(FacetKey, bool); 2]>) -> SortKey {
        SortKey { components }
    }

    pub fn components(&self) -> impl Iterator<Item = &FacetKey> {
        self.components.iter().map(|(key, _)| key)
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &SortKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &SortKey) -> Ordering {
        for ((left, reverse), (right, _)) in self.components.iter().zip(other.components.iter()) {
            let ordering = left.cmp(right);
            let ordering = if *reverse { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

/// Collects every match keyed by sort facets; emits hits in key order
/// (ties by ascending docnum), optionally truncated to a limit.
pub struct SortedCollector {
    evaluators: Vec<FacetEvaluator>,
    limit: Option<usize>,
    entries: Vec<(SortKey, DocId, Score)>,
    collapser: Option<Collapser>,
    seen: u64,
}

impl SortedCollector {
    pub(crate) fn new(
        evaluators: Vec<FacetEvaluator>,
        limit: Option<usize>,
        collapser: Option<Collapser>,
    ) -> SortedCollector {
        SortedCollector {
            evaluators,
            limit,
            entries: Vec::new(),
            collapser,
            seen: 0,
        }
    }

    fn sort_key(&self, doc: DocId, score: Score) -> SortKey {
        let components = self
            .evaluators
            .iter()
            .map(|evaluator| evaluator.sort_key(doc, score))
            .collect();
        SortKey::new(components)
    }
}

impl Collector for SortedCollector {
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()> {
        let needs_score = self
            .evaluators
            .iter()
            .any(FacetEvaluator::needs_score)
            || self.collapser.is_some();
        let score = if needs_score { matcher.score() } else { 0.0 };
        self.seen += 1;
        let sort_key = self.sort_key(doc, score);
        if let Some(ref mut collapser) = self.collapser {
            if !collapser.offer(doc, &sort_key, score) {
                return Ok(());
            }
        }
        self.entries.push((sort_key, doc, score));
        Ok(())
    }

    fn harvest(self: Box<Self>) -> Results {
        let collapser = self.collapser;
        let mut entries = self.entries;
        if let Some(ref collapser) = collapser {
            entries.retain(|&(_, doc, _)| !collapser.is_evicted(doc));
        }
        entries.sort_by(|(left_key, left_doc, _), (right_key, right_doc, _)| {
            left_key.cmp(right_key).then(left_doc.cmp(right_doc))
        });
        if let Some(limit) = self.limit {
            entries.truncate(limit);
        }
        let mut results = Results::new();
        results.total = TotalHits::exact(self.seen);
        results.hits = entries
            .into_iter()
            .map(|(sort_key, doc, _)| Hit {
                doc,
                score: None,
                sort_key: Some(sort_key),
            })
            .collect();
        if let Some(collapser) = collapser {
            results.collapsed_counts = collapser.into_counts();
        }
        results
    }
}
