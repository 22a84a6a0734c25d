use super::facet::{FacetEvaluator, FacetKey};
use super::sorted::SortKey;
use crate::DocId;
use crate::Score;
use std::collections::{HashMap, HashSet};

/// Collapse configuration: at most `limit` documents are kept per key
/// of the collapse facet.
#[derive(Clone)]
pub struct CollapseSpec {
    pub facet: super::FacetSpec,
    pub limit: usize,
}

impl CollapseSpec {
    pub fn new(facet: super::FacetSpec, limit: usize) -> CollapseSpec {
        CollapseSpec {
            facet,
            limit: limit.max(1),
        }
    }
}

/// Ranking of one kept document under its collapse key.
#[derive(Clone, Debug, PartialEq)]
enum CollapseOrder {
    /// Higher is better.
    Scored(Score),
    /// Lower is better (primary sort order).
    Keyed(SortKey, DocId),
}

impl CollapseOrder {
    /// True if `self` ranks better than `other`.
    fn beats(&self, other: &CollapseOrder) -> bool {
        match (self, other) {
            (CollapseOrder::Scored(left), CollapseOrder::Scored(right)) => left > right,
            (CollapseOrder::Keyed(left_key, left_doc), CollapseOrder::Keyed(right_key, right_doc)) => {
                (left_key, left_doc) < (right_key, right_doc)
            }
            _ => false,
        }
    }
}

/// Shared collapse state used by the base collectors: keeps the best
/// `limit` documents per collapse key, evicting already-accepted
/// documents when a better one arrives.
pub(crate) struct Collapser {
    evaluator: FacetEvaluator,
    limit: usize,
    kept: HashMap<FacetKey, Vec<(CollapseOrder, DocId)>>,
    evicted: HashSet<DocId>,
    counts: HashMap<FacetKey, usize>,
}

impl Collapser {
    pub(crate) fn new(evaluator: FacetEvaluator, limit: usize) -> Collapser {
        Collapser {
            evaluator,
            limit: limit.max(1),
            kept: HashMap::new(),
            evicted: HashSet::new(),
            counts: HashMap::new(),
        }
    }

    /// Offers a score-ranked document; returns false if it is collapsed
    /// away.
    pub(crate) fn offer_scored(&mut self, doc: DocId, score: Score) -> bool {
        let (key, _) = self.evaluator.sort_key(doc, score);
        self.offer_with_order(doc, key, CollapseOrder::Scored(score))
    }

    /// Offers a key-ranked document (sorted collections).
    pub(crate) fn offer(&mut self, doc: DocId, sort_key: &SortKey, score: Score) -> bool {
        let (key, _) = self.evaluator.sort_key(doc, score);
        self.offer_with_order(doc, key, CollapseOrder::Keyed(sort_key.clone(), doc))
    }

    fn offer_with_order(&mut self, doc: DocId, key: FacetKey, order: CollapseOrder) -> bool {
        // documents without a collapse key are never collapsed
        if key == FacetKey::Missing {
            return true;
        }
        let slot = self.kept.entry(key.clone()).or_insert_with(Vec::new);
        if slot.len() < self.limit {
            slot.push((order, doc));
            return true;
        }
        // find the worst kept entry under this key
        let (worst_idx, _) = slot
            .iter()
            .enumerate()
            .min_by(|(_, (left, _)), (_, (right, _))| {
                if left.beats(right) {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Less
                }
            })
            .expect("slot is non-empty");
        if order.beats(&slot[worst_idx].0) {
            let (_, evicted_doc) = slot[worst_idx].clone();
            self.evicted.insert(evicted_doc);
            *self.counts.entry(key).or_insert(0) += 1;
            slot[worst_idx] = (order, doc);
            true
        } else {
            *self.counts.entry(key).or_insert(0) += 1;
            false
        }
    }

    pub(crate) fn is_evicted(&self, doc: DocId) -> bool {
        self.evicted.contains(&doc)
    }

    pub(crate) fn into_counts(self) -> HashMap<FacetKey, usize> {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FacetKey;
    use std::sync::Arc;

    fn keyed_by_parity() -> Collapser {
        let evaluator = FacetEvaluator::Function(Arc::new(|doc, _| FacetKey::U64(doc as u64 % 2)));
        Collapser::new(evaluator, 1)
    }

    #[test]
    fn test_collapser_keeps_best_per_key() {
        let mut collapser = keyed_by_parity();
        assert!(collapser.offer_scored(0, 1.0));
        assert!(collapser.offer_scored(1, 1.0));
        // doc 2 shares key with doc 0 but scores better: evicts it
        assert!(collapser.offer_scored(2, 5.0));
        assert!(collapser.is_evicted(0));
        // doc 4 scores worse than doc 2: rejected
        assert!(!collapser.offer_scored(4, 0.5));
        let counts = collapser.into_counts();
        assert_eq!(counts.get(&FacetKey::U64(0)), Some(&2));
    }
}
