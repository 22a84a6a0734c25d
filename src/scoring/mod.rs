//! Ranking models.
//!
//! A [`Weighting`] is the index-wide model choice; it hands out one
//! [`Scorer`] per `(term, segment)` pair, pre-computing whatever global
//! factors it needs (idf, average field length). The scorer then maps
//! the raw term weight of each matching document to a score, and bounds
//! block-max weights for early termination.

mod bm25;
mod combinators;
mod frequency;
mod tfidf;

pub use self::bm25::Bm25Weighting;
pub use self::combinators::{FunctionWeighting, MultiWeighting, ReverseWeighting};
pub use self::frequency::FrequencyWeighting;
pub use self::tfidf::TfIdfWeighting;

use crate::fieldlength::LengthReader;
use crate::schema::Field;
use crate::DocId;
use crate::Score;
use std::collections::HashMap;

/// Index-wide statistics fed to the scorers.
#[derive(Clone, Debug, Default)]
pub struct CollectionStatistics {
    num_docs: u64,
    field_length_totals: HashMap<Field, u64>,
}

impl CollectionStatistics {
    pub fn new(num_docs: u64, field_length_totals: HashMap<Field, u64>) -> CollectionStatistics {
        CollectionStatistics {
            num_docs,
            field_length_totals,
        }
    }

    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    pub fn total_field_length(&self, field: Field) -> u64 {
        self.field_length_totals.get(&field).cloned().unwrap_or(0)
    }

    /// Average length of `field` over the collection, in tokens.
    pub fn average_field_length(&self, field: Field) -> f32 {
        if self.num_docs == 0 {
            return 1.0;
        }
        let average = self.total_field_length(field) as f32 / self.num_docs as f32;
        average.max(1.0)
    }
}

/// Statistics of one term.
#[derive(Clone, Copy, Debug)]
pub struct TermStatistics {
    /// Number of documents containing the term, across all segments.
    pub doc_freq: u64,
    /// Total number of occurrences.
    pub total_freq: u64,
}

/// Everything a model needs to instantiate a scorer for one term in one
/// segment.
pub struct ScoringContext<'a> {
    pub field: Field,
    pub field_boost: f32,
    pub collection: &'a CollectionStatistics,
    pub term: TermStatistics,
    /// Length reader of the field in the segment, when lengths exist.
    pub lengths: Option<LengthReader>,
}

/// A ranking model.
pub trait Weighting: Send + Sync + 'static {
    fn scorer(&self, ctx: ScoringContext) -> Box<dyn Scorer>;
}

/// Per-(term, segment) scoring function.
pub trait Scorer: Send + Sync {
    /// Scores `doc`, given the raw term weight at that document.
    fn score(&self, doc: DocId, weight: f32) -> Score;

    /// Upper bound of [`Scorer::score`] over any document of a block
    /// whose maximum raw weight is `block_max_weight`.
    fn max_score(&self, block_max_weight: f32) -> Score;

    /// False disables block-max pruning for matchers using this scorer.
    fn supports_block_quality(&self) -> bool {
        true
    }
}

/// Lucene-style smoothed inverse document frequency.
pub(crate) fn idf(doc_freq: u64, num_docs: u64) -> f32 {
    let doc_freq = doc_freq as f32;
    let num_docs = num_docs as f32;
    (1.0 + (num_docs - doc_freq + 0.5) / (doc_freq + 0.5)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_decreases_with_doc_freq() {
        let rare = idf(1, 1000);
        let common = idf(900, 1000);
        assert!(rare > common);
        assert!(common > 0.0);
    }

    #[test]
    fn test_average_field_length() {
        let stats =
            CollectionStatistics::new(100, maplit::hashmap! { Field(0) => 500u64 });
        assert!((stats.average_field_length(Field(0)) - 5.0).abs() < 1e-6);
        assert_eq!(stats.average_field_length(Field(1)), 1.0);
    }
}
