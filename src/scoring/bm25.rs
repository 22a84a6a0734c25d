use super::{idf, Scorer, ScoringContext, Weighting};
use crate::fieldlength::LengthReader;
use crate::schema::Field;
use crate::DocId;
use crate::Score;
use std::collections::HashMap;

const DEFAULT_K1: f32 = 1.2;
const DEFAULT_B: f32 = 0.75;

/// BM25F: BM25 with per-field length normalization parameters.
///
/// `k1` controls term-frequency saturation, `b` the strength of the
/// length normalization. Parameters can be overridden per field; the
/// field boost declared in the schema multiplies the final score.
#[derive(Clone, Debug)]
pub struct Bm25Weighting {
    k1: f32,
    b: f32,
    field_params: HashMap<Field, (f32, f32)>,
}

impl Default for Bm25Weighting {
    fn default() -> Bm25Weighting {
        Bm25Weighting {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            field_params: HashMap::new(),
        }
    }
}

impl Bm25Weighting {
    pub fn with_params(k1: f32, b: f32) -> Bm25Weighting {
        Bm25Weighting {
            k1,
            b,
            field_params: HashMap::new(),
        }
    }

    /// Overrides `k1`/`b` for one field.
    pub fn set_field_params(mut self, field: Field, k1: f32, b: f32) -> Bm25Weighting {
        self.field_params.insert(field, (k1, b));
        self
    }

    fn params_for(&self, field: Field) -> (f32, f32) {
        self.field_params
            .get(&field)
            .cloned()
            .unwrap_or((self.k1, self.b))
    }
}

impl Weighting for Bm25Weighting {
    fn scorer(&self, ctx: ScoringContext) -> Box<dyn Scorer> {
        let (k1, b) = self.params_for(ctx.field);
        let idf = idf(ctx.term.doc_freq, ctx.collection.num_docs());
        Box::new(Bm25Scorer {
            field: ctx.field,
            boost: ctx.field_boost,
            idf,
            k1,
            b,
            average_field_length: ctx.collection.average_field_length(ctx.field),
            lengths: ctx.lengths,
        })
    }
}

struct Bm25Scorer {
    #[allow(dead_code)]
    field: Field,
    boost: f32,
    idf: f32,
    k1: f32,
    b: f32,
    average_field_length: f32,
    lengths: Option<LengthReader>,
}

impl Bm25Scorer {
    #[inline]
    fn tf_component(&self, weight: f32, field_length: f32) -> f32 {
        let norm = self.k1 * (1.0 - self.b + self.b * field_length / self.average_field_length);
        weight * (self.k1 + 1.0) / (weight + norm)
    }
}

impl Scorer for Bm25Scorer {
    fn score(&self, doc: DocId, weight: f32) -> Score {
        let field_length = self
            .lengths
            .as_ref()
            .map(|lengths| lengths.get(doc) as f32)
            .unwrap_or(self.average_field_length);
        self.boost * self.idf * self.tf_component(weight, field_length)
    }

    fn max_score(&self, block_max_weight: f32) -> Score {
        // the bound takes the most favorable length (0), which keeps it
        // valid for every document of the block.
        let norm = self.k1 * (1.0 - self.b);
        self.boost * self.idf * block_max_weight * (self.k1 + 1.0) / (block_max_weight + norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{CollectionStatistics, TermStatistics};

    fn scorer_for(doc_freq: u64) -> Box<dyn Scorer> {
        let mut totals = HashMap::new();
        totals.insert(Field(0), 5_000u64);
        let collection = CollectionStatistics::new(1_000, totals);
        Bm25Weighting::default().scorer(ScoringContext {
            field: Field(0),
            field_boost: 1.0,
            collection: &collection,
            term: TermStatistics {
                doc_freq,
                total_freq: doc_freq * 2,
            },
            lengths: None,
        })
    }

    #[test]
    fn test_bm25_rarity_and_saturation() {
        let rare = scorer_for(2);
        let common = scorer_for(600);
        assert!(rare.score(0, 1.0) > common.score(0, 1.0));
        // term frequency saturates
        let delta_low = rare.score(0, 2.0) - rare.score(0, 1.0);
        let delta_high = rare.score(0, 10.0) - rare.score(0, 9.0);
        assert!(delta_low > delta_high);
    }

    #[test]
    fn test_bm25_block_max_is_an_upper_bound() {
        let scorer = scorer_for(5);
        for &weight in &[1.0f32, 2.0, 3.0, 7.5] {
            assert!(scorer.max_score(weight) >= scorer.score(0, weight));
        }
    }
}
