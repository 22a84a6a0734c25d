use super::{idf, Scorer, ScoringContext, Weighting};
use crate::DocId;
use crate::Score;

/// Plain tf-idf: `weight * idf`, no length normalization.
#[derive(Clone, Copy, Debug, Default)]
pub struct TfIdfWeighting;

impl Weighting for TfIdfWeighting {
    fn scorer(&self, ctx: ScoringContext) -> Box<dyn Scorer> {
        Box::new(TfIdfScorer {
            idf: idf(ctx.term.doc_freq, ctx.collection.num_docs()),
            boost: ctx.field_boost,
        })
    }
}

struct TfIdfScorer {
    idf: f32,
    boost: f32,
}

impl Scorer for TfIdfScorer {
    fn score(&self, _doc: DocId, weight: f32) -> Score {
        self.boost * self.idf * weight
    }

    fn max_score(&self, block_max_weight: f32) -> Score {
        self.boost * self.idf * block_max_weight
    }
}
