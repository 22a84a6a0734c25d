use super::{Scorer, ScoringContext, Weighting};
use crate::DocId;
use crate::Score;

/// Scores by raw term weight. Useful for debugging and as the base of
/// sorted searches where the score is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrequencyWeighting;

impl Weighting for FrequencyWeighting {
    fn scorer(&self, ctx: ScoringContext) -> Box<dyn Scorer> {
        Box::new(FrequencyScorer {
            boost: ctx.field_boost,
        })
    }
}

struct FrequencyScorer {
    boost: f32,
}

impl Scorer for FrequencyScorer {
    fn score(&self, _doc: DocId, weight: f32) -> Score {
        self.boost * weight
    }

    fn max_score(&self, block_max_weight: f32) -> Score {
        self.boost * block_max_weight
    }
}
