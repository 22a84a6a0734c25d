use super::{Scorer, ScoringContext, Weighting};
use crate::schema::Field;
use crate::DocId;
use crate::Score;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes each field to its own model, with a default for the rest.
pub struct MultiWeighting {
    default: Arc<dyn Weighting>,
    per_field: HashMap<Field, Arc<dyn Weighting>>,
}

impl MultiWeighting {
    pub fn new<W: Weighting>(default: W) -> MultiWeighting {
        MultiWeighting {
            default: Arc::new(default),
            per_field: HashMap::new(),
        }
    }

    pub fn set_field_weighting<W: Weighting>(mut self, field: Field, weighting: W) -> MultiWeighting {
        self.per_field.insert(field, Arc::new(weighting));
        self
    }
}

impl Weighting for MultiWeighting {
    fn scorer(&self, ctx: ScoringContext) -> Box<dyn Scorer> {
        self.per_field
            .get(&ctx.field)
            .unwrap_or(&self.default)
            .scorer(ctx)
    }
}

/// Negates another model's scores, turning best-first into worst-first.
///
/// Block-max bounds do not survive negation, so quality pruning is
/// disabled.
pub struct ReverseWeighting {
    inner: Arc<dyn Weighting>,
}

impl ReverseWeighting {
    pub fn new<W: Weighting>(inner: W) -> ReverseWeighting {
        ReverseWeighting {
            inner: Arc::new(inner),
        }
    }
}

impl Weighting for ReverseWeighting {
    fn scorer(&self, ctx: ScoringContext) -> Box<dyn Scorer> {
        Box::new(ReverseScorer {
            inner: self.inner.scorer(ctx),
        })
    }
}

struct ReverseScorer {
    inner: Box<dyn Scorer>,
}

impl Scorer for ReverseScorer {
    fn score(&self, doc: DocId, weight: f32) -> Score {
        -self.inner.score(doc, weight)
    }

    fn max_score(&self, _block_max_weight: f32) -> Score {
        std::f32::INFINITY
    }

    fn supports_block_quality(&self) -> bool {
        false
    }
}

/// Scores through a user callback receiving `(doc, raw weight)`.
pub struct FunctionWeighting {
    function: Arc<dyn Fn(DocId, f32) -> Score + Send + Sync>,
}

impl FunctionWeighting {
    pub fn new<F>(function: F) -> FunctionWeighting
    where
        F: Fn(DocId, f32) -> Score + Send + Sync + 'static,
    {
        FunctionWeighting {
            function: Arc::new(function),
        }
    }
}

impl Weighting for FunctionWeighting {
    fn scorer(&self, _ctx: ScoringContext) -> Box<dyn Scorer> {
        Box::new(FunctionScorer {
            function: self.function.clone(),
        })
    }
}

struct FunctionScorer {
    function: Arc<dyn Fn(DocId, f32) -> Score + Send + Sync>,
}

impl Scorer for FunctionScorer {
    fn score(&self, doc: DocId, weight: f32) -> Score {
        (self.function)(doc, weight)
    }

    fn max_score(&self, _block_max_weight: f32) -> Score {
        std::f32::INFINITY
    }

    fn supports_block_quality(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{CollectionStatistics, FrequencyWeighting, TermStatistics};

    fn ctx(collection: &CollectionStatistics) -> ScoringContext<'_> {
        ScoringContext {
            field: Field(0),
            field_boost: 1.0,
            collection,
            term: TermStatistics {
                doc_freq: 1,
                total_freq: 1,
            },
            lengths: None,
        }
    }

    #[test]
    fn test_reverse_weighting() {
        let collection = CollectionStatistics::default();
        let weighting = ReverseWeighting::new(FrequencyWeighting);
        let scorer = weighting.scorer(ctx(&collection));
        assert_eq!(scorer.score(0, 3.0), -3.0);
        assert!(!scorer.supports_block_quality());
    }

    #[test]
    fn test_function_weighting() {
        let collection = CollectionStatistics::default();
        let weighting = FunctionWeighting::new(|doc, weight| doc as f32 + weight);
        let scorer = weighting.scorer(ctx(&collection));
        assert_eq!(scorer.score(4, 1.5), 5.5);
    }
}
