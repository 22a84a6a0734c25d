use super::{Collector, Hit, Results, TotalHits};
use crate::matcher::Matcher;
use crate::DocId;
use crate::Result;

/// Collects every matching document, in docnum order, with no pruning.
pub struct UnlimitedCollector {
    scored: bool,
    hits: Vec<Hit>,
}

impl UnlimitedCollector {
    pub fn new(scored: bool) -> UnlimitedCollector {
        UnlimitedCollector {
            scored,
            hits: Vec::new(),
        }
    }
}

impl Collector for UnlimitedCollector {
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()> {
        let score = if self.scored {
            Some(matcher.score())
        } else {
            None
        };
        self.hits.push(Hit {
            doc,
            score,
            sort_key: None,
        });
        Ok(())
    }

    fn harvest(self: Box<Self>) -> Results {
        let mut results = Results::new();
        results.total = TotalHits::exact(self.hits.len() as u64);
        results.hits = self.hits;
        results
    }
}
