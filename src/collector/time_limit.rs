use super::{Collector, Results};
use crate::error::LexisError;
use crate::matcher::Matcher;
use crate::DocId;
use crate::Result;
use crate::Score;
use std::time::Instant;

/// Checks the clock once every this many documents.
const DOCS_PER_CHECK: u64 = 64;

/// Wraps any collector with a deadline on a monotonic clock.
///
/// When the deadline passes, `collect` fails with
/// [`LexisError::TimeLimit`]; whatever was collected so far remains
/// harvestable, and the search driver marks the results partial.
pub struct TimeLimitCollector {
    inner: Box<dyn Collector>,
    deadline: Instant,
    docs_since_check: u64,
}

impl TimeLimitCollector {
    pub fn wrap(inner: Box<dyn Collector>, deadline: Instant) -> TimeLimitCollector {
        TimeLimitCollector {
            inner,
            deadline,
            docs_since_check: 0,
        }
    }
}

impl Collector for TimeLimitCollector {
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()> {
        if self.docs_since_check == 0 && Instant::now() >= self.deadline {
            return Err(LexisError::TimeLimit);
        }
        self.docs_since_check = (self.docs_since_check + 1) % DOCS_PER_CHECK;
        self.inner.collect(doc, matcher)
    }

    fn quality_threshold(&self) -> Option<Score> {
        self.inner.quality_threshold()
    }

    fn harvest(self: Box<Self>) -> Results {
        self.inner.harvest()
    }
}
