use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out increasing operation stamps.
///
/// Stamps order adds and deletes relative to each other: a delete only
/// affects documents whose stamp precedes it.
#[derive(Clone, Default)]
pub struct Stamper(Arc<AtomicU64>);

impl Stamper {
    pub fn new(first_opstamp: u64) -> Stamper {
        Stamper(Arc::new(AtomicU64::new(first_opstamp)))
    }

    pub fn stamp(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Reserves a contiguous range of `count` stamps.
    pub fn stamps(&self, count: u64) -> Range<u64> {
        let start = self.0.fetch_add(count, Ordering::SeqCst);
        Range {
            start,
            end: start + count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Stamper;

    #[test]
    fn test_stamper() {
        let stamper = Stamper::new(7);
        assert_eq!(stamper.stamp(), 7);
        assert_eq!(stamper.stamp(), 8);
        let range = stamper.stamps(3);
        assert_eq!(range, 9..12);
        assert_eq!(stamper.stamp(), 12);
        let stamper_clone = stamper.clone();
        assert_eq!(stamper_clone.stamp(), 13);
        assert_eq!(stamper.stamp(), 14);
    }
}
