use crate::core::{SegmentId, SegmentMeta};
use std::fmt;

/// A set of segments the policy proposes to merge into one.
#[derive(Debug, Clone)]
pub struct MergeCandidate(pub Vec<SegmentId>);

/// Decides which segments to merge at commit time.
pub trait MergePolicy: fmt::Debug + Send + Sync {
    fn compute_merge_candidates(&self, segments: &[SegmentMeta]) -> Vec<MergeCandidate>;
}

/// Tiered policy: segments are bucketed by the logarithm of their live
/// document count, and a bucket is merged once it holds enough
/// segments. Small segments (below `min_layer_size`) all land in the
/// same bucket, so a stream of tiny flushes keeps collapsing.
#[derive(Debug, Clone)]
pub struct LogMergePolicy {
    min_merge_size: usize,
    min_layer_size: u32,
    level_log_size: f64,
}

impl LogMergePolicy {
    pub fn set_min_merge_size(&mut self, min_merge_size: usize) {
        self.min_merge_size = min_merge_size;
    }

    pub fn set_min_layer_size(&mut self, min_layer_size: u32) {
        self.min_layer_size = min_layer_size;
    }

    pub fn set_level_log_size(&mut self, level_log_size: f64) {
        self.level_log_size = level_log_size;
    }

    fn clip_log(&self, num_docs: u32) -> f64 {
        f64::from(num_docs.max(self.min_layer_size)).log2()
    }
}

impl Default for LogMergePolicy {
    fn default() -> LogMergePolicy {
        LogMergePolicy {
            min_merge_size: 8,
            min_layer_size: 10_000,
            level_log_size: 0.75,
        }
    }
}

impl MergePolicy for LogMergePolicy {
    fn compute_merge_candidates(&self, segments: &[SegmentMeta]) -> Vec<MergeCandidate> {
        let mut sorted: Vec<&SegmentMeta> = segments.iter().collect();
        sorted.sort_by_key(|meta| std::cmp::Reverse(meta.num_docs()));

        let mut candidates: Vec<MergeCandidate> = Vec::new();
        let mut current_bucket: Vec<SegmentId> = Vec::new();
        let mut bucket_ceiling = f64::MAX;
        for meta in sorted {
            let log_size = self.clip_log(meta.num_docs());
            if log_size < bucket_ceiling - self.level_log_size {
                if current_bucket.len() >= self.min_merge_size {
                    candidates.push(MergeCandidate(std::mem::replace(
                        &mut current_bucket,
                        Vec::new(),
                    )));
                } else {
                    current_bucket.clear();
                }
                bucket_ceiling = log_size;
            }
            current_bucket.push(meta.id());
        }
        if current_bucket.len() >= self.min_merge_size {
            candidates.push(MergeCandidate(current_bucket));
        }
        candidates
    }
}

/// Policy that never merges.
#[derive(Debug, Clone, Default)]
pub struct NoMergePolicy;

impl MergePolicy for NoMergePolicy {
    fn compute_merge_candidates(&self, _segments: &[SegmentMeta]) -> Vec<MergeCandidate> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SegmentMetaInventory;

    fn metas_with_sizes(sizes: &[u32]) -> (SegmentMetaInventory, Vec<SegmentMeta>) {
        let inventory = SegmentMetaInventory::new();
        let metas = sizes
            .iter()
            .map(|&num_docs| {
                inventory.new_segment_meta(SegmentId::generate_random(), num_docs)
            })
            .collect();
        (inventory, metas)
    }

    #[test]
    fn test_log_merge_policy_merges_small_tier() {
        let (_inventory, metas) = metas_with_sizes(&[10, 10, 10, 10, 10, 10, 10, 10]);
        let candidates = LogMergePolicy::default().compute_merge_candidates(&metas);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0.len(), 8);
    }

    #[test]
    fn test_log_merge_policy_needs_enough_segments() {
        let (_inventory, metas) = metas_with_sizes(&[10, 10, 10]);
        let candidates = LogMergePolicy::default().compute_merge_candidates(&metas);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_log_merge_policy_keeps_big_segments_apart() {
        // one big segment must not be pulled into the small tier
        let (_inventory, metas) =
            metas_with_sizes(&[5_000_000, 10, 10, 10, 10, 10, 10, 10, 10]);
        let candidates = LogMergePolicy::default().compute_merge_candidates(&metas);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0.len(), 8);
        let big_id = metas[0].id();
        assert!(!candidates[0].0.contains(&big_id));
    }

    #[test]
    fn test_no_merge_policy() {
        let (_inventory, metas) = metas_with_sizes(&[10; 20]);
        assert!(NoMergePolicy.compute_merge_candidates(&metas).is_empty());
    }
}
