//! The write side: buffering documents, flushing segments, resolving
//! deletions, merging, and the atomic commit protocol.

mod index_writer;
mod merge_policy;
mod merger;
mod operation;
mod segment_writer;
mod stamper;

pub use self::index_writer::{
    CommitOptions, GroupAdder, IndexWriter, MergeMode, HEAP_SIZE_MIN,
};
pub use self::merge_policy::{LogMergePolicy, MergeCandidate, MergePolicy, NoMergePolicy};
pub use self::merger::IndexMerger;
pub use self::operation::{AddOperation, DeleteCriterion, DeleteOperation};
pub use self::segment_writer::SegmentWriter;
pub use self::stamper::Stamper;
