//! Postings: the per-term lists of matching documents.
//!
//! On disk a term's postings are a sequence of blocks of up to
//! [`BLOCK_SIZE`] documents. Each block carries its min/max document id,
//! its maximum raw weight and its byte length, so readers can skip whole
//! blocks both by document id and by quality bound without decoding
//! them.

mod pool;
mod recorder;
mod segment_postings;
mod serializer;

pub use self::pool::{PoolReader, PostingsPool};
pub use self::recorder::Recorder;
pub use self::segment_postings::{BlockCursor, SegmentPostings};
pub use self::serializer::{InvertedIndexSerializer, PostingsSerializer};

/// Maximum number of documents per postings block.
pub const BLOCK_SIZE: usize = 128;
