//! The index skeleton: segments, table of contents, readers, searcher.

mod index;
mod live_docs;
mod reader;
mod searcher;
#[allow(clippy::module_inception)]
mod segment;
mod segment_component;
mod segment_id;
mod segment_meta;
mod segment_reader;
mod toc;

pub use self::index::Index;
pub use self::live_docs::LiveDocs;
pub use self::reader::IndexReader;
pub use self::searcher::{SearchOptions, Searcher};
pub use self::segment::Segment;
pub use self::segment_component::SegmentComponent;
pub use self::segment_id::SegmentId;
pub use self::segment_meta::{DeleteMeta, SegmentMeta, SegmentMetaInventory};
pub use self::segment_reader::SegmentReader;
pub use self::toc::{TableOfContents, FORMAT_VERSION};
