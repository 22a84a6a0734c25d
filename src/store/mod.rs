//! The document store: stored field values, retrievable by document id.
//!
//! Documents are serialized into blocks of roughly [`BLOCK_SIZE`]
//! bytes, each block compressed with snappy. A block index mapping the
//! first document of each block to its byte range is appended at the
//! end of the file.

mod reader;
mod writer;

pub use self::reader::StoreReader;
pub use self::writer::StoreWriter;

/// Uncompressed size threshold that closes a block.
pub(crate) const BLOCK_SIZE: usize = 16_384;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Document, Field};
    use crate::storage::{RamStorage, Storage};
    use std::path::Path;

    fn make_doc(seed: usize) -> Document {
        let mut doc = Document::new();
        doc.add_text(Field(0), &format!("title {}", seed));
        doc.add_text(Field(1), &"payload ".repeat(seed % 17 + 1));
        doc
    }

    #[test]
    fn test_store_round_trip() {
        let storage = RamStorage::create();
        let path = Path::new("seg.fld");
        let num_docs = 500usize;
        {
            let mut writer = StoreWriter::wrap(storage.open_write(path).unwrap());
            for seed in 0..num_docs {
                writer.store(&make_doc(seed)).unwrap();
            }
            writer.close().unwrap();
        }
        let reader = StoreReader::open(storage.open_read(path).unwrap()).unwrap();
        assert_eq!(reader.num_docs(), num_docs as u32);
        for seed in (0..num_docs).step_by(7) {
            let doc = reader.get(seed as u32).unwrap();
            assert_eq!(doc, make_doc(seed));
        }
        // sequential access hits the cached block
        let doc = reader.get(42).unwrap();
        assert_eq!(doc.get_first(Field(0)).unwrap().text(), Some("title 42"));
        assert!(reader.get(num_docs as u32).is_err());
    }
}
