//! Columns: dense per-document values backing sort, group-by and range
//! facets.
//!
//! Each column is a sub-file of the segment's `.col` composite file.
//! Five element formats are supported: fixed 8-byte numerics, raw
//! variable bytes, dictionary-encoded bytes, one-bit booleans, and
//! block-compressed bytes.

mod reader;
mod writer;

pub use self::reader::{ColumnReader, ColumnValue};
pub use self::writer::ColumnWriter;

pub(crate) const TAG_NUMERIC: u8 = 0;
pub(crate) const TAG_BYTES: u8 = 1;
pub(crate) const TAG_DICT_BYTES: u8 = 2;
pub(crate) const TAG_BOOL: u8 = 3;
pub(crate) const TAG_COMPRESSED_BYTES: u8 = 4;

/// Sentinel marking an absent numeric value.
pub(crate) const MISSING_NUMERIC: u64 = u64::max_value();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CompositeFile, CompositeWrite};
    use crate::schema::{ColumnType, Field};
    use crate::storage::{RamStorage, Storage};
    use std::path::Path;

    fn round_trip(column_type: ColumnType, values: Vec<Option<ColumnValue>>) -> ColumnReader {
        let storage = RamStorage::create();
        let path = Path::new("seg.col");
        {
            let mut writer = ColumnWriter::new(column_type);
            for (doc, value) in values.iter().enumerate() {
                if let Some(value) = value {
                    writer.add_value(doc as u32, value.clone());
                }
            }
            writer.fill_up_to_max_doc(values.len() as u32);
            let mut composite = CompositeWrite::wrap(storage.open_write(path).unwrap());
            writer.serialize(composite.for_field(Field(0))).unwrap();
            composite.close().unwrap();
        }
        let composite = CompositeFile::open(storage.open_read(path).unwrap()).unwrap();
        ColumnReader::open(composite.open_read(Field(0)).unwrap()).unwrap()
    }

    #[test]
    fn test_numeric_column() {
        let reader = round_trip(
            ColumnType::Numeric,
            vec![
                Some(ColumnValue::U64(20)),
                None,
                Some(ColumnValue::U64(10)),
                Some(ColumnValue::U64(15)),
            ],
        );
        assert_eq!(reader.num_docs(), 4);
        assert_eq!(reader.value(0), Some(ColumnValue::U64(20)));
        assert_eq!(reader.value(1), None);
        assert_eq!(reader.value(2), Some(ColumnValue::U64(10)));
        assert_eq!(reader.value(3), Some(ColumnValue::U64(15)));
    }

    #[test]
    fn test_bytes_column() {
        let reader = round_trip(
            ColumnType::Bytes,
            vec![
                Some(ColumnValue::Bytes(b"beta".to_vec())),
                Some(ColumnValue::Bytes(b"alpha".to_vec())),
                None,
            ],
        );
        assert_eq!(reader.value(0), Some(ColumnValue::Bytes(b"beta".to_vec())));
        assert_eq!(reader.value(1), Some(ColumnValue::Bytes(b"alpha".to_vec())));
        assert_eq!(reader.value(2), None);
    }

    #[test]
    fn test_dict_bytes_column() {
        let reader = round_trip(
            ColumnType::DictBytes,
            vec![
                Some(ColumnValue::Bytes(b"red".to_vec())),
                Some(ColumnValue::Bytes(b"blue".to_vec())),
                Some(ColumnValue::Bytes(b"red".to_vec())),
                None,
                Some(ColumnValue::Bytes(b"red".to_vec())),
            ],
        );
        assert_eq!(reader.value(0), Some(ColumnValue::Bytes(b"red".to_vec())));
        assert_eq!(reader.value(1), Some(ColumnValue::Bytes(b"blue".to_vec())));
        assert_eq!(reader.value(3), None);
        assert_eq!(reader.value(4), Some(ColumnValue::Bytes(b"red".to_vec())));
    }

    #[test]
    fn test_bool_column() {
        let reader = round_trip(
            ColumnType::Bool,
            vec![
                Some(ColumnValue::Bool(true)),
                Some(ColumnValue::Bool(false)),
                Some(ColumnValue::Bool(true)),
            ],
        );
        assert_eq!(reader.value(0), Some(ColumnValue::Bool(true)));
        assert_eq!(reader.value(1), Some(ColumnValue::Bool(false)));
        assert_eq!(reader.value(2), Some(ColumnValue::Bool(true)));
    }

    #[test]
    fn test_compressed_bytes_column() {
        let values: Vec<Option<ColumnValue>> = (0..200)
            .map(|i| Some(ColumnValue::Bytes(format!("value-{}", i % 10).into_bytes())))
            .collect();
        let reader = round_trip(ColumnType::CompressedBytes, values);
        assert_eq!(reader.value(13), Some(ColumnValue::Bytes(b"value-3".to_vec())));
        assert_eq!(reader.value(199), Some(ColumnValue::Bytes(b"value-9".to_vec())));
    }
}
