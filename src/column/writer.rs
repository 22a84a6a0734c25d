use super::reader::ColumnValue;
use super::{
    MISSING_NUMERIC, TAG_BOOL, TAG_BYTES, TAG_COMPRESSED_BYTES, TAG_DICT_BYTES, TAG_NUMERIC,
};
use crate::common::{BinarySerializable, VInt};
use crate::schema::ColumnType;
use crate::DocId;
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::io;
use std::io::Write;

/// Accumulates the column values of one field, one value per document.
///
/// Documents without a value are padded with the format's missing
/// marker.
pub struct ColumnWriter {
    column_type: ColumnType,
    numerics: Vec<u64>,
    bytes: Vec<Option<Vec<u8>>>,
    bools: Vec<bool>,
}

impl ColumnWriter {
    pub fn new(column_type: ColumnType) -> ColumnWriter {
        ColumnWriter {
            column_type,
            numerics: Vec::new(),
            bytes: Vec::new(),
            bools: Vec::new(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    fn num_docs(&self) -> u32 {
        match self.column_type {
            ColumnType::Numeric => self.numerics.len() as u32,
            ColumnType::Bool => self.bools.len() as u32,
            _ => self.bytes.len() as u32,
        }
    }

    /// Records the value of `doc`. Docs must arrive in increasing
    /// order; at most one value per doc is kept (the first wins).
    pub fn add_value(&mut self, doc: DocId, value: ColumnValue) {
        if self.num_docs() > doc {
            return;
        }
        self.fill_up_to_max_doc(doc);
        match (self.column_type, value) {
            (ColumnType::Numeric, ColumnValue::U64(val)) => {
                self.numerics.push(val);
            }
            (ColumnType::Bool, ColumnValue::Bool(val)) => {
                self.bools.push(val);
            }
            (ColumnType::Bytes, ColumnValue::Bytes(val))
            | (ColumnType::DictBytes, ColumnValue::Bytes(val))
            | (ColumnType::CompressedBytes, ColumnValue::Bytes(val)) => {
                self.bytes.push(Some(val));
            }
            (column_type, value) => {
                debug_assert!(
                    false,
                    "value {:?} does not fit column type {:?}",
                    value, column_type
                );
            }
        }
    }

    /// Pads missing documents up to `max_doc`.
    pub fn fill_up_to_max_doc(&mut self, max_doc: DocId) {
        match self.column_type {
            ColumnType::Numeric => self.numerics.resize(max_doc as usize, MISSING_NUMERIC),
            ColumnType::Bool => self.bools.resize(max_doc as usize, false),
            _ => self.bytes.resize(max_doc as usize, None),
        }
    }

    pub fn serialize<W: Write>(&self, write: &mut W) -> io::Result<()> {
        match self.column_type {
            ColumnType::Numeric => {
                TAG_NUMERIC.serialize(write)?;
                VInt(self.numerics.len() as u64).serialize(write)?;
                for &val in &self.numerics {
                    write.write_u64::<LittleEndian>(val)?;
                }
            }
            ColumnType::Bool => {
                TAG_BOOL.serialize(write)?;
                VInt(self.bools.len() as u64).serialize(write)?;
                let mut word = 0u64;
                for (idx, &val) in self.bools.iter().enumerate() {
                    if val {
                        word |= 1u64 << (idx % 64);
                    }
                    if idx % 64 == 63 {
                        write.write_u64::<LittleEndian>(word)?;
                        word = 0;
                    }
                }
                if self.bools.len() % 64 != 0 {
                    write.write_u64::<LittleEndian>(word)?;
                }
            }
            ColumnType::Bytes => {
                TAG_BYTES.serialize(write)?;
                self.serialize_bytes_section(write)?;
            }
            ColumnType::CompressedBytes => {
                TAG_COMPRESSED_BYTES.serialize(write)?;
                let mut section = Vec::new();
                self.serialize_bytes_section(&mut section)?;
                let compressed = snap::Encoder::new()
                    .compress_vec(&section)
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
                VInt(compressed.len() as u64).serialize(write)?;
                write.write_all(&compressed)?;
            }
            ColumnType::DictBytes => {
                TAG_DICT_BYTES.serialize(write)?;
                VInt(self.bytes.len() as u64).serialize(write)?;
                let mut dictionary: BTreeMap<&[u8], u32> = BTreeMap::new();
                for value in self.bytes.iter().flatten() {
                    let next_ord = dictionary.len() as u32;
                    dictionary.entry(&value[..]).or_insert(next_ord);
                }
                // re-number in sorted order so ord order is value order
                for (ord, (_, slot)) in dictionary.iter_mut().enumerate() {
                    *slot = ord as u32;
                }
                VInt(dictionary.len() as u64).serialize(write)?;
                for key in dictionary.keys() {
                    VInt(key.len() as u64).serialize(write)?;
                    write.write_all(key)?;
                }
                for value in &self.bytes {
                    // ord 0 is reserved for "missing"
                    let ord = value
                        .as_ref()
                        .map(|val| dictionary[&val[..]] + 1)
                        .unwrap_or(0);
                    write.write_u32::<LittleEndian>(ord)?;
                }
            }
        }
        Ok(())
    }

    /// `[num_docs][presence bitmap][offsets x (num_docs + 1)][data]`,
    /// offsets relative to the start of the data section. The presence
    /// bitmap distinguishes a missing value from an empty one.
    fn serialize_bytes_section<W: Write>(&self, write: &mut W) -> io::Result<()> {
        VInt(self.bytes.len() as u64).serialize(write)?;
        let mut word = 0u64;
        for (idx, value) in self.bytes.iter().enumerate() {
            if value.is_some() {
                word |= 1u64 << (idx % 64);
            }
            if idx % 64 == 63 {
                write.write_u64::<LittleEndian>(word)?;
                word = 0;
            }
        }
        if self.bytes.len() % 64 != 0 {
            write.write_u64::<LittleEndian>(word)?;
        }
        let mut offset = 0u64;
        for value in &self.bytes {
            write.write_u64::<LittleEndian>(offset)?;
            offset += value.as_ref().map(|val| val.len() as u64).unwrap_or(0);
        }
        write.write_u64::<LittleEndian>(offset)?;
        for value in self.bytes.iter().flatten() {
            write.write_all(value)?;
        }
        Ok(())
    }
}
