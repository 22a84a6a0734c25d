use super::{
    MISSING_NUMERIC, TAG_BOOL, TAG_BYTES, TAG_COMPRESSED_BYTES, TAG_DICT_BYTES, TAG_NUMERIC,
};
use crate::common::VInt;
use crate::storage::ReadOnlySource;
use crate::DocId;
use byteorder::{ByteOrder, LittleEndian};
use std::io;
use std::sync::Arc;

/// A value read back from a column.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnValue {
    U64(u64),
    Bytes(Vec<u8>),
    Bool(bool),
}

enum ColumnData {
    Numeric {
        data: ReadOnlySource,
    },
    Bool {
        data: ReadOnlySource,
    },
    Bytes {
        // decoded section layout shared by plain and compressed bytes
        section: BytesSection,
    },
    DictBytes {
        dictionary: Arc<Vec<Vec<u8>>>,
        ords: ReadOnlySource,
    },
}

enum BytesSection {
    Raw {
        presence_start: usize,
        offsets_start: usize,
        data_start: usize,
        source: ReadOnlySource,
    },
    Decompressed {
        presence_start: usize,
        offsets_start: usize,
        data_start: usize,
        buffer: Arc<Vec<u8>>,
    },
}

impl BytesSection {
    fn bytes(&self) -> &[u8] {
        match self {
            BytesSection::Raw { source, .. } => source.as_slice(),
            BytesSection::Decompressed { buffer, .. } => &buffer[..],
        }
    }

    fn layout(&self) -> (usize, usize, usize) {
        match *self {
            BytesSection::Raw {
                presence_start,
                offsets_start,
                data_start,
                ..
            }
            | BytesSection::Decompressed {
                presence_start,
                offsets_start,
                data_start,
                ..
            } => (presence_start, offsets_start, data_start),
        }
    }
}

/// Random access over one column.
pub struct ColumnReader {
    num_docs: u32,
    data: ColumnData,
}

fn bytes_section_layout(slice: &[u8], start: usize) -> io::Result<(u32, usize, usize, usize)> {
    let (num_docs, vint_len) = VInt::deserialize_from_slice(&slice[start..])
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated column"))?;
    let presence_start = start + vint_len;
    let num_presence_words = (num_docs as usize + 63) / 64;
    let offsets_start = presence_start + num_presence_words * 8;
    let data_start = offsets_start + (num_docs as usize + 1) * 8;
    Ok((num_docs as u32, presence_start, offsets_start, data_start))
}

impl ColumnReader {
    pub fn open(source: ReadOnlySource) -> io::Result<ColumnReader> {
        let slice = source.as_slice();
        if slice.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty column",
            ));
        }
        let tag = slice[0];
        match tag {
            TAG_NUMERIC => {
                let (num_docs, vint_len) = VInt::deserialize_from_slice(&slice[1..])
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::UnexpectedEof, "truncated column")
                    })?;
                Ok(ColumnReader {
                    num_docs: num_docs as u32,
                    data: ColumnData::Numeric {
                        data: source.slice_from(1 + vint_len),
                    },
                })
            }
            TAG_BOOL => {
                let (num_docs, vint_len) = VInt::deserialize_from_slice(&slice[1..])
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::UnexpectedEof, "truncated column")
                    })?;
                Ok(ColumnReader {
                    num_docs: num_docs as u32,
                    data: ColumnData::Bool {
                        data: source.slice_from(1 + vint_len),
                    },
                })
            }
            TAG_BYTES => {
                let (num_docs, presence_start, offsets_start, data_start) =
                    bytes_section_layout(slice, 1)?;
                Ok(ColumnReader {
                    num_docs,
                    data: ColumnData::Bytes {
                        section: BytesSection::Raw {
                            presence_start,
                            offsets_start,
                            data_start,
                            source,
                        },
                    },
                })
            }
            TAG_COMPRESSED_BYTES => {
                let (compressed_len, vint_len) = VInt::deserialize_from_slice(&slice[1..])
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::UnexpectedEof, "truncated column")
                    })?;
                let compressed =
                    &slice[1 + vint_len..1 + vint_len + compressed_len as usize];
                let buffer = snap::Decoder::new()
                    .decompress_vec(compressed)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
                let (num_docs, presence_start, offsets_start, data_start) =
                    bytes_section_layout(&buffer, 0)?;
                Ok(ColumnReader {
                    num_docs,
                    data: ColumnData::Bytes {
                        section: BytesSection::Decompressed {
                            presence_start,
                            offsets_start,
                            data_start,
                            buffer: Arc::new(buffer),
                        },
                    },
                })
            }
            TAG_DICT_BYTES => {
                let mut offset = 1usize;
                let mut read_vint = |offset: &mut usize| -> io::Result<u64> {
                    let (val, read) =
                        VInt::deserialize_from_slice(&slice[*offset..]).ok_or_else(|| {
                            io::Error::new(io::ErrorKind::UnexpectedEof, "truncated column")
                        })?;
                    *offset += read;
                    Ok(val)
                };
                let num_docs = read_vint(&mut offset)? as u32;
                let num_entries = read_vint(&mut offset)? as usize;
                let mut dictionary = Vec::with_capacity(num_entries);
                for _ in 0..num_entries {
                    let len = read_vint(&mut offset)? as usize;
                    dictionary.push(slice[offset..offset + len].to_vec());
                    offset += len;
                }
                Ok(ColumnReader {
                    num_docs,
                    data: ColumnData::DictBytes {
                        dictionary: Arc::new(dictionary),
                        ords: source.slice_from(offset),
                    },
                })
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown column tag {}", tag),
            )),
        }
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// The value of `doc`, or None when the document has no value.
    pub fn value(&self, doc: DocId) -> Option<ColumnValue> {
        if doc >= self.num_docs {
            return None;
        }
        match &self.data {
            ColumnData::Numeric { data } => {
                let val = LittleEndian::read_u64(&data.as_slice()[doc as usize * 8..]);
                if val == MISSING_NUMERIC {
                    None
                } else {
                    Some(ColumnValue::U64(val))
                }
            }
            ColumnData::Bool { data } => {
                let word =
                    LittleEndian::read_u64(&data.as_slice()[(doc as usize / 64) * 8..]);
                Some(ColumnValue::Bool(word & (1u64 << (doc % 64)) != 0))
            }
            ColumnData::Bytes { section } => {
                let (presence_start, offsets_start, data_start) = section.layout();
                let bytes = section.bytes();
                let word = LittleEndian::read_u64(
                    &bytes[presence_start + (doc as usize / 64) * 8..],
                );
                if word & (1u64 << (doc % 64)) == 0 {
                    return None;
                }
                let start = LittleEndian::read_u64(
                    &bytes[offsets_start + doc as usize * 8..],
                ) as usize;
                let end = LittleEndian::read_u64(
                    &bytes[offsets_start + (doc as usize + 1) * 8..],
                ) as usize;
                Some(ColumnValue::Bytes(
                    bytes[data_start + start..data_start + end].to_vec(),
                ))
            }
            ColumnData::DictBytes { dictionary, ords } => {
                let ord = LittleEndian::read_u32(&ords.as_slice()[doc as usize * 4..]);
                if ord == 0 {
                    None
                } else {
                    Some(ColumnValue::Bytes(dictionary[ord as usize - 1].clone()))
                }
            }
        }
    }

    /// The `u64` image of a numeric column value.
    pub fn u64_value(&self, doc: DocId) -> Option<u64> {
        match self.value(doc)? {
            ColumnValue::U64(val) => Some(val),
            _ => None,
        }
    }
}
