//! Forward vectors: per-document `(term, positions)` lists for a field.
//!
//! Vectors serve the vector-based phrase matcher and key-term
//! extraction. Each vector-bearing field is a sub-file of the segment's
//! `.vec` composite file: a data section of per-doc prefix-coded term
//! lists, followed by a doc offset table.

use crate::common::{BinarySerializable, CountingWriter, VInt};
use crate::schema::{Field, Schema};
use crate::storage::{ReadOnlySource, WritePtr};
use crate::DocId;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::io::Write;

struct PerFieldVectors {
    data: Vec<u8>,
    doc_offsets: Vec<u64>,
}

impl PerFieldVectors {
    fn add_doc(&mut self, doc: DocId, terms: &BTreeMap<Vec<u8>, Vec<u32>>) {
        while self.doc_offsets.len() < doc as usize {
            // documents without this field get an empty vector
            self.doc_offsets.push(self.data.len() as u64);
        }
        self.doc_offsets.push(self.data.len() as u64);
        let mut previous: &[u8] = &[];
        for (term, positions) in terms {
            let shared = term
                .iter()
                .zip(previous.iter())
                .take_while(|(a, b)| a == b)
                .count();
            VInt(shared as u64).serialize_into_vec(&mut self.data);
            VInt((term.len() - shared) as u64).serialize_into_vec(&mut self.data);
            self.data.extend_from_slice(&term[shared..]);
            VInt(positions.len() as u64).serialize_into_vec(&mut self.data);
            let mut last_position = 0u32;
            for &position in positions {
                VInt(u64::from(position - last_position)).serialize_into_vec(&mut self.data);
                last_position = position;
            }
            previous = term;
        }
    }
}

/// Accumulates the vectors of every vector-bearing field of a segment.
pub struct VectorsWriter {
    fields: HashMap<Field, PerFieldVectors>,
}

impl VectorsWriter {
    pub fn for_schema(schema: &Schema) -> VectorsWriter {
        let mut fields = HashMap::new();
        for (field, entry) in schema.fields() {
            if entry.field_type().has_vectors() {
                fields.insert(
                    field,
                    PerFieldVectors {
                        data: Vec::new(),
                        doc_offsets: Vec::new(),
                    },
                );
            }
        }
        VectorsWriter { fields }
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Records the vector of `field` in `doc`: term bytes mapped to
    /// ascending positions.
    pub fn record(&mut self, doc: DocId, field: Field, terms: &BTreeMap<Vec<u8>, Vec<u32>>) {
        if let Some(per_field) = self.fields.get_mut(&field) {
            per_field.add_doc(doc, terms);
        }
    }

    pub fn fill_up_to_max_doc(&mut self, max_doc: DocId) {
        for per_field in self.fields.values_mut() {
            while per_field.doc_offsets.len() < max_doc as usize {
                per_field.doc_offsets.push(per_field.data.len() as u64);
            }
        }
    }

    pub fn serialize(
        &self,
        composite: &mut crate::common::CompositeWrite,
    ) -> io::Result<()> {
        let mut fields: Vec<Field> = self.fields.keys().cloned().collect();
        fields.sort();
        for field in fields {
            let per_field = &self.fields[&field];
            let write: &mut CountingWriter<WritePtr> = composite.for_field(field);
            write.write_all(&per_field.data)?;
            for &offset in &per_field.doc_offsets {
                offset.serialize(write)?;
            }
            (per_field.data.len() as u64).serialize(write)?;
            (per_field.doc_offsets.len() as u64).serialize(write)?;
        }
        Ok(())
    }
}

/// Read access to the vectors of one field.
#[derive(Clone)]
pub struct VectorReader {
    data: ReadOnlySource,
    offsets_start: usize,
    num_docs: u32,
}

impl VectorReader {
    pub fn open(source: ReadOnlySource) -> io::Result<VectorReader> {
        let len = source.len();
        if len < 16 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "vector file too short",
            ));
        }
        let mut footer = &source.as_slice()[len - 16..];
        let data_len = u64::deserialize(&mut footer)? as usize;
        let num_docs = u64::deserialize(&mut footer)? as u32;
        Ok(VectorReader {
            data: source,
            offsets_start: data_len,
            num_docs,
        })
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// The `(term, positions)` list of `doc`, terms in increasing byte
    /// order.
    pub fn vector(&self, doc: DocId) -> Vec<(Vec<u8>, Vec<u32>)> {
        if doc >= self.num_docs {
            return Vec::new();
        }
        let slice = self.data.as_slice();
        let start = LittleEndian::read_u64(
            &slice[self.offsets_start + doc as usize * 8..],
        ) as usize;
        let end = if doc + 1 < self.num_docs {
            LittleEndian::read_u64(&slice[self.offsets_start + (doc as usize + 1) * 8..]) as usize
        } else {
            self.offsets_start
        };
        let mut entries = Vec::new();
        let mut cursor = &slice[start..end];
        let mut term: Vec<u8> = Vec::new();
        while !cursor.is_empty() {
            let (shared, read) = match VInt::deserialize_from_slice(cursor) {
                Some(pair) => pair,
                None => break,
            };
            cursor = &cursor[read..];
            let (suffix_len, read) = match VInt::deserialize_from_slice(cursor) {
                Some(pair) => pair,
                None => break,
            };
            cursor = &cursor[read..];
            term.truncate(shared as usize);
            term.extend_from_slice(&cursor[..suffix_len as usize]);
            cursor = &cursor[suffix_len as usize..];
            let (num_positions, read) = match VInt::deserialize_from_slice(cursor) {
                Some(pair) => pair,
                None => break,
            };
            cursor = &cursor[read..];
            let mut positions = Vec::with_capacity(num_positions as usize);
            let mut position = 0u32;
            for _ in 0..num_positions {
                let (delta, read) = match VInt::deserialize_from_slice(cursor) {
                    Some(pair) => pair,
                    None => break,
                };
                cursor = &cursor[read..];
                position += delta as u32;
                positions.push(position);
            }
            entries.push((term.clone(), positions));
        }
        entries
    }

    /// The positions of `term` in `doc`, if present.
    pub fn positions_of(&self, doc: DocId, term: &[u8]) -> Option<Vec<u32>> {
        self.vector(doc)
            .into_iter()
            .find(|(entry_term, _)| &entry_term[..] == term)
            .map(|(_, positions)| positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CompositeFile, CompositeWrite};
    use crate::schema::{text_options, Schema};
    use crate::storage::{RamStorage, Storage};
    use std::path::Path;

    #[test]
    fn test_vectors_round_trip() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options().set_vectors());
        let schema = builder.build();
        let storage = RamStorage::create();
        let path = Path::new("seg.vec");
        {
            let mut writer = VectorsWriter::for_schema(&schema);
            let mut terms = BTreeMap::new();
            terms.insert(b"lamb".to_vec(), vec![4u32]);
            terms.insert(b"little".to_vec(), vec![3u32]);
            terms.insert(b"mary".to_vec(), vec![0u32, 7]);
            writer.record(0, content, &terms);
            writer.fill_up_to_max_doc(3);
            let mut other = BTreeMap::new();
            other.insert(b"lamb".to_vec(), vec![1u32]);
            writer.record(3, content, &other);
            writer.fill_up_to_max_doc(4);
            let mut composite = CompositeWrite::wrap(storage.open_write(path).unwrap());
            writer.serialize(&mut composite).unwrap();
            composite.close().unwrap();
        }
        let composite = CompositeFile::open(storage.open_read(path).unwrap()).unwrap();
        let reader = VectorReader::open(composite.open_read(content).unwrap()).unwrap();
        assert_eq!(reader.num_docs(), 4);
        let vector = reader.vector(0);
        assert_eq!(vector.len(), 3);
        assert_eq!(vector[0], (b"lamb".to_vec(), vec![4]));
        assert_eq!(vector[2], (b"mary".to_vec(), vec![0, 7]));
        assert!(reader.vector(1).is_empty());
        assert_eq!(reader.positions_of(3, b"lamb"), Some(vec![1]));
        assert_eq!(reader.positions_of(3, b"mary"), None);
    }
}
