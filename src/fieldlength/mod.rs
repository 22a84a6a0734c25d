//! Per-document field lengths, in tokens.
//!
//! The length of each indexed text field is recorded at indexing time
//! and read back in O(1) by the scorers (BM25F normalizes term
//! frequencies by it).

use crate::common::{CompositeFile, CompositeWrite};
use crate::schema::{Field, Schema};
use crate::storage::ReadOnlySource;
use crate::DocId;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::io;
use std::io::Write;

/// Accumulates the lengths of every indexed text field.
pub struct FieldLengthsWriter {
    lengths: HashMap<Field, Vec<u32>>,
}

impl FieldLengthsWriter {
    pub fn for_schema(schema: &Schema) -> FieldLengthsWriter {
        let mut lengths = HashMap::new();
        for (field, entry) in schema.fields() {
            if entry.field_type().analyzer().is_some() {
                lengths.insert(field, Vec::new());
            }
        }
        FieldLengthsWriter { lengths }
    }

    /// Records the token count of `field` in `doc`.
    pub fn record(&mut self, doc: DocId, field: Field, num_tokens: u32) {
        if let Some(field_lengths) = self.lengths.get_mut(&field) {
            debug_assert!(field_lengths.len() <= doc as usize);
            field_lengths.resize(doc as usize, 0);
            field_lengths.push(num_tokens);
        }
    }

    /// Pads every field up to `max_doc` entries.
    pub fn fill_up_to_max_doc(&mut self, max_doc: DocId) {
        for field_lengths in self.lengths.values_mut() {
            field_lengths.resize(max_doc as usize, 0);
        }
    }

    /// Total token count per field, for the collection statistics kept
    /// in the table of contents.
    pub fn totals(&self) -> Vec<(Field, u64)> {
        let mut totals: Vec<(Field, u64)> = self
            .lengths
            .iter()
            .map(|(&field, lengths)| (field, lengths.iter().map(|&len| u64::from(len)).sum()))
            .collect();
        totals.sort_by_key(|&(field, _)| field);
        totals
    }

    pub fn serialize(&self, composite: &mut CompositeWrite) -> io::Result<()> {
        let mut fields: Vec<Field> = self.lengths.keys().cloned().collect();
        fields.sort();
        for field in fields {
            let write = composite.for_field(field);
            let mut buffer = [0u8; 4];
            for &len in &self.lengths[&field] {
                LittleEndian::write_u32(&mut buffer, len);
                write.write_all(&buffer)?;
            }
        }
        Ok(())
    }
}

/// O(1) random access over the lengths of one field.
#[derive(Clone)]
pub struct LengthReader {
    data: ReadOnlySource,
}

impl LengthReader {
    pub fn get(&self, doc: DocId) -> u32 {
        let offset = doc as usize * 4;
        LittleEndian::read_u32(&self.data.as_slice()[offset..offset + 4])
    }

    pub fn num_docs(&self) -> u32 {
        (self.data.len() / 4) as u32
    }
}

/// All the length arrays of a segment.
#[derive(Clone)]
pub struct FieldLengthsReader {
    composite: CompositeFile,
}

impl FieldLengthsReader {
    pub fn open(composite: CompositeFile) -> FieldLengthsReader {
        FieldLengthsReader { composite }
    }

    pub fn length_reader(&self, field: Field) -> Option<LengthReader> {
        self.composite
            .open_read(field)
            .map(|data| LengthReader { data })
    }

    /// The length of `field` in `doc`, 0 if the field has no lengths.
    pub fn doc_field_length(&self, doc: DocId, field: Field) -> u32 {
        self.length_reader(field)
            .map(|reader| reader.get(doc))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{text_options, Schema};
    use crate::storage::{RamStorage, Storage};
    use std::path::Path;

    #[test]
    fn test_lengths_round_trip() {
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", text_options());
        let body = builder.add_text_field("body", text_options());
        let schema = builder.build();

        let storage = RamStorage::create();
        let path = Path::new("seg.len");
        {
            let mut writer = FieldLengthsWriter::for_schema(&schema);
            writer.record(0, title, 3);
            writer.record(0, body, 120);
            writer.record(2, title, 7);
            writer.fill_up_to_max_doc(4);
            let mut composite = CompositeWrite::wrap(storage.open_write(path).unwrap());
            writer.serialize(&mut composite).unwrap();
            composite.close().unwrap();
        }
        let composite = CompositeFile::open(storage.open_read(path).unwrap()).unwrap();
        let reader = FieldLengthsReader::open(composite);
        assert_eq!(reader.doc_field_length(0, title), 3);
        assert_eq!(reader.doc_field_length(0, body), 120);
        assert_eq!(reader.doc_field_length(1, title), 0);
        assert_eq!(reader.doc_field_length(2, title), 7);
        assert_eq!(reader.doc_field_length(3, body), 0);
        assert_eq!(reader.length_reader(title).unwrap().num_docs(), 4);
    }
}
