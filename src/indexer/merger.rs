use crate::column::ColumnWriter;
use crate::common::CompositeWrite;
use crate::core::{Segment, SegmentComponent, SegmentReader};
use crate::fieldlength::FieldLengthsWriter;
use crate::matcher::Matcher;
use crate::postings::InvertedIndexSerializer;
use crate::schema::{Field, PostingFormat, Schema, Term};
use crate::store::StoreWriter;
use crate::vector::VectorsWriter;
use crate::DocId;
use crate::Result;
use std::collections::BTreeMap;

/// Merges N segments into one, dropping deleted documents.
///
/// Readers are consumed in table-of-contents order, so the merged
/// docnums preserve the global ordering of the source segments.
pub struct IndexMerger {
    schema: Schema,
    readers: Vec<SegmentReader>,
    // local docnum -> merged docnum, None for deleted docs
    doc_mappings: Vec<Vec<Option<DocId>>>,
    num_docs: DocId,
}

impl IndexMerger {
    pub fn new(schema: Schema, readers: Vec<SegmentReader>) -> IndexMerger {
        let mut doc_mappings = Vec::with_capacity(readers.len());
        let mut next_doc = 0u32;
        for reader in &readers {
            let mut mapping = Vec::with_capacity(reader.max_doc() as usize);
            for doc in 0..reader.max_doc() {
                if reader.is_deleted(doc) {
                    mapping.push(None);
                } else {
                    mapping.push(Some(next_doc));
                    next_doc += 1;
                }
            }
            doc_mappings.push(mapping);
        }
        IndexMerger {
            schema,
            readers,
            doc_mappings,
            num_docs: next_doc,
        }
    }

    pub fn num_docs(&self) -> DocId {
        self.num_docs
    }

    /// Writes the merged segment into `target`.
    pub fn write(&self, target: &Segment) -> Result<MergedSegment> {
        self.write_inverted_index(target)?;
        let field_length_totals = self.write_lengths(target)?;
        self.write_store(target)?;
        self.write_columns(target)?;
        self.write_vectors(target)?;
        let byte_size = segment_byte_size(target);
        Ok(MergedSegment {
            max_doc: self.num_docs,
            field_length_totals,
            byte_size,
        })
    }

    fn format_for_key(&self, key: &[u8]) -> PostingFormat {
        let term = Term::from_bytes(key);
        self.schema
            .get_field_entry(term.field())
            .field_type()
            .posting_format()
            .unwrap_or_else(PostingFormat::exists_only)
    }

    fn write_inverted_index(&self, target: &Segment) -> Result<()> {
        let mut serializer = InvertedIndexSerializer::new(
            target.open_write(SegmentComponent::Terms)?,
            target.open_write(SegmentComponent::Postings)?,
        );
        let mut streamers: Vec<_> = self
            .readers
            .iter()
            .map(|reader| reader.term_dict().stream())
            .collect();
        let mut alive: Vec<bool> = streamers
            .iter_mut()
            .map(|streamer| streamer.advance())
            .collect();
        loop {
            // smallest current key across the streams
            let mut smallest: Option<Vec<u8>> = None;
            for (streamer, &alive) in streamers.iter().zip(alive.iter()) {
                if alive {
                    let key = streamer.key();
                    let is_smaller = smallest
                        .as_ref()
                        .map(|smallest_key| key < &smallest_key[..])
                        .unwrap_or(true);
                    if is_smaller {
                        smallest = Some(key.to_vec());
                    }
                }
            }
            let term_key = match smallest {
                Some(key) => key,
                None => break,
            };
            let format = self.format_for_key(&term_key);
            let term = Term::from_bytes(&term_key);
            let mut wrote_any = false;
            let mut started = false;
            for (reader_ord, streamer) in streamers.iter_mut().enumerate() {
                if !alive[reader_ord] || streamer.key() != &term_key[..] {
                    continue;
                }
                let info = streamer.term_info().clone();
                let mut postings = self.readers[reader_ord].postings_from_info(
                    &term,
                    &info,
                    format.has_positions(),
                    None,
                );
                while postings.is_active() {
                    let local_doc = postings.doc();
                    if let Some(new_doc) = self.doc_mappings[reader_ord][local_doc as usize] {
                        if !started {
                            serializer.start_term(format);
                            started = true;
                        }
                        serializer.write_doc(
                            new_doc,
                            postings.term_freq(),
                            postings.positions(),
                            postings.characters(),
                            postings.boosts(),
                        )?;
                        wrote_any = true;
                    }
                    postings.advance();
                }
                alive[reader_ord] = streamer.advance();
            }
            if started {
                debug_assert!(wrote_any);
                serializer.end_term(&term_key)?;
            }
        }
        serializer.close()?;
        Ok(())
    }

    fn write_lengths(&self, target: &Segment) -> Result<Vec<(Field, u64)>> {
        let mut lengths_writer = FieldLengthsWriter::for_schema(&self.schema);
        for (reader_ord, reader) in self.readers.iter().enumerate() {
            for (field, entry) in self.schema.fields() {
                if entry.field_type().analyzer().is_none() {
                    continue;
                }
                if let Some(length_reader) = reader.length_reader(field) {
                    for local_doc in 0..reader.max_doc() {
                        if let Some(new_doc) = self.doc_mappings[reader_ord][local_doc as usize]
                        {
                            lengths_writer.record(new_doc, field, length_reader.get(local_doc));
                        }
                    }
                }
            }
        }
        lengths_writer.fill_up_to_max_doc(self.num_docs);
        let totals = lengths_writer.totals();
        let mut composite = CompositeWrite::wrap(target.open_write(SegmentComponent::Lengths)?);
        lengths_writer.serialize(&mut composite)?;
        composite.close()?;
        Ok(totals)
    }

    fn write_store(&self, target: &Segment) -> Result<()> {
        let mut store_writer = StoreWriter::wrap(target.open_write(SegmentComponent::Store)?);
        for (reader_ord, reader) in self.readers.iter().enumerate() {
            for local_doc in 0..reader.max_doc() {
                if self.doc_mappings[reader_ord][local_doc as usize].is_some() {
                    let doc = reader.doc(local_doc)?;
                    store_writer.store(&doc)?;
                }
            }
        }
        store_writer.close()?;
        Ok(())
    }

    fn write_columns(&self, target: &Segment) -> Result<()> {
        let column_fields: Vec<(Field, crate::schema::ColumnType)> = self
            .schema
            .fields()
            .filter_map(|(field, entry)| {
                entry
                    .field_type()
                    .column_type()
                    .map(|column_type| (field, column_type))
            })
            .collect();
        if column_fields.is_empty() {
            return Ok(());
        }
        let mut composite = CompositeWrite::wrap(target.open_write(SegmentComponent::Columns)?);
        for &(field, column_type) in &column_fields {
            let mut writer = ColumnWriter::new(column_type);
            for (reader_ord, reader) in self.readers.iter().enumerate() {
                let column = reader.column(field).ok();
                for local_doc in 0..reader.max_doc() {
                    if let Some(new_doc) = self.doc_mappings[reader_ord][local_doc as usize] {
                        let value = column
                            .as_ref()
                            .and_then(|column| column.value(local_doc));
                        match value {
                            Some(value) => writer.add_value(new_doc, value),
                            None => {}
                        }
                    }
                }
            }
            writer.fill_up_to_max_doc(self.num_docs);
            writer.serialize(composite.for_field(field))?;
        }
        composite.close()?;
        Ok(())
    }

    fn write_vectors(&self, target: &Segment) -> Result<()> {
        let mut vectors_writer = VectorsWriter::for_schema(&self.schema);
        if !vectors_writer.has_fields() {
            return Ok(());
        }
        for (field, entry) in self.schema.fields() {
            if !entry.field_type().has_vectors() {
                continue;
            }
            for (reader_ord, reader) in self.readers.iter().enumerate() {
                let vector_reader = reader.vector_reader(field);
                for local_doc in 0..reader.max_doc() {
                    if let Some(new_doc) = self.doc_mappings[reader_ord][local_doc as usize] {
                        if let Some(ref vectors) = vector_reader {
                            let entries = vectors.vector(local_doc);
                            if !entries.is_empty() {
                                let map: BTreeMap<Vec<u8>, Vec<u32>> =
                                    entries.into_iter().collect();
                                vectors_writer.record(new_doc, field, &map);
                            }
                        }
                    }
                }
            }
        }
        vectors_writer.fill_up_to_max_doc(self.num_docs);
        let mut composite = CompositeWrite::wrap(target.open_write(SegmentComponent::Vectors)?);
        vectors_writer.serialize(&mut composite)?;
        composite.close()?;
        Ok(())
    }
}

/// Statistics of a merged segment.
pub struct MergedSegment {
    pub max_doc: DocId,
    pub field_length_totals: Vec<(Field, u64)>,
    pub byte_size: u64,
}

fn segment_byte_size(segment: &Segment) -> u64 {
    let mut total = 0u64;
    for component in SegmentComponent::iterator() {
        if let Ok(source) = segment.open_read(component) {
            total += source.len() as u64;
        }
    }
    total
}
