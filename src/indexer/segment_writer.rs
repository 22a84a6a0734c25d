use crate::column::{ColumnValue, ColumnWriter};
use crate::common::{f64_to_sortable, i64_to_sortable, u64_to_sortable, CompositeWrite};
use crate::core::{Segment, SegmentComponent};
use crate::error::LexisError;
use crate::fieldlength::FieldLengthsWriter;
use crate::postings::{InvertedIndexSerializer, PoolReader, PostingsPool};
use crate::schema::{Document, Field, FieldType, PostingFormat, Schema, Term, Value};
use crate::store::StoreWriter;
use crate::tokenizer::{TextAnalyzer, TokenizerManager};
use crate::vector::VectorsWriter;
use crate::DocId;
use crate::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// A `SegmentWriter` turns a stream of documents into the files of one
/// segment.
///
/// Postings accumulate in an in-memory pool; when the pool outgrows the
/// memory budget it spills a sorted run to a scratch file, and the
/// flush merges the runs back. Stored fields stream straight to disk.
pub struct SegmentWriter {
    segment: Segment,
    schema: Schema,
    memory_budget: usize,
    pool: PostingsPool,
    lengths_writer: FieldLengthsWriter,
    column_writers: HashMap<Field, ColumnWriter>,
    vectors_writer: VectorsWriter,
    store_writer: StoreWriter,
    analyzers: Vec<Option<TextAnalyzer>>,
    doc_stamps: Vec<u64>,
    max_doc: DocId,
    run_paths: Vec<PathBuf>,
    vector_scratch: BTreeMap<Vec<u8>, Vec<u32>>,
}

impl SegmentWriter {
    /// Creates a writer for a fresh segment.
    ///
    /// Analyzer names are resolved once against the index's registry;
    /// an indexed text field with an unknown analyzer is an error.
    pub fn for_segment(
        segment: Segment,
        memory_budget: usize,
        tokenizers: &TokenizerManager,
    ) -> Result<SegmentWriter> {
        let schema = segment.schema();
        let mut analyzers = Vec::with_capacity(schema.num_fields());
        for (_, entry) in schema.fields() {
            let analyzer = match entry.field_type().analyzer() {
                Some(name) => Some(tokenizers.get(name).ok_or_else(|| {
                    LexisError::FieldConfiguration(format!(
                        "unknown analyzer {:?} for field {:?}",
                        name,
                        entry.name()
                    ))
                })?),
                None => None,
            };
            analyzers.push(analyzer);
        }
        let mut column_writers = HashMap::new();
        for (field, entry) in schema.fields() {
            if let Some(column_type) = entry.field_type().column_type() {
                column_writers.insert(field, ColumnWriter::new(column_type));
            }
        }
        let store_writer = StoreWriter::wrap(segment.open_write(SegmentComponent::Store)?);
        Ok(SegmentWriter {
            schema: schema.clone(),
            memory_budget,
            pool: PostingsPool::new(),
            lengths_writer: FieldLengthsWriter::for_schema(&schema),
            column_writers,
            vectors_writer: VectorsWriter::for_schema(&schema),
            store_writer,
            analyzers,
            doc_stamps: Vec::with_capacity(1_000),
            max_doc: 0,
            run_paths: Vec::new(),
            vector_scratch: BTreeMap::new(),
            segment,
        })
    }

    pub fn max_doc(&self) -> DocId {
        self.max_doc
    }

    pub fn mem_usage(&self) -> usize {
        self.pool.mem_usage()
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Documents recorded for `term` in the not-yet-flushed pool.
    pub fn buffered_docs(&mut self, term: &Term) -> Vec<DocId> {
        self.pool.buffered_docs(term)
    }

    /// Indexes one document.
    pub fn add_document(&mut self, doc: Document, stamp: u64) -> Result<()> {
        let doc_id = self.max_doc;
        let mut doc = doc;
        self.doc_stamps.push(stamp);

        for (field, field_values) in doc.get_sorted_field_values() {
            let entry = self.schema.get_field_entry(field);
            let field_type = entry.field_type().clone();
            match field_type {
                FieldType::Text(ref options) => {
                    if options.is_indexed() {
                        let format = options.format();
                        let analyzer = self.analyzers[field.0 as usize]
                            .as_ref()
                            .expect("indexed text field without analyzer")
                            .clone();
                        let collect_vector = options.has_vectors();
                        self.vector_scratch.clear();
                        let mut num_tokens = 0u32;
                        let mut position_offset = 0u32;
                        for field_value in &field_values {
                            let text = match field_value.value() {
                                Value::Str(text) => text,
                                _ => continue,
                            };
                            let mut term = Term::for_field(field);
                            let mut stream = analyzer.token_stream(text);
                            let mut last_position = position_offset;
                            let mut saw_token = false;
                            while stream.advance() {
                                let token = stream.token();
                                term.set_text(&token.text);
                                let position = position_offset + token.position as u32;
                                let characters = if format.has_characters() {
                                    Some((token.offset_from as u32, token.offset_to as u32))
                                } else {
                                    None
                                };
                                self.pool.subscribe(
                                    doc_id,
                                    &term,
                                    format,
                                    position,
                                    characters,
                                    token.boost,
                                );
                                if collect_vector {
                                    self.vector_scratch
                                        .entry(token.text.as_bytes().to_vec())
                                        .or_insert_with(Vec::new)
                                        .push(position);
                                }
                                num_tokens += 1;
                                last_position = position;
                                saw_token = true;
                            }
                            if saw_token {
                                // gap between the values of a
                                // multi-valued field
                                position_offset = last_position + 2;
                            }
                        }
                        self.lengths_writer.record(doc_id, field, num_tokens);
                        if collect_vector && !self.vector_scratch.is_empty() {
                            self.vectors_writer
                                .record(doc_id, field, &self.vector_scratch);
                        }
                    }
                    if options.column().is_some() {
                        if let Some(text) = field_values
                            .iter()
                            .filter_map(|field_value| field_value.value().text())
                            .next()
                        {
                            self.add_column_value(
                                doc_id,
                                field,
                                ColumnValue::Bytes(text.as_bytes().to_vec()),
                            );
                        }
                    }
                }
                FieldType::U64(ref options) => {
                    for field_value in &field_values {
                        if let Value::U64(val) = *field_value.value() {
                            if options.is_indexed() {
                                self.subscribe_numeric(doc_id, Term::from_field_u64(field, val));
                            }
                            if options.has_column() {
                                self.add_column_value(
                                    doc_id,
                                    field,
                                    ColumnValue::U64(u64_to_sortable(val)),
                                );
                            }
                        }
                    }
                }
                FieldType::I64(ref options) => {
                    for field_value in &field_values {
                        if let Value::I64(val) = *field_value.value() {
                            if options.is_indexed() {
                                self.subscribe_numeric(doc_id, Term::from_field_i64(field, val));
                            }
                            if options.has_column() {
                                self.add_column_value(
                                    doc_id,
                                    field,
                                    ColumnValue::U64(i64_to_sortable(val)),
                                );
                            }
                        }
                    }
                }
                FieldType::F64(ref options) => {
                    for field_value in &field_values {
                        if let Value::F64(val) = *field_value.value() {
                            if options.is_indexed() {
                                self.subscribe_numeric(doc_id, Term::from_field_f64(field, val));
                            }
                            if options.has_column() {
                                self.add_column_value(
                                    doc_id,
                                    field,
                                    ColumnValue::U64(f64_to_sortable(val)),
                                );
                            }
                        }
                    }
                }
                FieldType::Date(ref options) => {
                    for field_value in &field_values {
                        if let Value::Date(ref date) = *field_value.value() {
                            if options.is_indexed() {
                                self.subscribe_numeric(doc_id, Term::from_field_date(field, date));
                            }
                            if options.has_column() {
                                self.add_column_value(
                                    doc_id,
                                    field,
                                    ColumnValue::U64(i64_to_sortable(date.timestamp())),
                                );
                            }
                        }
                    }
                }
                FieldType::Bytes(ref options) => {
                    if options.has_column() {
                        if let Some(bytes) = field_values
                            .iter()
                            .filter_map(|field_value| field_value.value().bytes_value())
                            .next()
                        {
                            self.add_column_value(
                                doc_id,
                                field,
                                ColumnValue::Bytes(bytes.to_vec()),
                            );
                        }
                    }
                }
            }
        }

        doc.filter_fields(|field| self.schema.get_field_entry(field).is_stored());
        self.store_writer.store(&doc)?;
        self.max_doc += 1;

        if self.pool.mem_usage() > self.memory_budget {
            self.spill_run()?;
        }
        Ok(())
    }

    fn subscribe_numeric(&mut self, doc: DocId, term: Term) {
        self.pool
            .subscribe(doc, &term, PostingFormat::exists_only(), 0, None, 1.0);
    }

    fn add_column_value(&mut self, doc: DocId, field: Field, value: ColumnValue) {
        if let Some(writer) = self.column_writers.get_mut(&field) {
            writer.add_value(doc, value);
        }
    }

    /// Spills the pool as a sorted run into a scratch file.
    fn spill_run(&mut self) -> Result<()> {
        let run_path = PathBuf::from(format!(
            "{}.run{}",
            self.segment.id().uuid_string(),
            self.run_paths.len()
        ));
        info!(
            "postings pool over budget ({} bytes), spilling run {:?}",
            self.pool.mem_usage(),
            run_path
        );
        let write = self.segment.storage().open_write(&run_path)?;
        self.pool.spill(write)?;
        self.run_paths.push(run_path);
        Ok(())
    }

    /// Lays the segment on disk, consuming the writer.
    pub fn finalize(mut self) -> Result<FinalizedSegment> {
        self.lengths_writer.fill_up_to_max_doc(self.max_doc);
        self.vectors_writer.fill_up_to_max_doc(self.max_doc);
        for writer in self.column_writers.values_mut() {
            writer.fill_up_to_max_doc(self.max_doc);
        }

        // inverted index: merge the spilled runs and the live pool
        let mut serializer = InvertedIndexSerializer::new(
            self.segment.open_write(SegmentComponent::Terms)?,
            self.segment.open_write(SegmentComponent::Postings)?,
        );
        let mut runs = Vec::with_capacity(self.run_paths.len());
        for run_path in &self.run_paths {
            runs.push(PoolReader::open(
                self.segment.storage().open_read(run_path)?,
            )?);
        }
        self.pool.serialize(runs, &mut serializer)?;
        serializer.close()?;

        let mut lengths_composite =
            CompositeWrite::wrap(self.segment.open_write(SegmentComponent::Lengths)?);
        self.lengths_writer.serialize(&mut lengths_composite)?;
        lengths_composite.close()?;

        if !self.column_writers.is_empty() {
            let mut columns_composite =
                CompositeWrite::wrap(self.segment.open_write(SegmentComponent::Columns)?);
            let mut fields: Vec<Field> = self.column_writers.keys().cloned().collect();
            fields.sort();
            for field in fields {
                let write = columns_composite.for_field(field);
                self.column_writers[&field].serialize(write)?;
            }
            columns_composite.close()?;
        }

        if self.vectors_writer.has_fields() {
            let mut vectors_composite =
                CompositeWrite::wrap(self.segment.open_write(SegmentComponent::Vectors)?);
            self.vectors_writer.serialize(&mut vectors_composite)?;
            vectors_composite.close()?;
        }

        self.store_writer.close()?;

        for run_path in &self.run_paths {
            if let Err(err) = self.segment.storage().delete(run_path) {
                warn!("failed to delete spill run {:?}: {:?}", run_path, err);
            }
        }

        let field_length_totals = self.lengths_writer.totals();
        let byte_size = segment_byte_size(&self.segment);
        Ok(FinalizedSegment {
            max_doc: self.max_doc,
            doc_stamps: self.doc_stamps,
            field_length_totals,
            byte_size,
        })
    }

    /// Removes whatever files the writer created. Used by `cancel`.
    pub fn abort(self) -> Result<()> {
        // the store writer panics if dropped unflushed
        self.store_writer.close()?;
        let storage = self.segment.storage();
        for run_path in &self.run_paths {
            let _ = storage.delete(run_path);
        }
        for component in SegmentComponent::iterator() {
            let path = self.segment.meta().component_path(component);
            if storage.exists(&path) {
                let _ = storage.delete(&path);
            }
        }
        Ok(())
    }
}

/// What a finalized segment reports back to the index writer.
pub struct FinalizedSegment {
    pub max_doc: DocId,
    pub doc_stamps: Vec<u64>,
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
