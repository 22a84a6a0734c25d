use crate::column::ColumnReader;
use crate::common::CompositeFile;
use crate::core::{LiveDocs, Segment, SegmentComponent, SegmentId, SegmentMeta};
use crate::error::LexisError;
use crate::fieldlength::{FieldLengthsReader, LengthReader};
use crate::matcher::Matcher;
use crate::postings::SegmentPostings;
use crate::schema::{Document, Field, Schema, Term};
use crate::scoring::Scorer;
use crate::storage::ReadOnlySource;
use crate::store::StoreReader;
use crate::termdict::{TermDictionary, TermInfo};
use crate::vector::VectorReader;
use crate::DocId;
use crate::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Entry point to the data structures of one segment.
///
/// - term dictionary
/// - postings
/// - stored fields
/// - field lengths
/// - columns and vectors
/// - live-docs bitmap
///
/// All state is shared and immutable: the reader is cheap to clone and
/// safe to use from several threads at once.
#[derive(Clone)]
pub struct SegmentReader {
    segment_id: SegmentId,
    meta: SegmentMeta,
    schema: Schema,
    term_dict: Arc<TermDictionary>,
    postings_source: ReadOnlySource,
    store_reader: StoreReader,
    lengths: FieldLengthsReader,
    columns_composite: CompositeFile,
    column_cache: Arc<RwLock<HashMap<Field, Arc<ColumnReader>>>>,
    vectors_composite: CompositeFile,
    live_docs: Option<LiveDocs>,
}

impl SegmentReader {
    /// Opens every component of the segment.
    pub fn open(segment: &Segment) -> Result<SegmentReader> {
        let term_dict_source = segment.open_read(SegmentComponent::Terms)?;
        let term_dict = TermDictionary::from_source(term_dict_source)?;

        let postings_source = segment.open_read(SegmentComponent::Postings)?;

        let store_source = segment.open_read(SegmentComponent::Store)?;
        let store_reader = StoreReader::open(store_source)?;

        let lengths_source = segment.open_read(SegmentComponent::Lengths)?;
        let lengths = FieldLengthsReader::open(CompositeFile::open(lengths_source)?);

        let columns_composite = if segment.component_exists(SegmentComponent::Columns) {
            CompositeFile::open(segment.open_read(SegmentComponent::Columns)?)?
        } else {
            CompositeFile::empty()
        };

        let vectors_composite = if segment.component_exists(SegmentComponent::Vectors) {
            CompositeFile::open(segment.open_read(SegmentComponent::Vectors)?)?
        } else {
            CompositeFile::empty()
        };

        let live_docs = if segment.meta().has_deletes() {
            let delete_source = segment.open_read(SegmentComponent::Delete)?;
            Some(LiveDocs::open(&delete_source)?)
        } else {
            None
        };

        Ok(SegmentReader {
            segment_id: segment.id(),
            meta: segment.meta().clone(),
            schema: segment.schema(),
            term_dict: Arc::new(term_dict),
            postings_source,
            store_reader,
            lengths,
            columns_composite,
            column_cache: Arc::new(RwLock::new(HashMap::new())),
            vectors_composite,
            live_docs,
        })
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Highest local docnum + 1, including deleted documents.
    pub fn max_doc(&self) -> DocId {
        self.meta.max_doc()
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> DocId {
        self.max_doc() - self.num_deleted_docs()
    }

    pub fn num_deleted_docs(&self) -> DocId {
        self.live_docs
            .as_ref()
            .map(LiveDocs::num_deleted)
            .unwrap_or(0)
    }

    pub fn has_deletions(&self) -> bool {
        self.live_docs.is_some()
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        self.live_docs
            .as_ref()
            .map(|live| live.is_deleted(doc))
            .unwrap_or(false)
    }

    pub fn live_docs(&self) -> Option<&LiveDocs> {
        self.live_docs.as_ref()
    }

    pub fn term_dict(&self) -> &TermDictionary {
        &self.term_dict
    }

    /// `(doc_freq, total_freq)` of the term in this segment, if present.
    pub fn term_info(&self, term: &Term) -> Option<TermInfo> {
        self.term_dict.get(term.as_slice())
    }

    pub fn doc_freq(&self, term: &Term) -> u32 {
        self.term_info(term)
            .map(|info| info.doc_freq)
            .unwrap_or(0)
    }

    /// Opens the postings of `term` as a matcher over this segment's
    /// local docnums.
    pub fn postings(
        &self,
        term: &Term,
        need_positions: bool,
        scorer: Option<Box<dyn Scorer>>,
    ) -> SegmentPostings {
        match self.term_info(term) {
            Some(info) => {
                let data = self.postings_source.slice(
                    info.postings_offset as usize,
                    (info.postings_offset + info.postings_num_bytes) as usize,
                );
                SegmentPostings::open(
                    data,
                    need_positions,
                    self.live_docs.clone(),
                    scorer,
                    Some(term.clone()),
                )
            }
            None => SegmentPostings::empty(),
        }
    }

    /// Same, from a raw dictionary entry (used by expanding queries).
    pub fn postings_from_info(
        &self,
        term: &Term,
        info: &TermInfo,
        need_positions: bool,
        scorer: Option<Box<dyn Scorer>>,
    ) -> SegmentPostings {
        let data = self.postings_source.slice(
            info.postings_offset as usize,
            (info.postings_offset + info.postings_num_bytes) as usize,
        );
        SegmentPostings::open(
            data,
            need_positions,
            self.live_docs.clone(),
            scorer,
            Some(term.clone()),
        )
    }

    /// The stored fields of `doc`.
    ///
    /// This is slow relative to matching; avoid calling it from inside
    /// a collector.
    pub fn doc(&self, doc: DocId) -> Result<Document> {
        Ok(self.store_reader.get(doc)?)
    }

    pub fn doc_field_length(&self, doc: DocId, field: Field) -> u32 {
        self.lengths.doc_field_length(doc, field)
    }

    pub fn length_reader(&self, field: Field) -> Option<LengthReader> {
        self.lengths.length_reader(field)
    }

    /// Random access to the sort/group column of `field`.
    pub fn column(&self, field: Field) -> Result<Arc<ColumnReader>> {
        {
            let cache = self.column_cache.read()?;
            if let Some(reader) = cache.get(&field) {
                return Ok(reader.clone());
            }
        }
        let source = self.columns_composite.open_read(field).ok_or_else(|| {
            LexisError::FieldConfiguration(format!(
                "field {:?} has no column in this segment",
                self.schema.get_field_name(field)
            ))
        })?;
        let reader = Arc::new(ColumnReader::open(source)?);
        self.column_cache.write()?.insert(field, reader.clone());
        Ok(reader)
    }

    /// The forward vectors of `field`, when the schema stores them.
    pub fn vector_reader(&self, field: Field) -> Option<VectorReader> {
        self.vectors_composite
            .open_read(field)
            .and_then(|source| VectorReader::open(source).ok())
    }

    /// Ascending iterator over the live docnums of the segment.
    pub fn doc_ids_alive<'a>(&'a self) -> impl Iterator<Item = DocId> + 'a {
        (0..self.max_doc()).filter(move |&doc| !self.is_deleted(doc))
    }

    /// Matcher over every live document of the segment.
    pub fn all_docs_matcher(&self) -> Box<dyn Matcher> {
        Box::new(crate::matcher::EveryMatcher::new(
            self.max_doc(),
            self.live_docs.clone(),
        ))
    }
}

impl fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SegmentReader({:?})", self.segment_id)
    }
}
