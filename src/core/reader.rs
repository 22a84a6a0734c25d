use crate::core::{Index, Segment, SegmentReader, TableOfContents};
use crate::schema::{Document, Field, Schema, Term};
use crate::scoring::{CollectionStatistics, Weighting};
use crate::DocId;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-side view over every segment of one generation.
///
/// The reader observes the snapshot enumerated by the TOC it opened:
/// later commits are invisible until [`IndexReader::refresh`]. Each
/// segment is assigned a document-number base in TOC order, so
/// index-wide docnums are `base + local`.
#[derive(Clone)]
pub struct IndexReader {
    index: Index,
    generation: u64,
    schema: Schema,
    segment_readers: Arc<Vec<SegmentReader>>,
    doc_bases: Arc<Vec<DocId>>,
    statistics: Arc<CollectionStatistics>,
}

impl IndexReader {
    pub(crate) fn open(index: &Index, toc: TableOfContents) -> Result<IndexReader> {
        let mut segment_readers = Vec::with_capacity(toc.segments.len());
        for meta in &toc.segments {
            let segment = Segment::new(
                index.storage().box_clone(),
                toc.schema.clone(),
                meta.clone(),
            );
            segment_readers.push(SegmentReader::open(&segment)?);
        }
        Ok(IndexReader::from_segment_readers(
            index.clone(),
            toc.generation,
            toc.schema,
            segment_readers,
        ))
    }

    fn from_segment_readers(
        index: Index,
        generation: u64,
        schema: Schema,
        segment_readers: Vec<SegmentReader>,
    ) -> IndexReader {
        let mut doc_bases = Vec::with_capacity(segment_readers.len());
        let mut base = 0u32;
        for reader in &segment_readers {
            doc_bases.push(base);
            base += reader.max_doc();
        }
        let statistics = compute_statistics(&segment_readers);
        IndexReader {
            index,
            generation,
            schema,
            segment_readers: Arc::new(segment_readers),
            doc_bases: Arc::new(doc_bases),
            statistics: Arc::new(statistics),
        }
    }

    /// Re-opens the current TOC, reusing the segment readers that did
    /// not change (same segment, same deletion generation). Returns
    /// true if anything changed.
    pub fn refresh(&mut self) -> Result<bool> {
        let toc = self.index.load_toc()?;
        if toc.generation == self.generation {
            return Ok(false);
        }
        let mut reusable: HashMap<_, SegmentReader> = self
            .segment_readers
            .iter()
            .map(|reader| {
                (
                    (reader.segment_id(), reader.meta().del_gen()),
                    reader.clone(),
                )
            })
            .collect();
        let mut segment_readers = Vec::with_capacity(toc.segments.len());
        for meta in &toc.segments {
            let key = (meta.id(), meta.del_gen());
            match reusable.remove(&key) {
                Some(reader) => segment_readers.push(reader),
                None => {
                    let segment = Segment::new(
                        self.index.storage().box_clone(),
                        toc.schema.clone(),
                        meta.clone(),
                    );
                    segment_readers.push(SegmentReader::open(&segment)?);
                }
            }
        }
        *self = IndexReader::from_segment_readers(
            self.index.clone(),
            toc.generation,
            toc.schema,
            segment_readers,
        );
        Ok(true)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fails with `OutOfDate` if the index has moved past the
    /// generation this reader observes. Operations that must see the
    /// latest state call this before trusting the snapshot.
    pub fn check_current(&self) -> crate::Result<()> {
        let current = self.index.current_generation()?;
        if current != self.generation {
            return Err(crate::error::LexisError::OutOfDate {
                held: self.generation,
                current,
            });
        }
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn segment_readers(&self) -> &[SegmentReader] {
        &self.segment_readers
    }

    pub fn doc_bases(&self) -> &[DocId] {
        &self.doc_bases
    }

    /// Index-wide docnum space size (deleted documents included).
    pub fn max_doc(&self) -> DocId {
        self.segment_readers
            .iter()
            .map(SegmentReader::max_doc)
            .sum()
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> u64 {
        self.segment_readers
            .iter()
            .map(|reader| u64::from(reader.num_docs()))
            .sum()
    }

    pub fn has_deletions(&self) -> bool {
        self.segment_readers.iter().any(SegmentReader::has_deletions)
    }

    pub fn statistics(&self) -> &CollectionStatistics {
        &self.statistics
    }

    /// Locates the segment containing the index-wide `doc`.
    pub fn segment_for_doc(&self, doc: DocId) -> (usize, DocId) {
        let mut segment_ord = match self.doc_bases.binary_search(&doc) {
            Ok(exact) => exact,
            Err(insertion) => insertion - 1,
        };
        // empty segments cannot exist, but bases can repeat if one did
        while segment_ord + 1 < self.doc_bases.len() && self.doc_bases[segment_ord + 1] <= doc {
            segment_ord += 1;
        }
        (segment_ord, doc - self.doc_bases[segment_ord])
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        let (segment_ord, local) = self.segment_for_doc(doc);
        self.segment_readers[segment_ord].is_deleted(local)
    }

    /// The stored fields of the index-wide `doc`.
    pub fn doc(&self, doc: DocId) -> Result<Document> {
        let (segment_ord, local) = self.segment_for_doc(doc);
        self.segment_readers[segment_ord].doc(local)
    }

    pub fn doc_field_length(&self, doc: DocId, field: Field) -> u32 {
        let (segment_ord, local) = self.segment_for_doc(doc);
        self.segment_readers[segment_ord].doc_field_length(local, field)
    }

    /// Document frequency of `term` across all segments (live docs are
    /// not discounted, matching the statistics scorers expect).
    pub fn doc_freq(&self, term: &Term) -> u64 {
        self.segment_readers
            .iter()
            .map(|reader| u64::from(reader.doc_freq(term)))
            .sum()
    }

    /// Total occurrences of `term` across all segments.
    pub fn total_term_freq(&self, term: &Term) -> u64 {
        self.segment_readers
            .iter()
            .filter_map(|reader| reader.term_info(term))
            .map(|info| info.total_freq)
            .sum()
    }

    /// Opens a searcher over this snapshot with the given model, or
    /// BM25F by default.
    pub fn searcher(&self, weighting: Option<Arc<dyn Weighting>>) -> crate::core::Searcher {
        crate::core::Searcher::new(
            self.clone(),
            weighting.unwrap_or_else(|| Arc::new(crate::scoring::Bm25Weighting::default())),
        )
    }
}

fn compute_statistics(segment_readers: &[SegmentReader]) -> CollectionStatistics {
    let mut num_docs = 0u64;
    let mut totals: HashMap<Field, u64> = HashMap::new();
    for reader in segment_readers {
        num_docs += u64::from(reader.num_docs());
        for &(field, total) in reader.meta().field_length_totals() {
            *totals.entry(field).or_insert(0) += total;
        }
    }
    CollectionStatistics::new(num_docs, totals)
}
