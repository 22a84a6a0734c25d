use crate::common::{BinarySerializable, BitSet};
use crate::core::{
    Index, IndexReader, Segment, SegmentId, SegmentMeta, TableOfContents,
};
use crate::error::LexisError;
use crate::indexer::merge_policy::{LogMergePolicy, MergeCandidate, MergePolicy};
use crate::indexer::merger::IndexMerger;
use crate::indexer::operation::{AddOperation, DeleteCriterion, DeleteOperation};
use crate::indexer::segment_writer::SegmentWriter;
use crate::indexer::stamper::Stamper;
use crate::matcher::Matcher;
use crate::query::Query;
use crate::schema::{Document, Schema, Term};
use crate::scoring::{FrequencyWeighting, Weighting};
use crate::storage::Lock;
use crate::storage::LockHandle;
use crate::Result;
use crossbeam::channel;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

/// The writer refuses memory budgets below this.
pub const HEAP_SIZE_MIN: usize = 3_000_000;

/// Add operations waiting in the parallel pipeline block the caller
/// beyond this many buffered batches.
const PIPELINE_MAX_SIZE_IN_BATCHES: usize = 10_000;

/// How a commit treats the existing segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeMode {
    /// Let the merge policy decide.
    Policy,
    /// Merge nothing.
    NoMerge,
    /// Force a full merge into one segment.
    Optimize,
    /// Drop every pre-existing segment: the commit's own content
    /// replaces the index.
    Clear,
}

/// Options of one commit.
#[derive(Clone, Copy, Debug)]
pub struct CommitOptions {
    pub merge: MergeMode,
}

impl Default for CommitOptions {
    fn default() -> CommitOptions {
        CommitOptions {
            merge: MergeMode::Policy,
        }
    }
}

struct WorkerSegment {
    segment: Segment,
    max_doc: u32,
    doc_stamps: Vec<u64>,
    field_length_totals: Vec<(crate::schema::Field, u64)>,
    byte_size: u64,
}

enum Strategy {
    /// One segment per commit, built in the caller's thread; memory is
    /// bounded by spilling sorted runs.
    Sequential { writer: Option<SegmentWriter> },
    /// Worker threads each build their own segment, fed through a
    /// bounded channel; one commit publishes one segment per worker.
    Parallel {
        sender: Option<channel::Sender<Vec<AddOperation>>>,
        handles: Vec<JoinHandle<Result<Vec<WorkerSegment>>>>,
    },
}

fn new_segment(index: &Index, schema: &Schema) -> Segment {
    let meta = index
        .inventory()
        .new_segment_meta(SegmentId::generate_random(), 0);
    Segment::new(index.storage().box_clone(), schema.clone(), meta)
}

fn spawn_workers(
    index: &Index,
    schema: &Schema,
    memory_budget: usize,
    num_workers: usize,
) -> Result<Strategy> {
    let (sender, receiver) = channel::bounded::<Vec<AddOperation>>(PIPELINE_MAX_SIZE_IN_BATCHES);
    let per_worker_budget = (memory_budget / num_workers).max(HEAP_SIZE_MIN / 2);
    let mut handles = Vec::with_capacity(num_workers);
    for worker_id in 0..num_workers {
        let receiver = receiver.clone();
        let index = index.clone();
        let schema = schema.clone();
        let handle = thread::Builder::new()
            .name(format!("lexis-index-worker-{}", worker_id))
            .spawn(move || worker_loop(index, schema, per_worker_budget, receiver))?;
        handles.push(handle);
    }
    Ok(Strategy::Parallel {
        sender: Some(sender),
        handles,
    })
}

fn worker_loop(
    index: Index,
    schema: Schema,
    memory_budget: usize,
    receiver: channel::Receiver<Vec<AddOperation>>,
) -> Result<Vec<WorkerSegment>> {
    let mut segments = Vec::new();
    let mut current: Option<SegmentWriter> = None;
    for batch in receiver {
        // a batch is indexed whole into one segment, which is what
        // keeps nested groups contiguous
        if current.is_none() {
            let segment = new_segment(&index, &schema);
            current = Some(SegmentWriter::for_segment(
                segment,
                memory_budget,
                index.tokenizers(),
            )?);
        }
        let writer = current.as_mut().expect("segment writer was just created");
        for operation in batch {
            writer.add_document(operation.document, operation.stamp)?;
        }
    }
    if let Some(writer) = current {
        if writer.max_doc() > 0 {
            let segment = writer.segment().clone();
            let max_doc = writer.max_doc();
            let finalized = writer.finalize()?;
            segments.push(WorkerSegment {
                segment,
                max_doc,
                doc_stamps: finalized.doc_stamps,
                field_length_totals: finalized.field_length_totals,
                byte_size: finalized.byte_size,
            });
        } else {
            writer.abort()?;
        }
    }
    Ok(segments)
}

/// Batch handle of [`IndexWriter::group`]: the documents added through
/// it receive contiguous docnums in one segment, parents first.
pub struct GroupAdder {
    documents: Vec<Document>,
}

impl GroupAdder {
    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
    }
}

/// The single writer of an index.
///
/// Opening the writer acquires the `<indexname>_WRITELOCK` advisory
/// lock; a second writer fails with [`LexisError::Locked`]. All
/// buffered changes become visible atomically at `commit()`; `cancel()`
/// discards them and leaves the previous generation authoritative.
pub struct IndexWriter {
    index: Index,
    schema: Schema,
    _lock: LockHandle,
    memory_budget: usize,
    num_workers: usize,
    stamper: Stamper,
    merge_policy: Box<dyn MergePolicy>,
    committed_toc: TableOfContents,
    pending_deletes: Vec<DeleteOperation>,
    strategy: Strategy,
}

impl IndexWriter {
    pub(crate) fn open(
        index: Index,
        memory_budget: usize,
        num_workers: usize,
    ) -> Result<IndexWriter> {
        if memory_budget < HEAP_SIZE_MIN {
            return Err(LexisError::InvalidArgument(format!(
                "the memory budget needs to be at least {} bytes",
                HEAP_SIZE_MIN
            )));
        }
        let num_workers = num_workers.max(1);
        let lock_path = PathBuf::from(format!("{}_WRITELOCK", index.name()));
        let lock = index.storage().acquire_lock(&Lock {
            filepath: lock_path,
            is_blocking: false,
        })?;
        let committed_toc = index.load_toc()?;
        let schema = index.schema();
        let strategy = if num_workers == 1 {
            Strategy::Sequential { writer: None }
        } else {
            spawn_workers(&index, &schema, memory_budget, num_workers)?
        };
        Ok(IndexWriter {
            schema,
            _lock: lock,
            memory_budget,
            num_workers,
            stamper: Stamper::new(1),
            merge_policy: Box::new(LogMergePolicy::default()),
            committed_toc,
            pending_deletes: Vec::new(),
            strategy,
            index,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_merge_policy(&self) -> &dyn MergePolicy {
        &*self.merge_policy
    }

    pub fn set_merge_policy(&mut self, merge_policy: Box<dyn MergePolicy>) {
        self.merge_policy = merge_policy;
    }

    /// The generation of the last successful commit.
    pub fn committed_generation(&self) -> u64 {
        self.committed_toc.generation
    }

    fn sequential_writer(&mut self) -> Result<&mut SegmentWriter> {
        match self.strategy {
            Strategy::Sequential { ref mut writer } => {
                if writer.is_none() {
                    let segment = new_segment(&self.index, &self.schema);
                    *writer = Some(SegmentWriter::for_segment(
                        segment,
                        self.memory_budget,
                        self.index.tokenizers(),
                    )?);
                }
                Ok(writer.as_mut().expect("segment writer was just created"))
            }
            Strategy::Parallel { .. } => unreachable!("sequential writer in parallel mode"),
        }
    }

    fn submit(&mut self, operations: Vec<AddOperation>) -> Result<()> {
        let is_sequential = matches!(self.strategy, Strategy::Sequential { .. });
        if is_sequential {
            let writer = self.sequential_writer()?;
            for operation in operations {
                writer.add_document(operation.document, operation.stamp)?;
            }
            return Ok(());
        }
        match self.strategy {
            Strategy::Parallel { ref sender, .. } => sender
                .as_ref()
                .expect("the document pipeline is closed")
                .send(operations)
                .map_err(|_| {
                    LexisError::ErrorInThread(
                        "sending to the indexing pipeline failed; a worker panicked".to_string(),
                    )
                }),
            Strategy::Sequential { .. } => unreachable!(),
        }
    }

    /// Buffers one document; returns its stamp.
    pub fn add_document(&mut self, document: Document) -> Result<u64> {
        let stamp = self.stamper.stamp();
        self.submit(vec![AddOperation { stamp, document }])?;
        Ok(stamp)
    }

    /// Adds a nested group of documents: they receive contiguous
    /// docnums within one segment, in the order they were added (the
    /// parent document must come first).
    pub fn group<F>(&mut self, add_docs: F) -> Result<u64>
    where
        F: FnOnce(&mut GroupAdder) -> Result<()>,
    {
        let mut adder = GroupAdder {
            documents: Vec::new(),
        };
        add_docs(&mut adder)?;
        if adder.documents.is_empty() {
            return Ok(self.stamper.stamp());
        }
        let stamps = self.stamper.stamps(adder.documents.len() as u64);
        let last_stamp = stamps.end - 1;
        let operations = adder
            .documents
            .into_iter()
            .zip(stamps)
            .map(|(document, stamp)| AddOperation { stamp, document })
            .collect();
        self.submit(operations)?;
        Ok(last_stamp)
    }

    /// Deletes the documents of every unique-field value present in
    /// `document`, then adds it. The deletion only affects documents
    /// stamped before this call, so the newest revision always wins.
    pub fn update_document(&mut self, document: Document) -> Result<u64> {
        for field in self.schema.unique_fields() {
            if let Some(value) = document.get_first(field) {
                let entry = self.schema.get_field_entry(field);
                if let Some(term) = entry.field_type().value_to_term(field, value) {
                    let stamp = self.stamper.stamp();
                    self.pending_deletes.push(DeleteOperation {
                        stamp,
                        criterion: DeleteCriterion::Term(term),
                    });
                }
            }
        }
        self.add_document(document)
    }

    /// Buffers the deletion of every document containing `term`.
    pub fn delete_by_term(&mut self, term: Term) -> u64 {
        let stamp = self.stamper.stamp();
        self.pending_deletes.push(DeleteOperation {
            stamp,
            criterion: DeleteCriterion::Term(term),
        });
        stamp
    }

    /// Buffers the deletion of every document matching `query`.
    ///
    /// Deleting by a `NestedParent` query removes each matched parent
    /// together with its whole contiguous child range.
    pub fn delete_by_query(&mut self, query: Query) -> u64 {
        let stamp = self.stamper.stamp();
        self.pending_deletes.push(DeleteOperation {
            stamp,
            criterion: DeleteCriterion::Query(query),
        });
        stamp
    }

    /// Commits with the default (policy-driven) merge mode.
    pub fn commit(&mut self) -> Result<u64> {
        self.commit_with(CommitOptions::default())
    }

    /// Flushes the buffered documents to new segments, resolves the
    /// buffered deletions, runs merges, and atomically publishes the
    /// next generation. With nothing to do, the generation does not
    /// advance.
    pub fn commit_with(&mut self, options: CommitOptions) -> Result<u64> {
        let new_segments = self.take_new_segments()?;

        let clear = options.merge == MergeMode::Clear;
        let has_changes = !new_segments.is_empty()
            || !self.pending_deletes.is_empty()
            || self.schema != self.committed_toc.schema
            || (clear && !self.committed_toc.segments.is_empty())
            || (options.merge == MergeMode::Optimize && self.committed_toc.segments.len() > 1);
        if !has_changes {
            info!("commit: nothing to do, staying at generation {}", self.committed_toc.generation);
            return Ok(self.committed_toc.generation);
        }

        let next_gen = self.committed_toc.generation + 1;
        info!("committing generation {}", next_gen);

        let mut metas: Vec<SegmentMeta> = if clear {
            Vec::new()
        } else {
            self.committed_toc.segments.clone()
        };
        let mut stamps_by_segment: HashMap<SegmentId, Vec<u64>> = HashMap::new();
        for worker_segment in &new_segments {
            stamps_by_segment.insert(
                worker_segment.segment.id(),
                worker_segment.doc_stamps.clone(),
            );
        }
        for worker_segment in new_segments {
            metas.push(SegmentMeta::from_parts(
                self.index.inventory(),
                worker_segment.segment.id(),
                worker_segment.max_doc,
                None,
                worker_segment.field_length_totals,
                worker_segment.byte_size,
            ));
        }

        if !self.pending_deletes.is_empty() {
            metas = self.apply_deletes(metas, &stamps_by_segment, next_gen)?;
        }

        let candidates = match options.merge {
            MergeMode::Optimize if metas.len() > 1 => {
                vec![MergeCandidate(metas.iter().map(SegmentMeta::id).collect())]
            }
            MergeMode::Policy => self.merge_policy.compute_merge_candidates(&metas),
            _ => Vec::new(),
        };
        for candidate in candidates {
            metas = self.merge_segments(metas, &candidate)?;
        }

        let toc = TableOfContents {
            generation: next_gen,
            schema: self.schema.clone(),
            segments: metas,
        };
        self.index.write_toc(&toc)?;
        self.committed_toc = toc;
        self.pending_deletes.clear();
        if let Err(err) = self.garbage_collect_files() {
            warn!("garbage collection after commit failed: {:?}", err);
        }
        Ok(next_gen)
    }

    /// Discards every buffered change; the previous commit stays
    /// authoritative.
    pub fn cancel(&mut self) -> Result<()> {
        self.cancel_inner(true)
    }

    fn cancel_inner(&mut self, respawn: bool) -> Result<()> {
        self.pending_deletes.clear();
        if let Strategy::Sequential { ref mut writer } = self.strategy {
            if let Some(writer) = writer.take() {
                writer.abort()?;
            }
            return Ok(());
        }
        let segments = self.join_workers(respawn)?;
        for worker_segment in segments {
            for component in crate::core::SegmentComponent::iterator() {
                let path = worker_segment.segment.meta().component_path(component);
                if self.index.storage().exists(&path) {
                    let _ = self.index.storage().delete(&path);
                }
            }
        }
        Ok(())
    }

    fn take_new_segments(&mut self) -> Result<Vec<WorkerSegment>> {
        match self.strategy {
            Strategy::Sequential { ref mut writer } => {
                let mut segments = Vec::new();
                if let Some(writer) = writer.take() {
                    if writer.max_doc() > 0 {
                        let segment = writer.segment().clone();
                        let max_doc = writer.max_doc();
                        let finalized = writer.finalize().map_err(|err| {
                            LexisError::Indexing(format!("segment flush failed: {}", err))
                        })?;
                        segments.push(WorkerSegment {
                            segment,
                            max_doc,
                            doc_stamps: finalized.doc_stamps,
                            field_length_totals: finalized.field_length_totals,
                            byte_size: finalized.byte_size,
                        });
                    } else {
                        writer.abort()?;
                    }
                }
                Ok(segments)
            }
            Strategy::Parallel { .. } => self.join_workers(true),
        }
    }

    /// Closes the parallel pipeline, joins the workers, and optionally
    /// re-arms a fresh pipeline for the next batch of documents.
    fn join_workers(&mut self, respawn: bool) -> Result<Vec<WorkerSegment>> {
        let handles = match self.strategy {
            Strategy::Parallel {
                ref mut sender,
                ref mut handles,
            } => {
                // dropping the sender terminates the workers' loops
                sender.take();
                std::mem::replace(handles, Vec::new())
            }
            Strategy::Sequential { .. } => return Ok(Vec::new()),
        };
        let mut segments = Vec::new();
        for handle in handles {
            let worker_segments = handle
                .join()
                .map_err(|_| LexisError::ErrorInThread("an indexing worker panicked".to_string()))??;
            segments.extend(worker_segments);
        }
        if respawn {
            self.strategy = spawn_workers(
                &self.index,
                &self.schema,
                self.memory_budget,
                self.num_workers,
            )?;
        }
        // TOC order must follow stamp order so that index-wide docnums
        // respect insertion order as much as possible
        segments.sort_by_key(|segment| segment.doc_stamps.first().cloned().unwrap_or(u64::max_value()));
        Ok(segments)
    }

    /// Resolves the pending deletions against every segment, writing
    /// new live-docs files copy-on-write. Fully emptied segments are
    /// dropped.
    fn apply_deletes(
        &mut self,
        metas: Vec<SegmentMeta>,
        stamps_by_segment: &HashMap<SegmentId, Vec<u64>>,
        next_gen: u64,
    ) -> Result<Vec<SegmentMeta>> {
        let toc = TableOfContents {
            generation: next_gen,
            schema: self.schema.clone(),
            segments: metas.clone(),
        };
        let reader = IndexReader::open(&self.index, toc)?;
        let unscored: Arc<dyn Weighting> = Arc::new(FrequencyWeighting);
        let mut surviving: Vec<SegmentMeta> = Vec::with_capacity(metas.len());
        for (segment_ord, meta) in metas.into_iter().enumerate() {
            let segment_reader = &reader.segment_readers()[segment_ord];
            let max_doc = segment_reader.max_doc();
            let mut live = match segment_reader.live_docs() {
                Some(live_docs) => live_docs.bitset().clone(),
                None => BitSet::full(max_doc),
            };
            let stamps = stamps_by_segment.get(&meta.id());
            let mut changed = false;
            for op in &self.pending_deletes {
                let mut matched: Vec<u32> = Vec::new();
                match &op.criterion {
                    DeleteCriterion::Term(term) => {
                        let mut postings = segment_reader.postings(term, false, None);
                        while postings.is_active() {
                            matched.push(postings.doc());
                            postings.advance();
                        }
                    }
                    DeleteCriterion::Query(query) => {
                        let normalized = query.clone().normalize();
                        let mut matcher =
                            normalized.segment_matcher(&reader, segment_ord, &unscored)?;
                        while matcher.is_active() {
                            matched.push(matcher.doc());
                            matcher.advance();
                        }
                        // nested-parent deletions are atomic for the
                        // whole contiguous group
                        if let Query::NestedParent { parents, .. } = &normalized {
                            let parent_set = crate::query::segment_query_bitset(
                                parents, &reader, segment_ord, &unscored,
                            )?;
                            let mut expanded = Vec::new();
                            for &parent in &matched {
                                expanded.push(parent);
                                let group_end = parent_set
                                    .next_set(parent + 1)
                                    .unwrap_or(max_doc)
                                    .min(max_doc);
                                for child in parent + 1..group_end {
                                    expanded.push(child);
                                }
                            }
                            matched = expanded;
                        }
                    }
                }
                for doc in matched {
                    let affected = match stamps {
                        Some(stamps) => stamps[doc as usize] < op.stamp,
                        None => true,
                    };
                    if affected && live.contains(doc) {
                        live.remove(doc);
                        changed = true;
                    }
                }
            }
            if !changed {
                surviving.push(meta);
                continue;
            }
            if live.is_empty() {
                info!("segment {:?} fully deleted, dropping it", meta.id());
                continue;
            }
            let num_deleted = max_doc - live.len() as u32;
            let updated = meta.with_delete_meta(self.index.inventory(), num_deleted, next_gen);
            let del_path = updated.component_path(crate::core::SegmentComponent::Delete);
            let mut write = self.index.storage().open_write(&del_path)?;
            live.serialize(&mut write)?;
            write.flush()?;
            surviving.push(updated);
        }
        Ok(surviving)
    }

    /// Replaces the candidate segments by their merge.
    fn merge_segments(
        &mut self,
        mut metas: Vec<SegmentMeta>,
        candidate: &MergeCandidate,
    ) -> Result<Vec<SegmentMeta>> {
        let candidate_ids: HashSet<SegmentId> = candidate.0.iter().cloned().collect();
        if candidate_ids.len() < 2 {
            return Ok(metas);
        }
        let mut readers = Vec::with_capacity(candidate_ids.len());
        for meta in metas.iter().filter(|meta| candidate_ids.contains(&meta.id())) {
            let segment = Segment::new(
                self.index.storage().box_clone(),
                self.schema.clone(),
                meta.clone(),
            );
            readers.push(crate::core::SegmentReader::open(&segment)?);
        }
        if readers.len() < 2 {
            return Ok(metas);
        }
        info!(
            "merging {} segments ({:?})",
            readers.len(),
            candidate.0.iter().map(SegmentId::short_uuid_string).collect::<Vec<_>>()
        );
        let merger = IndexMerger::new(self.schema.clone(), readers);
        let first_position = metas
            .iter()
            .position(|meta| candidate_ids.contains(&meta.id()))
            .expect("candidate segments are present");
        if merger.num_docs() == 0 {
            metas.retain(|meta| !candidate_ids.contains(&meta.id()));
            return Ok(metas);
        }
        let target = new_segment(&self.index, &self.schema);
        let merged = merger.write(&target)?;
        let merged_meta = SegmentMeta::from_parts(
            self.index.inventory(),
            target.id(),
            merged.max_doc,
            None,
            merged.field_length_totals,
            merged.byte_size,
        );
        metas.retain(|meta| !candidate_ids.contains(&meta.id()));
        metas.insert(first_position.min(metas.len()), merged_meta);
        Ok(metas)
    }

    /// Detects and removes the files that are not used by the index
    /// anymore: older TOCs and the files of segments no live meta pins.
    pub fn garbage_collect_files(&self) -> Result<()> {
        let living = self.index.inventory().living_entries();
        let living_ids: HashSet<SegmentId> =
            living.iter().map(|&(segment_id, _)| segment_id).collect();
        let living_del_gens: HashSet<(SegmentId, u64)> = living
            .iter()
            .filter_map(|&(segment_id, del_gen)| del_gen.map(|del_gen| (segment_id, del_gen)))
            .collect();
        let current_generation = self.committed_toc.generation;
        for path in self.index.storage().list()? {
            let name = match path.to_str() {
                Some(name) => name,
                None => continue,
            };
            if name.contains("WRITELOCK") || name.ends_with(".lock") {
                continue;
            }
            if name.ends_with(".toc") {
                if let Some(generation) =
                    TableOfContents::parse_generation(self.index.name(), &path)
                {
                    if generation < current_generation {
                        debug!("garbage collecting old TOC {:?}", path);
                        let _ = self.index.storage().delete(&path);
                    }
                }
                continue;
            }
            let mut parts = name.splitn(2, '.');
            let stem = match parts.next() {
                Some(stem) => stem,
                None => continue,
            };
            let segment_id = match SegmentId::from_uuid_string(stem) {
                Some(segment_id) => segment_id,
                None => continue,
            };
            if !living_ids.contains(&segment_id) {
                debug!("garbage collecting {:?}", path);
                let _ = self.index.storage().delete(&path);
                continue;
            }
            if name.ends_with(".del") {
                // `<uuid>.<del_gen>.del`: only the pinned generations
                // survive
                let del_gen = parts
                    .next()
                    .and_then(|rest| rest.trim_end_matches(".del").parse::<u64>().ok());
                if let Some(del_gen) = del_gen {
                    if !living_del_gens.contains(&(segment_id, del_gen)) {
                        debug!("garbage collecting stale live-docs file {:?}", path);
                        let _ = self.index.storage().delete(&path);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        // an uncommitted writer cancels: partial files are removed and
        // the lock is released by dropping the handle
        if let Err(err) = self.cancel_inner(false) {
            error!("cleanup on writer drop failed: {:?}", err);
        }
    }
}
