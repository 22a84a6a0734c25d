use crate::core::{IndexReader, SegmentMetaInventory, TableOfContents};
use crate::error::LexisError;
use crate::indexer::IndexWriter;
use crate::schema::Schema;
use crate::storage::{RamStorage, Storage};
use crate::tokenizer::TokenizerManager;
use crate::Result;
use std::fmt;
use std::path::Path;

/// Default name under which the TOC files are written.
const DEFAULT_INDEX_NAME: &str = "main";

/// Top-level handle on an index.
///
/// The handle is cheap to clone; it carries the storage, the analyzer
/// registry and the segment-meta inventory used by garbage collection.
#[derive(Clone)]
pub struct Index {
    storage: Box<dyn Storage>,
    name: String,
    schema: Schema,
    tokenizers: TokenizerManager,
    inventory: SegmentMetaInventory,
}

impl Index {
    /// Creates a brand-new index in `storage`, writing the generation-0
    /// table of contents.
    pub fn create(storage: Box<dyn Storage>, schema: Schema) -> Result<Index> {
        Index::create_named(storage, schema, DEFAULT_INDEX_NAME)
    }

    pub fn create_named(storage: Box<dyn Storage>, schema: Schema, name: &str) -> Result<Index> {
        let index = Index {
            storage,
            name: name.to_string(),
            schema: schema.clone(),
            tokenizers: TokenizerManager::default(),
            inventory: SegmentMetaInventory::new(),
        };
        if index.find_latest_generation()?.is_some() {
            return Err(LexisError::InvalidArgument(format!(
                "an index named {:?} already exists in this storage",
                name
            )));
        }
        let toc = TableOfContents {
            generation: 0,
            schema,
            segments: Vec::new(),
        };
        index.write_toc(&toc)?;
        Ok(index)
    }

    /// Opens the index present in `storage`.
    pub fn open(storage: Box<dyn Storage>) -> Result<Index> {
        Index::open_named(storage, DEFAULT_INDEX_NAME)
    }

    pub fn open_named(storage: Box<dyn Storage>, name: &str) -> Result<Index> {
        let mut index = Index {
            storage,
            name: name.to_string(),
            schema: Schema::builder().build(),
            tokenizers: TokenizerManager::default(),
            inventory: SegmentMetaInventory::new(),
        };
        let toc = index.load_toc()?;
        index.schema = toc.schema;
        Ok(index)
    }

    /// Creates a transient index backed by anonymous memory.
    pub fn create_in_ram(schema: Schema) -> Index {
        let storage = RamStorage::create();
        Index::create(Box::new(storage), schema).expect("creating a ram index cannot fail")
    }

    /// Creates an index in a directory on disk.
    #[cfg(feature = "mmap")]
    pub fn create_in_dir<P: AsRef<Path>>(directory_path: P, schema: Schema) -> Result<Index> {
        let storage = crate::storage::FileStorage::open(directory_path.as_ref())?;
        Index::create(Box::new(storage), schema)
    }

    /// Opens the index stored in a directory.
    #[cfg(feature = "mmap")]
    pub fn open_in_dir<P: AsRef<Path>>(directory_path: P) -> Result<Index> {
        let storage = crate::storage::FileStorage::open(directory_path.as_ref())?;
        Index::open(Box::new(storage))
    }

    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    pub fn tokenizers(&self) -> &TokenizerManager {
        &self.tokenizers
    }

    pub(crate) fn inventory(&self) -> &SegmentMetaInventory {
        &self.inventory
    }

    /// Replaces the handle's schema with an extension of the current
    /// one. Existing fields must be unchanged; the new schema is
    /// persisted by the next commit, as a new generation.
    pub fn update_schema(&mut self, new_schema: Schema) -> Result<()> {
        if !self.schema.is_prefix_of(&new_schema) {
            return Err(LexisError::FieldConfiguration(
                "the new schema must keep every existing field unchanged".to_string(),
            ));
        }
        self.schema = new_schema;
        Ok(())
    }

    /// The highest generation present in the storage.
    pub(crate) fn find_latest_generation(&self) -> Result<Option<u64>> {
        let mut latest: Option<u64> = None;
        for path in self.storage.list()? {
            if let Some(generation) = TableOfContents::parse_generation(&self.name, &path) {
                latest = Some(latest.map(|current| current.max(generation)).unwrap_or(generation));
            }
        }
        Ok(latest)
    }

    pub fn current_generation(&self) -> Result<u64> {
        self.find_latest_generation()?.ok_or(LexisError::EmptyIndex)
    }

    /// Loads the latest table of contents.
    pub fn load_toc(&self) -> Result<TableOfContents> {
        let generation = self.current_generation()?;
        let path = TableOfContents::filename(&self.name, generation);
        let source = self.storage.open_read(&path)?;
        TableOfContents::deserialize(source.as_slice(), &self.inventory)
    }

    /// Atomically persists a table of contents.
    pub(crate) fn write_toc(&self, toc: &TableOfContents) -> Result<()> {
        let bytes = toc.serialize()?;
        let path = TableOfContents::filename(&self.name, toc.generation);
        self.storage.atomic_write(&path, &bytes)?;
        info!(
            "wrote generation {} ({} segments, {} docs)",
            toc.generation,
            toc.segments.len(),
            toc.num_docs()
        );
        Ok(())
    }

    /// Opens a reader over the current generation.
    pub fn reader(&self) -> Result<IndexReader> {
        let toc = self.load_toc()?;
        IndexReader::open(self, toc)
    }

    /// Opens a searcher over the current generation, with the default
    /// ranking model.
    pub fn searcher(&self) -> Result<crate::core::Searcher> {
        Ok(self.reader()?.searcher(None))
    }

    /// Opens the single writer.
    ///
    /// `memory_budget` bounds the indexing pool; `num_workers` selects
    /// the indexing strategy (1 = sequential with spill runs, more =
    /// parallel segment building). Fails with `Locked` if another
    /// writer holds the lock.
    pub fn writer(&self, memory_budget: usize, num_workers: usize) -> Result<IndexWriter> {
        IndexWriter::open(self.clone(), memory_budget, num_workers)
    }

    /// Writer with one worker per available core.
    pub fn writer_with_default_workers(&self, memory_budget: usize) -> Result<IndexWriter> {
        self.writer(memory_budget, num_cpus::get())
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Index({:?}, {:?})", self.name, self.storage)
    }
}
