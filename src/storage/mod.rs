//! Named byte-streams within a directory.
//!
//! A [`Storage`] hands out readable, seekable sources and write-once
//! streams, performs atomic renames, and owns the advisory lock used to
//! enforce the single-writer discipline. Two implementations are
//! provided: [`RamStorage`] for tests and transient indexes, and the
//! mmap-backed [`FileStorage`].

pub mod error;
#[cfg(feature = "mmap")]
mod file_storage;
mod ram_storage;
mod read_only_source;

#[cfg(feature = "mmap")]
pub use self::file_storage::FileStorage;
pub use self::ram_storage::RamStorage;
pub use self::read_only_source::ReadOnlySource;

use self::error::{DeleteError, LockError, OpenReadError, OpenWriteError};
use std::any::Any;
use std::fmt;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write handle returned by [`Storage::open_write`].
///
/// Data is only guaranteed durable after `flush` returns; the RAM
/// implementation panics if a writer is dropped without a final flush,
/// which catches missing-flush bugs in the codec writers early.
pub type WritePtr = BufWriter<Box<dyn Write>>;

/// A requested advisory lock.
pub struct Lock {
    /// Name of the lock file within the storage.
    pub filepath: PathBuf,
    /// Whether acquisition should block until the lock is free.
    pub is_blocking: bool,
}

/// Handle materializing lock ownership. Dropping it releases the lock.
pub struct LockHandle {
    _guard: Box<dyn Any + Send + Sync>,
}

impl LockHandle {
    pub fn new(guard: Box<dyn Any + Send + Sync>) -> LockHandle {
        LockHandle { _guard: guard }
    }
}

/// Clone helper so `Box<dyn Storage>` stays cloneable.
pub trait StorageClone {
    fn box_clone(&self) -> Box<dyn Storage>;
}

impl<T: Storage + Clone + 'static> StorageClone for T {
    fn box_clone(&self) -> Box<dyn Storage> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Storage> {
    fn clone(&self) -> Box<dyn Storage> {
        self.box_clone()
    }
}

/// Abstraction over the directory holding the index files.
///
/// All paths are relative to the storage root. Implementations must make
/// concurrent reads safe: a [`ReadOnlySource`] is an independent view and
/// can be sliced and consumed from any thread.
pub trait Storage: StorageClone + fmt::Debug + Send + Sync + 'static {
    /// Opens a file for random-access reads.
    fn open_read(&self, path: &Path) -> Result<ReadOnlySource, OpenReadError>;

    /// Creates a file and returns a write handle for it.
    ///
    /// Fails with `FileAlreadyExists` if the path is taken: index files
    /// are written once and never rewritten in place.
    fn open_write(&self, path: &Path) -> Result<WritePtr, OpenWriteError>;

    /// Writes `data` to `path` atomically: concurrent readers observe
    /// either the previous content or the full new content.
    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Atomically renames `from` to `to`, replacing any existing `to`.
    fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Removes a file.
    fn delete(&self, path: &Path) -> Result<(), DeleteError>;

    /// Returns true if the file exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists the files present in the storage.
    fn list(&self) -> io::Result<Vec<PathBuf>>;

    /// Acquires an advisory lock.
    ///
    /// Non-blocking acquisition fails with [`LockError::LockBusy`] when
    /// the lock is held elsewhere.
    fn acquire_lock(&self, lock: &Lock) -> Result<LockHandle, LockError>;
}

#[cfg(test)]
mod tests;
