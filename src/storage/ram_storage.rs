use crate::storage::error::{DeleteError, LockError, OpenReadError, OpenWriteError};
use crate::storage::{Lock, LockHandle, ReadOnlySource, Storage, WritePtr};
use fail::fail_point;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::result;
use std::sync::{Arc, Condvar, Mutex, RwLock};

/// Writer that publishes its buffer into the shared file map on flush.
///
/// Dropping it without a final flush is a programming error and panics,
/// mirroring the contract of the file-backed storage where unflushed
/// data is simply lost.
struct VecWriter {
    path: PathBuf,
    shared_storage: RamStorage,
    data: Vec<u8>,
    is_flushed: bool,
}

impl VecWriter {
    fn new(path: PathBuf, shared_storage: RamStorage) -> VecWriter {
        VecWriter {
            path,
            shared_storage,
            data: Vec::new(),
            is_flushed: true,
        }
    }
}

impl Drop for VecWriter {
    fn drop(&mut self) {
        if !self.is_flushed {
            panic!(
                "You forgot to flush {:?} before its writer got dropped and its data discarded.",
                self.path
            );
        }
    }
}

impl Write for VecWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.is_flushed = false;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.is_flushed = true;
        self.shared_storage
            .write_file(&self.path, self.data.clone());
        Ok(())
    }
}

#[derive(Default)]
struct InnerStorage {
    files: HashMap<PathBuf, ReadOnlySource>,
}

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// Storage keeping every file in anonymous memory.
///
/// Writes are only visible after the writer is flushed.
#[derive(Clone, Default)]
pub struct RamStorage {
    fs: Arc<RwLock<InnerStorage>>,
    locks: Arc<LockTable>,
}

impl fmt::Debug for RamStorage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RamStorage")
    }
}

impl RamStorage {
    pub fn create() -> RamStorage {
        RamStorage::default()
    }

    fn write_file(&self, path: &Path, data: Vec<u8>) {
        let mut inner = self.fs.write().expect("ram storage poisoned");
        inner
            .files
            .insert(path.to_path_buf(), ReadOnlySource::from(data));
    }

    /// Total size of the files, for tests.
    pub fn total_mem_usage(&self) -> usize {
        let inner = self.fs.read().expect("ram storage poisoned");
        inner.files.values().map(ReadOnlySource::len).sum()
    }
}

struct RamLockGuard {
    locks: Arc<LockTable>,
    path: PathBuf,
}

impl Drop for RamLockGuard {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().expect("lock table poisoned");
        held.remove(&self.path);
        self.locks.released.notify_all();
    }
}

impl Storage for RamStorage {
    fn open_read(&self, path: &Path) -> result::Result<ReadOnlySource, OpenReadError> {
        let inner = self
            .fs
            .read()
            .map_err(|_| make_poison_err(path))?;
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| OpenReadError::FileDoesNotExist(path.to_path_buf()))
    }

    fn open_write(&self, path: &Path) -> result::Result<WritePtr, OpenWriteError> {
        {
            let mut inner = self
                .fs
                .write()
                .map_err(|_| OpenWriteError::IoError(io::Error::new(
                    io::ErrorKind::Other,
                    "ram storage poisoned",
                )))?;
            if inner.files.contains_key(path) {
                return Err(OpenWriteError::FileAlreadyExists(path.to_path_buf()));
            }
            inner
                .files
                .insert(path.to_path_buf(), ReadOnlySource::empty());
        }
        let writer: Box<dyn io::Write> = Box::new(VecWriter::new(path.to_path_buf(), self.clone()));
        Ok(BufWriter::new(writer))
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fail_point!("RamStorage::atomic_write", |msg| Err(io::Error::new(
            io::ErrorKind::Other,
            msg.unwrap_or_else(|| "Undefined".to_string())
        )));
        self.write_file(path, data.to_vec());
        Ok(())
    }

    fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut inner = self
            .fs
            .write()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "ram storage poisoned"))?;
        let source = inner.files.remove(from).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{:?} does not exist", from))
        })?;
        inner.files.insert(to.to_path_buf(), source);
        Ok(())
    }

    fn delete(&self, path: &Path) -> result::Result<(), DeleteError> {
        let mut inner = self.fs.write().map_err(|_| {
            DeleteError::IoError(io::Error::new(io::ErrorKind::Other, "ram storage poisoned"))
        })?;
        inner
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DeleteError::FileDoesNotExist(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.fs.read().expect("ram storage poisoned");
        inner.files.contains_key(path)
    }

    fn list(&self) -> io::Result<Vec<PathBuf>> {
        let inner = self
            .fs
            .read()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "ram storage poisoned"))?;
        Ok(inner.files.keys().cloned().collect())
    }

    fn acquire_lock(&self, lock: &Lock) -> result::Result<LockHandle, LockError> {
        let mut held = self
            .locks
            .held
            .lock()
            .map_err(|_| LockError::IoError(io::Error::new(
                io::ErrorKind::Other,
                "lock table poisoned",
            )))?;
        if lock.is_blocking {
            while held.contains(&lock.filepath) {
                held = self
                    .locks
                    .released
                    .wait(held)
                    .map_err(|_| LockError::IoError(io::Error::new(
                        io::ErrorKind::Other,
                        "lock table poisoned",
                    )))?;
            }
        } else if held.contains(&lock.filepath) {
            return Err(LockError::LockBusy(lock.filepath.clone()));
        }
        held.insert(lock.filepath.clone());
        Ok(LockHandle::new(Box::new(RamLockGuard {
            locks: self.locks.clone(),
            path: lock.filepath.clone(),
        })))
    }
}

fn make_poison_err(path: &Path) -> OpenReadError {
    OpenReadError::IoError(io::Error::new(
        io::ErrorKind::Other,
        format!("ram storage poisoned while reading {:?}", path),
    ))
}
