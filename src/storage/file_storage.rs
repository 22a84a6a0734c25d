use crate::storage::error::{DeleteError, LockError, OpenReadError, OpenWriteError};
use crate::storage::{Lock, LockHandle, ReadOnlySource, Storage, WritePtr};
use atomicwrites::{AllowOverwrite, AtomicFile};
use fs2::FileExt;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::result;
use std::sync::{Arc, RwLock, Weak};
use tempfile::TempDir;

/// Returns None iff the file exists, can be read, but is empty (and hence
/// cannot be mmapped).
fn open_mmap(full_path: &Path) -> result::Result<Option<memmap::Mmap>, OpenReadError> {
    let file = File::open(full_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            OpenReadError::FileDoesNotExist(full_path.to_owned())
        } else {
            OpenReadError::IoError(e)
        }
    })?;
    let meta_data = file.metadata().map_err(OpenReadError::IoError)?;
    if meta_data.len() == 0 {
        // an empty file cannot be mmapped
        return Ok(None);
    }
    unsafe {
        memmap::Mmap::map(&file)
            .map(Some)
            .map_err(OpenReadError::IoError)
    }
}

#[derive(Default)]
struct MmapCache {
    cache: HashMap<PathBuf, Weak<memmap::Mmap>>,
}

impl MmapCache {
    // Returns None if the file exists but has a len of 0 (and hence is not mmappable).
    fn get_mmap(&mut self, full_path: &Path) -> result::Result<Option<Arc<memmap::Mmap>>, OpenReadError> {
        if let Some(mmap_weak) = self.cache.get(full_path) {
            if let Some(mmap_arc) = mmap_weak.upgrade() {
                return Ok(Some(mmap_arc));
            }
            self.cache.remove(full_path);
        }
        if let Some(mmap) = open_mmap(full_path)? {
            let mmap_arc = Arc::new(mmap);
            self.cache
                .insert(full_path.to_owned(), Arc::downgrade(&mmap_arc));
            Ok(Some(mmap_arc))
        } else {
            Ok(None)
        }
    }
}

/// Writer syncing its file to disk when flushed.
struct SafeFileWriter {
    file: File,
}

impl Write for SafeFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

struct FileStorageInner {
    root_path: PathBuf,
    mmap_cache: RwLock<MmapCache>,
    _temp_directory: Option<TempDir>,
}

/// Storage reading files through shared mmaps.
///
/// Mmaps are cached per path and dropped once the last reader releases
/// its source. Locks rely on the `fs2` definition of advisory locks
/// (`flock` on unix).
#[derive(Clone)]
pub struct FileStorage {
    inner: Arc<FileStorageInner>,
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FileStorage({:?})", self.inner.root_path)
    }
}

impl FileStorage {
    fn new(root_path: PathBuf, temp_directory: Option<TempDir>) -> FileStorage {
        FileStorage {
            inner: Arc::new(FileStorageInner {
                root_path,
                mmap_cache: RwLock::new(MmapCache::default()),
                _temp_directory: temp_directory,
            }),
        }
    }

    /// Opens an existing directory as a storage.
    pub fn open<P: AsRef<Path>>(directory_path: P) -> io::Result<FileStorage> {
        let directory_path: &Path = directory_path.as_ref();
        if !directory_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{:?} does not exist", directory_path),
            ));
        }
        if !directory_path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{:?} is not a directory", directory_path),
            ));
        }
        Ok(FileStorage::new(directory_path.to_path_buf(), None))
    }

    /// Creates a storage over a fresh temporary directory, removed when
    /// the storage is dropped. Mostly useful in tests.
    pub fn create_from_tempdir() -> io::Result<FileStorage> {
        let tempdir = TempDir::new()?;
        let tempdir_path = tempdir.path().to_path_buf();
        Ok(FileStorage::new(tempdir_path, Some(tempdir)))
    }

    fn resolve_path(&self, relative_path: &Path) -> PathBuf {
        self.inner.root_path.join(relative_path)
    }

    /// Sync the root directory; on some filesystems this is required for
    /// a rename or file creation to be durable.
    fn sync_directory(&self) -> io::Result<()> {
        let mut open_opts = OpenOptions::new();
        // Linux needs read to be set, write must not be set (EISDIR)
        open_opts.read(true);
        let fd = open_opts.open(&self.inner.root_path)?;
        fd.sync_all()?;
        Ok(())
    }
}

struct FsLockGuard {
    file: File,
    _path: PathBuf,
}

impl Drop for FsLockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            error!("Failed to release advisory lock: {:?}", err);
        }
    }
}

impl Storage for FileStorage {
    fn open_read(&self, path: &Path) -> result::Result<ReadOnlySource, OpenReadError> {
        let full_path = self.resolve_path(path);
        let mut mmap_cache = self.inner.mmap_cache.write().map_err(|_| {
            OpenReadError::IoError(io::Error::new(
                io::ErrorKind::Other,
                "mmap cache lock poisoned",
            ))
        })?;
        Ok(mmap_cache
            .get_mmap(&full_path)?
            .map(ReadOnlySource::from_mmap)
            .unwrap_or_else(ReadOnlySource::empty))
    }

    fn open_write(&self, path: &Path) -> result::Result<WritePtr, OpenWriteError> {
        let full_path = self.resolve_path(path);
        let open_res = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path);
        let file = open_res.map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                OpenWriteError::FileAlreadyExists(path.to_path_buf())
            } else {
                OpenWriteError::IoError(err)
            }
        })?;
        // the file is created, but not yet durable until the next
        // directory sync (done on flush of the TOC or explicitly).
        let writer: Box<dyn Write> = Box::new(SafeFileWriter { file });
        Ok(BufWriter::new(writer))
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full_path = self.resolve_path(path);
        let atomic_file = AtomicFile::new(full_path, AllowOverwrite);
        atomic_file.write(|f| f.write_all(data))?;
        self.sync_directory()
    }

    fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let full_from = self.resolve_path(from);
        let full_to = self.resolve_path(to);
        fs::rename(full_from, full_to)?;
        self.sync_directory()
    }

    fn delete(&self, path: &Path) -> result::Result<(), DeleteError> {
        let full_path = self.resolve_path(path);
        match fs::remove_file(&full_path) {
            Ok(_) => {
                // leave the mmap cache entry alone: open sources stay
                // valid until the last Arc is dropped.
                Ok(())
            }
            Err(err) => {
                if err.kind() == io::ErrorKind::NotFound {
                    Err(DeleteError::FileDoesNotExist(path.to_path_buf()))
                } else {
                    Err(DeleteError::IoError(err))
                }
            }
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }

    fn list(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.inner.root_path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(PathBuf::from(entry.file_name()));
            }
        }
        Ok(files)
    }

    fn acquire_lock(&self, lock: &Lock) -> result::Result<LockHandle, LockError> {
        let full_path = self.resolve_path(&lock.filepath);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&full_path)
            .map_err(LockError::IoError)?;
        if lock.is_blocking {
            file.lock_exclusive().map_err(LockError::IoError)?;
        } else {
            file.try_lock_exclusive()
                .map_err(|_| LockError::LockBusy(lock.filepath.clone()))?;
        }
        Ok(LockHandle::new(Box::new(FsLockGuard {
            file,
            _path: full_path,
        })))
    }
}
