//! Definition of lexis' error and result types.

use crate::schema::Field;
use crate::storage::error::{DeleteError, LockError, OpenReadError, OpenWriteError};
use std::io;
use std::path::PathBuf;
use std::sync::PoisonError;

/// The library's failure modes.
///
/// Most public operations return `crate::Result<T>`, which is
/// `Result<T, LexisError>`.
#[derive(Debug, Fail)]
pub enum LexisError {
    /// No table of contents was found where an index was expected.
    #[fail(display = "no index found in the storage directory")]
    EmptyIndex,
    /// The table of contents was written by a different codec version.
    #[fail(
        display = "incompatible index format: found version {}, this build reads version {}",
        found, supported
    )]
    IncompatibleFormat {
        /// Format version found in the table of contents.
        found: u32,
        /// Format version this build understands.
        supported: u32,
    },
    /// The operation required the latest generation but the reader is stale.
    #[fail(
        display = "reader holds generation {} but the index is at generation {}",
        held, current
    )]
    OutOfDate { held: u64, current: u64 },
    /// The writer lock is already held.
    #[fail(display = "failed to acquire the write lock on {:?}", _0)]
    Locked(PathBuf),
    /// A field id did not resolve in the schema.
    #[fail(display = "field {:?} does not exist in the schema", _0)]
    NoSuchField(Field),
    /// A field name did not resolve in the schema.
    #[fail(display = "unknown field {:?}", _0)]
    UnknownField(String),
    /// A field exists but is not configured for the requested operation.
    #[fail(display = "field configuration error: {}", _0)]
    FieldConfiguration(String),
    /// The query is malformed with respect to the schema.
    #[fail(display = "query error: {}", _0)]
    Query(String),
    /// An expanding query matched more terms than its cap allows.
    #[fail(
        display = "query expanded to more than {} terms (field {:?})",
        cap, field
    )]
    TooManyTerms { field: Field, cap: usize },
    /// A codec read ran past the end of its stream.
    #[fail(display = "read past the end of the stream")]
    ReadTooFar,
    /// A time-limited collection exceeded its deadline.
    #[fail(display = "search exceeded its time limit")]
    TimeLimit,
    /// A codec or I/O failure occurred while writing a segment.
    #[fail(display = "indexing failed: {}", _0)]
    Indexing(String),
    /// Underlying I/O error.
    #[fail(display = "an I/O error occurred: {}", _0)]
    Io(#[cause] io::Error),
    /// On-disk data failed validation (bad magic, checksum mismatch, ...).
    #[fail(display = "data corruption detected: {}", _0)]
    Corruption(String),
    /// An invalid argument was passed by the caller.
    #[fail(display = "invalid argument: {}", _0)]
    InvalidArgument(String),
    /// A worker thread died.
    #[fail(display = "an error occurred in a worker thread: {}", _0)]
    ErrorInThread(String),
    /// A poisoned lock, symptom of a panic in another thread.
    #[fail(display = "a thread holding an internal lock panicked")]
    Poisoned,
}

impl LexisError {
    pub(crate) fn corruption<S: Into<String>>(msg: S) -> LexisError {
        LexisError::Corruption(msg.into())
    }
}

impl From<io::Error> for LexisError {
    fn from(err: io::Error) -> LexisError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            LexisError::ReadTooFar
        } else {
            LexisError::Io(err)
        }
    }
}

impl<G> From<PoisonError<G>> for LexisError {
    fn from(_: PoisonError<G>) -> LexisError {
        LexisError::Poisoned
    }
}

impl From<OpenReadError> for LexisError {
    fn from(err: OpenReadError) -> LexisError {
        match err {
            OpenReadError::FileDoesNotExist(path) => LexisError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file does not exist: {:?}", path),
            )),
            OpenReadError::IoError(io_err) => LexisError::Io(io_err),
        }
    }
}

impl From<OpenWriteError> for LexisError {
    fn from(err: OpenWriteError) -> LexisError {
        match err {
            OpenWriteError::FileAlreadyExists(path) => LexisError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file already exists: {:?}", path),
            )),
            OpenWriteError::IoError(io_err) => LexisError::Io(io_err),
        }
    }
}

impl From<DeleteError> for LexisError {
    fn from(err: DeleteError) -> LexisError {
        match err {
            DeleteError::FileDoesNotExist(path) => LexisError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file does not exist: {:?}", path),
            )),
            DeleteError::IoError(io_err) => LexisError::Io(io_err),
        }
    }
}

impl From<LockError> for LexisError {
    fn from(err: LockError) -> LexisError {
        match err {
            LockError::LockBusy(path) => LexisError::Locked(path),
            LockError::IoError(io_err) => LexisError::Io(io_err),
        }
    }
}

impl From<serde_json::Error> for LexisError {
    fn from(err: serde_json::Error) -> LexisError {
        LexisError::Corruption(format!("schema deserialization failed: {}", err))
    }
}
