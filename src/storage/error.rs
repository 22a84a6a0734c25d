//! Errors specific to storage operations.

use std::io;
use std::path::PathBuf;

/// Error while opening a file for reading.
#[derive(Debug, Fail)]
pub enum OpenReadError {
    #[fail(display = "the file {:?} does not exist", _0)]
    FileDoesNotExist(PathBuf),
    #[fail(display = "an io error occurred: {}", _0)]
    IoError(#[cause] io::Error),
}

/// Error while creating a file for writing.
#[derive(Debug, Fail)]
pub enum OpenWriteError {
    #[fail(display = "the file {:?} already exists", _0)]
    FileAlreadyExists(PathBuf),
    #[fail(display = "an io error occurred: {}", _0)]
    IoError(#[cause] io::Error),
}

/// Error while deleting a file.
#[derive(Debug, Fail)]
pub enum DeleteError {
    #[fail(display = "the file {:?} does not exist", _0)]
    FileDoesNotExist(PathBuf),
    #[fail(display = "an io error occurred: {}", _0)]
    IoError(#[cause] io::Error),
}

/// Error while acquiring an advisory lock.
#[derive(Debug, Fail)]
pub enum LockError {
    #[fail(display = "the lock {:?} is held by another writer", _0)]
    LockBusy(PathBuf),
    #[fail(display = "an io error occurred: {}", _0)]
    IoError(#[cause] io::Error),
}

impl From<io::Error> for OpenReadError {
    fn from(err: io::Error) -> OpenReadError {
        OpenReadError::IoError(err)
    }
}

impl From<io::Error> for OpenWriteError {
    fn from(err: io::Error) -> OpenWriteError {
        OpenWriteError::IoError(err)
    }
}

impl From<io::Error> for DeleteError {
    fn from(err: io::Error) -> DeleteError {
        DeleteError::IoError(err)
    }
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> LockError {
        LockError::IoError(err)
    }
}
