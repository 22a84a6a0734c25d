use super::error::{DeleteError, LockError, OpenWriteError};
use super::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

fn write_bytes(storage: &dyn Storage, path: &Path, bytes: &[u8]) {
    let mut file = storage.open_write(path).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

fn lock_named(name: &str, blocking: bool) -> Lock {
    Lock {
        filepath: PathBuf::from(name),
        is_blocking: blocking,
    }
}

/// Invariants every `Storage` implementation must uphold. Ram and file
/// backends run the same battery.
fn check_storage_contract(storage: &dyn Storage) {
    check_write_then_read(storage);
    check_files_are_write_once(storage);
    check_open_write_reserves_the_name(storage);
    check_sources_outlive_deletion(storage);
    check_atomic_write_and_rename(storage);
    check_exclusive_locks(storage);
    check_blocking_lock_waits(storage);
}

#[test]
fn test_ram_storage_contract() {
    let ram_storage = RamStorage::create();
    check_storage_contract(&ram_storage);
}

#[test]
#[cfg(feature = "mmap")]
fn test_file_storage_contract() {
    let file_storage = FileStorage::create_from_tempdir().unwrap();
    check_storage_contract(&file_storage);
}

#[test]
#[should_panic]
fn ram_storage_panics_if_flush_forgotten() {
    let ram_storage = RamStorage::create();
    let mut file = ram_storage.open_write(Path::new("unflushed")).unwrap();
    assert!(file.write_all(&[4]).is_ok());
    // dropping the writer without a flush must not lose data silently
}

fn check_write_then_read(storage: &dyn Storage) {
    let path = Path::new("roundtrip");
    write_bytes(storage, path, &[2, 3, 5, 7, 11]);
    let source = storage.open_read(path).unwrap();
    assert_eq!(source.as_slice(), &[2u8, 3, 5, 7, 11]);
    storage.delete(path).unwrap();
    assert!(!storage.exists(path));
    assert!(storage.open_read(path).is_err());
}

fn check_files_are_write_once(storage: &dyn Storage) {
    // index files are never rewritten in place; a second open_write on
    // the same name must be refused
    let path = Path::new("write_once");
    write_bytes(storage, path, b"first");
    assert!(matches::matches!(
        storage.open_write(path),
        Err(OpenWriteError::FileAlreadyExists(_))
    ));
    storage.delete(path).unwrap();
}

fn check_open_write_reserves_the_name(storage: &dyn Storage) {
    let path = Path::new("reserved");
    assert!(!storage.exists(path));
    {
        let mut file = storage.open_write(path).unwrap();
        file.flush().unwrap();
    }
    // the name is taken from the moment open_write succeeds, even
    // before any byte is written
    assert!(storage.exists(path));
    assert!(storage.open_read(path).is_ok());
    storage.delete(path).unwrap();
}

fn check_sources_outlive_deletion(storage: &dyn Storage) {
    let path = Path::new("pinned");
    write_bytes(storage, path, &[9, 9, 9]);
    let source = storage.open_read(path).unwrap();
    storage.delete(path).unwrap();
    // a reader that opened the file before the delete keeps a valid
    // view; this is what lets the GC sweep run under live readers
    assert_eq!(source.as_slice(), &[9u8, 9, 9]);
    assert!(storage.open_read(path).is_err());
    assert!(matches::matches!(
        storage.delete(path),
        Err(DeleteError::FileDoesNotExist(_))
    ));
    assert!(storage.delete(Path::new("never_created")).is_err());
}

fn check_atomic_write_and_rename(storage: &dyn Storage) {
    let scratch = Path::new("toc_scratch");
    let published = Path::new("toc_published");
    storage.atomic_write(scratch, b"generation 1").unwrap();
    // unlike open_write, atomic_write may replace existing content
    storage.atomic_write(scratch, b"generation 2").unwrap();
    assert_eq!(
        storage.open_read(scratch).unwrap().as_slice(),
        b"generation 2"
    );
    storage.atomic_rename(scratch, published).unwrap();
    assert!(!storage.exists(scratch));
    assert_eq!(
        storage.open_read(published).unwrap().as_slice(),
        b"generation 2"
    );
    assert!(storage.list().unwrap().contains(&published.to_path_buf()));
    storage.delete(published).unwrap();
}

fn check_exclusive_locks(storage: &dyn Storage) {
    let first = storage.acquire_lock(&lock_named("writer.lock", false));
    assert!(first.is_ok());
    // a different lock name is unrelated
    assert!(storage
        .acquire_lock(&lock_named("other.lock", false))
        .is_ok());
    // the same name is busy while the first handle lives
    assert!(matches::matches!(
        storage.acquire_lock(&lock_named("writer.lock", false)),
        Err(LockError::LockBusy(_))
    ));
    drop(first);
    // and free again once it is dropped
    assert!(storage
        .acquire_lock(&lock_named("writer.lock", false))
        .is_ok());
}

fn check_blocking_lock_waits(storage: &dyn Storage) {
    let held = storage
        .acquire_lock(&lock_named("writer.lock", true))
        .unwrap();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        drop(held);
    });
    // non-blocking acquisition reports busy while the thread holds it
    assert!(storage
        .acquire_lock(&lock_named("writer.lock", false))
        .is_err());
    // blocking acquisition parks until the holder releases
    let start = Instant::now();
    assert!(storage
        .acquire_lock(&lock_named("writer.lock", true))
        .is_ok());
    assert!(start.elapsed() >= Duration::from_millis(10));
}
