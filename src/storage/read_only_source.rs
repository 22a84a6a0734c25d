use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
enum SourceData {
    Anonymous(Arc<Vec<u8>>),
    #[cfg(feature = "mmap")]
    Mmap(Arc<memmap::Mmap>),
}

/// Immutable, cheaply cloneable view over a file's bytes.
///
/// Cloning or slicing never copies data; each clone carries its own
/// byte range over the shared backing buffer, which is what makes
/// concurrent readers safe without per-handle seeking.
#[derive(Clone)]
pub struct ReadOnlySource {
    data: SourceData,
    start: usize,
    stop: usize,
}

impl ReadOnlySource {
    /// An empty source.
    pub fn empty() -> ReadOnlySource {
        ReadOnlySource::from(Vec::new())
    }

    #[cfg(feature = "mmap")]
    pub(crate) fn from_mmap(mmap: Arc<memmap::Mmap>) -> ReadOnlySource {
        let len = mmap.len();
        ReadOnlySource {
            data: SourceData::Mmap(mmap),
            start: 0,
            stop: len,
        }
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    pub fn as_slice(&self) -> &[u8] {
        let whole: &[u8] = match self.data {
            SourceData::Anonymous(ref data) => &data[..],
            #[cfg(feature = "mmap")]
            SourceData::Mmap(ref mmap) => &mmap[..],
        };
        &whole[self.start..self.stop]
    }

    /// Returns the sub-view `[from, to)` of this source.
    pub fn slice(&self, from: usize, to: usize) -> ReadOnlySource {
        assert!(from <= to);
        assert!(
            to <= self.len(),
            "slice end {} out of bounds (len {})",
            to,
            self.len()
        );
        ReadOnlySource {
            data: self.data.clone(),
            start: self.start + from,
            stop: self.start + to,
        }
    }

    pub fn slice_from(&self, from: usize) -> ReadOnlySource {
        self.slice(from, self.len())
    }

    pub fn slice_to(&self, to: usize) -> ReadOnlySource {
        self.slice(0, to)
    }
}

impl Deref for ReadOnlySource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for ReadOnlySource {
    fn from(data: Vec<u8>) -> ReadOnlySource {
        let len = data.len();
        ReadOnlySource {
            data: SourceData::Anonymous(Arc::new(data)),
            start: 0,
            stop: len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReadOnlySource;

    #[test]
    fn test_slice() {
        let source = ReadOnlySource::from(b"abcdefgh".to_vec());
        assert_eq!(source.len(), 8);
        let middle = source.slice(2, 6);
        assert_eq!(middle.as_slice(), b"cdef");
        let inner = middle.slice(1, 3);
        assert_eq!(inner.as_slice(), b"de");
        assert_eq!(middle.slice_from(2).as_slice(), b"ef");
        assert_eq!(middle.slice_to(2).as_slice(), b"cd");
    }
}
