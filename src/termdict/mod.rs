//! The term dictionary: an ordered map from term bytes to [`TermInfo`].
//!
//! Terms are laid out in prefix-coded blocks. Each entry stores the
//! length of the prefix it shares with its predecessor and its suffix;
//! the first entry of a block shares nothing, so a block is a valid
//! decode start. A sparse in-memory index keeps the first key and the
//! byte offset of every block, making exact lookup a binary search over
//! blocks followed by at most one block scan.

mod term_info;

pub use self::term_info::TermInfo;

use crate::common::{BinarySerializable, CountingWriter, VInt};
use crate::storage::ReadOnlySource;
use std::io;
use std::io::Write;
use std::ops::Bound;

/// Number of terms per prefix-coded block.
const TERMS_PER_BLOCK: usize = 16;

/// Streaming builder; terms must be inserted in strictly increasing
/// byte order.
pub struct TermDictionaryBuilder<W: Write> {
    write: CountingWriter<W>,
    block_index: Vec<(Vec<u8>, u64)>,
    last_key: Vec<u8>,
    num_terms_in_block: usize,
    num_terms: u64,
}

fn common_prefix_len(left: &[u8], right: &[u8]) -> usize {
    left.iter()
        .zip(right.iter())
        .take_while(|(a, b)| a == b)
        .count()
}

impl<W: Write> TermDictionaryBuilder<W> {
    pub fn create(write: W) -> TermDictionaryBuilder<W> {
        TermDictionaryBuilder {
            write: CountingWriter::wrap(write),
            block_index: Vec::new(),
            last_key: Vec::new(),
            num_terms_in_block: 0,
            num_terms: 0,
        }
    }

    pub fn insert(&mut self, key: &[u8], term_info: &TermInfo) -> io::Result<()> {
        debug_assert!(
            self.num_terms == 0 || &self.last_key[..] < key,
            "terms must be inserted in strictly increasing order"
        );
        if self.num_terms_in_block == TERMS_PER_BLOCK {
            self.num_terms_in_block = 0;
        }
        let shared = if self.num_terms_in_block == 0 {
            self.block_index
                .push((key.to_vec(), self.write.written_bytes()));
            0
        } else {
            common_prefix_len(&self.last_key, key)
        };
        VInt(shared as u64).serialize(&mut self.write)?;
        VInt((key.len() - shared) as u64).serialize(&mut self.write)?;
        self.write.write_all(&key[shared..])?;
        term_info.serialize(&mut self.write)?;
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_terms_in_block += 1;
        self.num_terms += 1;
        Ok(())
    }

    /// Writes the block index and footer, and returns the underlying
    /// writer flushed.
    pub fn finish(mut self) -> io::Result<W> {
        let index_offset = self.write.written_bytes();
        VInt(self.block_index.len() as u64).serialize(&mut self.write)?;
        for (first_key, offset) in &self.block_index {
            VInt(first_key.len() as u64).serialize(&mut self.write)?;
            self.write.write_all(first_key)?;
            VInt(*offset).serialize(&mut self.write)?;
        }
        self.num_terms.serialize(&mut self.write)?;
        index_offset.serialize(&mut self.write)?;
        self.write.finish()
    }
}

/// Read-side term dictionary.
#[derive(Clone)]
pub struct TermDictionary {
    data: ReadOnlySource,
    block_index: Vec<(Vec<u8>, usize)>,
    num_terms: u64,
    index_offset: usize,
}

impl TermDictionary {
    pub fn from_source(data: ReadOnlySource) -> io::Result<TermDictionary> {
        let len = data.len();
        if len < 16 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "term dictionary file too short",
            ));
        }
        let (num_terms, index_offset) = {
            let mut footer = &data.as_slice()[len - 16..];
            let num_terms = u64::deserialize(&mut footer)?;
            let index_offset = u64::deserialize(&mut footer)? as usize;
            (num_terms, index_offset)
        };
        if index_offset > len - 16 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "term dictionary index offset out of bounds",
            ));
        }
        let mut index_bytes = &data.as_slice()[index_offset..len - 16];
        let num_blocks = VInt::deserialize(&mut index_bytes)?.0 as usize;
        let mut block_index = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            let key_len = VInt::deserialize(&mut index_bytes)?.0 as usize;
            let mut key = vec![0u8; key_len];
            io::Read::read_exact(&mut index_bytes, &mut key)?;
            let offset = VInt::deserialize(&mut index_bytes)?.0 as usize;
            block_index.push((key, offset));
        }
        Ok(TermDictionary {
            data,
            block_index,
            num_terms,
            index_offset,
        })
    }

    /// An empty dictionary.
    pub fn empty() -> TermDictionary {
        TermDictionary {
            data: ReadOnlySource::empty(),
            block_index: Vec::new(),
            num_terms: 0,
            index_offset: 0,
        }
    }

    pub fn num_terms(&self) -> u64 {
        self.num_terms
    }

    /// Offset of the last block whose first key is `<= key`, if any.
    fn block_offset_for(&self, key: &[u8]) -> Option<usize> {
        let mut lo = 0usize;
        let mut hi = self.block_index.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.block_index[mid].0.as_slice() <= key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            None
        } else {
            Some(self.block_index[lo - 1].1)
        }
    }

    /// Exact lookup.
    pub fn get(&self, key: &[u8]) -> Option<TermInfo> {
        let block_offset = self.block_offset_for(key)?;
        let mut streamer = self.streamer_at(block_offset, Bound::Unbounded);
        while streamer.advance() {
            if streamer.key() == key {
                return Some(streamer.term_info().clone());
            }
            if streamer.key() > key {
                return None;
            }
        }
        None
    }

    fn streamer_at(&self, offset: usize, upper: Bound<Vec<u8>>) -> TermStreamer<'_> {
        TermStreamer {
            data: &self.data.as_slice()[..self.index_offset],
            cursor: offset,
            current_key: Vec::new(),
            current_info: TermInfo::default(),
            upper,
            within_bounds: true,
        }
    }

    /// Streams every term in order.
    pub fn stream(&self) -> TermStreamer<'_> {
        self.streamer_at(0, Bound::Unbounded)
    }

    /// Streams the terms within the given byte range.
    pub fn stream_range(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<Vec<u8>>,
    ) -> TermStreamer<'_> {
        let start_offset = match lower {
            Bound::Included(key) | Bound::Excluded(key) => {
                self.block_offset_for(key).unwrap_or(0)
            }
            Bound::Unbounded => 0,
        };
        let mut streamer = self.streamer_at(start_offset, upper);
        // advance until the lower bound is satisfied; the streamer stays
        // "un-advanced" so that the first `advance()` yields the first
        // in-range key.
        match lower {
            Bound::Included(key) => streamer.position_at(key, true),
            Bound::Excluded(key) => streamer.position_at(key, false),
            Bound::Unbounded => {}
        }
        streamer
    }

    /// Streams the terms starting with `prefix`.
    pub fn stream_prefix(&self, prefix: &[u8]) -> TermStreamer<'_> {
        let upper = prefix_successor(prefix)
            .map(Bound::Excluded)
            .unwrap_or(Bound::Unbounded);
        self.stream_range(Bound::Included(prefix), upper)
    }
}

/// Smallest byte string greater than every string prefixed by `prefix`,
/// or None if there is none (all 0xff).
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(&last) = successor.last() {
        if last == 0xff {
            successor.pop();
        } else {
            *successor.last_mut().unwrap() += 1;
            return Some(successor);
        }
    }
    None
}

/// Forward iterator over a range of the dictionary.
pub struct TermStreamer<'a> {
    data: &'a [u8],
    cursor: usize,
    current_key: Vec<u8>,
    current_info: TermInfo,
    upper: Bound<Vec<u8>>,
    within_bounds: bool,
}

impl<'a> TermStreamer<'a> {
    fn decode_one(&mut self) -> bool {
        if self.cursor >= self.data.len() {
            return false;
        }
        let mut slice = &self.data[self.cursor..];
        let before = slice.len();
        let shared = match VInt::deserialize_from_slice(slice) {
            Some((val, read)) => {
                slice = &slice[read..];
                val as usize
            }
            None => return false,
        };
        let suffix_len = match VInt::deserialize_from_slice(slice) {
            Some((val, read)) => {
                slice = &slice[read..];
                val as usize
            }
            None => return false,
        };
        if slice.len() < suffix_len {
            return false;
        }
        self.current_key.truncate(shared);
        self.current_key.extend_from_slice(&slice[..suffix_len]);
        slice = &slice[suffix_len..];
        match TermInfo::deserialize(&mut slice) {
            Ok(info) => {
                self.current_info = info;
            }
            Err(_) => return false,
        }
        self.cursor += before - slice.len();
        true
    }

    /// Skips entries until the key is `>= bound` (or `> bound` when
    /// `inclusive` is false), leaving that entry to be re-yielded by the
    /// next `advance` call.
    fn position_at(&mut self, bound: &[u8], inclusive: bool) {
        loop {
            let checkpoint = self.cursor;
            if !self.decode_one() {
                return;
            }
            let past_bound = if inclusive {
                self.current_key.as_slice() >= bound
            } else {
                self.current_key.as_slice() > bound
            };
            if past_bound {
                // rewind: re-decode this entry on the next advance.
                // the shared-prefix state is preserved in current_key.
                self.cursor = checkpoint;
                return;
            }
        }
    }

    pub fn advance(&mut self) -> bool {
        if !self.within_bounds || !self.decode_one() {
            return false;
        }
        self.within_bounds = match &self.upper {
            Bound::Included(upper) => self.current_key.as_slice() <= upper.as_slice(),
            Bound::Excluded(upper) => self.current_key.as_slice() < upper.as_slice(),
            Bound::Unbounded => true,
        };
        self.within_bounds
    }

    pub fn key(&self) -> &[u8] {
        &self.current_key
    }

    pub fn term_info(&self) -> &TermInfo {
        &self.current_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Bound;

    fn build_dict(keys: &[&[u8]]) -> TermDictionary {
        let mut builder = TermDictionaryBuilder::create(Vec::new());
        for (ord, key) in keys.iter().enumerate() {
            let info = TermInfo {
                doc_freq: ord as u32 + 1,
                total_freq: ord as u64 + 1,
                postings_offset: ord as u64 * 100,
                postings_num_bytes: 10,
            };
            builder.insert(key, &info).unwrap();
        }
        let buffer = builder.finish().unwrap();
        TermDictionary::from_source(ReadOnlySource::from(buffer)).unwrap()
    }

    #[test]
    fn test_term_dictionary_get() {
        let keys: Vec<Vec<u8>> = (0u32..1000)
            .map(|i| format!("term{:05}", i * 3).into_bytes())
            .collect();
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| &k[..]).collect();
        let dict = build_dict(&key_refs);
        assert_eq!(dict.num_terms(), 1000);
        for (ord, key) in keys.iter().enumerate() {
            let info = dict.get(key).unwrap();
            assert_eq!(info.doc_freq, ord as u32 + 1);
            assert_eq!(info.postings_offset, ord as u64 * 100);
        }
        assert!(dict.get(b"term00001").is_none());
        assert!(dict.get(b"aaaa").is_none());
        assert!(dict.get(b"zzzz").is_none());
    }

    #[test]
    fn test_term_dictionary_stream() {
        let dict = build_dict(&[b"apple", b"banana", b"cherry", b"date"]);
        let mut streamer = dict.stream();
        let mut keys = Vec::new();
        while streamer.advance() {
            keys.push(streamer.key().to_vec());
        }
        assert_eq!(
            keys,
            vec![
                b"apple".to_vec(),
                b"banana".to_vec(),
                b"cherry".to_vec(),
                b"date".to_vec()
            ]
        );
    }

    #[test]
    fn test_term_dictionary_range() {
        let dict = build_dict(&[b"aa", b"ab", b"ba", b"bb", b"ca"]);
        let mut streamer = dict.stream_range(
            Bound::Excluded(b"ab".as_ref()),
            Bound::Included(b"bb".to_vec()),
        );
        let mut keys = Vec::new();
        while streamer.advance() {
            keys.push(streamer.key().to_vec());
        }
        assert_eq!(keys, vec![b"ba".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn test_term_dictionary_prefix() {
        let dict = build_dict(&[b"car", b"cart", b"cat", b"dog"]);
        let mut streamer = dict.stream_prefix(b"ca");
        let mut keys = Vec::new();
        while streamer.advance() {
            keys.push(streamer.key().to_vec());
        }
        assert_eq!(keys, vec![b"car".to_vec(), b"cart".to_vec(), b"cat".to_vec()]);
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(&[0x61, 0xff]), Some(vec![0x62]));
        assert_eq!(prefix_successor(&[0xff, 0xff]), None);
    }
}
