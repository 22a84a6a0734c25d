use crate::common::{BinarySerializable, VInt};
use crate::schema::Document;
use crate::storage::ReadOnlySource;
use crate::DocId;
use std::io;
use std::sync::{Arc, Mutex};

/// Random access over the stored documents of one segment.
///
/// The last decompressed block is cached, which makes ascending access
/// patterns (results iteration, merges) cheap.
#[derive(Clone)]
pub struct StoreReader {
    data: ReadOnlySource,
    block_index: Vec<(DocId, u64)>,
    index_offset: u64,
    num_docs: DocId,
    block_cache: Arc<Mutex<Option<(usize, Arc<Vec<u8>>)>>>,
}

impl StoreReader {
    pub fn open(data: ReadOnlySource) -> io::Result<StoreReader> {
        let len = data.len();
        if len < 12 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "store file too short",
            ));
        }
        let (num_docs, index_offset) = {
            let mut footer = &data.as_slice()[len - 12..];
            let num_docs = u32::deserialize(&mut footer)?;
            let index_offset = u64::deserialize(&mut footer)?;
            (num_docs, index_offset)
        };
        let mut index_bytes = &data.as_slice()[index_offset as usize..len - 12];
        let num_blocks = VInt::deserialize(&mut index_bytes)?.0 as usize;
        let mut block_index = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            let first_doc = VInt::deserialize(&mut index_bytes)?.0 as DocId;
            let offset = VInt::deserialize(&mut index_bytes)?.0;
            block_index.push((first_doc, offset));
        }
        Ok(StoreReader {
            data,
            block_index,
            index_offset,
            num_docs,
            block_cache: Arc::new(Mutex::new(None)),
        })
    }

    pub fn num_docs(&self) -> DocId {
        self.num_docs
    }

    fn read_block(&self, block_idx: usize) -> io::Result<Arc<Vec<u8>>> {
        {
            let cache = self.block_cache.lock().expect("store cache poisoned");
            if let Some((cached_idx, ref block)) = *cache {
                if cached_idx == block_idx {
                    return Ok(block.clone());
                }
            }
        }
        let offset = self.block_index[block_idx].1 as usize;
        let end = self
            .block_index
            .get(block_idx + 1)
            .map(|&(_, offset)| offset as usize)
            .unwrap_or(self.index_offset as usize);
        let mut compressed_slice = &self.data.as_slice()[offset..end];
        let compressed_len = VInt::deserialize(&mut compressed_slice)?.0 as usize;
        let decompressed = snap::Decoder::new()
            .decompress_vec(&compressed_slice[..compressed_len])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let block = Arc::new(decompressed);
        let mut cache = self.block_cache.lock().expect("store cache poisoned");
        *cache = Some((block_idx, block.clone()));
        Ok(block)
    }

    /// Fetches the stored view of `doc`.
    pub fn get(&self, doc: DocId) -> io::Result<Document> {
        if doc >= self.num_docs {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("doc {} out of range (num_docs {})", doc, self.num_docs),
            ));
        }
        // last block whose first doc is <= doc
        let mut lo = 0usize;
        let mut hi = self.block_index.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.block_index[mid].0 <= doc {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let block_idx = lo - 1;
        let block = self.read_block(block_idx)?;
        let mut cursor: &[u8] = &block[..];
        let mut remaining_skips = doc - self.block_index[block_idx].0;
        loop {
            let doc_len = VInt::deserialize(&mut cursor)?.0 as usize;
            if remaining_skips == 0 {
                let mut doc_bytes = &cursor[..doc_len];
                return Document::deserialize(&mut doc_bytes);
            }
            cursor = &cursor[doc_len..];
            remaining_skips -= 1;
        }
    }
}
