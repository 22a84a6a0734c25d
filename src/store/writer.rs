use super::BLOCK_SIZE;
use crate::common::{BinarySerializable, CountingWriter, VInt};
use crate::schema::Document;
use crate::storage::WritePtr;
use crate::DocId;
use std::io;
use std::io::Write;

/// Writes the stored documents of one segment, in doc id order.
pub struct StoreWriter {
    write: CountingWriter<WritePtr>,
    block_buffer: Vec<u8>,
    doc_buffer: Vec<u8>,
    first_doc_in_block: DocId,
    num_docs: DocId,
    block_index: Vec<(DocId, u64)>,
}

impl StoreWriter {
    pub fn wrap(write: WritePtr) -> StoreWriter {
        StoreWriter {
            write: CountingWriter::wrap(write),
            block_buffer: Vec::with_capacity(BLOCK_SIZE),
            doc_buffer: Vec::new(),
            first_doc_in_block: 0,
            num_docs: 0,
            block_index: Vec::new(),
        }
    }

    /// Appends the stored view of the next document.
    pub fn store(&mut self, doc: &Document) -> io::Result<()> {
        self.doc_buffer.clear();
        doc.serialize(&mut self.doc_buffer)?;
        VInt(self.doc_buffer.len() as u64).serialize_into_vec(&mut self.block_buffer);
        self.block_buffer.extend_from_slice(&self.doc_buffer);
        self.num_docs += 1;
        if self.block_buffer.len() >= BLOCK_SIZE {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.block_buffer.is_empty() {
            return Ok(());
        }
        let compressed = snap::Encoder::new()
            .compress_vec(&self.block_buffer)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        self.block_index
            .push((self.first_doc_in_block, self.write.written_bytes()));
        VInt(compressed.len() as u64).serialize(&mut self.write)?;
        self.write.write_all(&compressed)?;
        self.block_buffer.clear();
        self.first_doc_in_block = self.num_docs;
        Ok(())
    }

    /// Flushes the last block and writes the block index.
    pub fn close(mut self) -> io::Result<()> {
        self.flush_block()?;
        let index_offset = self.write.written_bytes();
        VInt(self.block_index.len() as u64).serialize(&mut self.write)?;
        for &(first_doc, offset) in &self.block_index {
            VInt(u64::from(first_doc)).serialize(&mut self.write)?;
            VInt(offset).serialize(&mut self.write)?;
        }
        self.num_docs.serialize(&mut self.write)?;
        index_offset.serialize(&mut self.write)?;
        let mut write = self.write.finish()?;
        write.flush()
    }
}
