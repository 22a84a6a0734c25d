use crate::common::{BinarySerializable, VInt};
use std::io;
use std::io::{Read, Write};

/// Per-term entry of the term dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermInfo {
    /// Number of documents containing the term in the segment.
    pub doc_freq: u32,
    /// Sum of the term's occurrences over those documents.
    pub total_freq: u64,
    /// Byte offset of the postings in the postings file.
    pub postings_offset: u64,
    /// Byte length of the postings.
    pub postings_num_bytes: u64,
}

impl BinarySerializable for TermInfo {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        VInt(u64::from(self.doc_freq)).serialize(writer)?;
        VInt(self.total_freq).serialize(writer)?;
        VInt(self.postings_offset).serialize(writer)?;
        VInt(self.postings_num_bytes).serialize(writer)
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<TermInfo> {
        let doc_freq = VInt::deserialize(reader)?.0 as u32;
        let total_freq = VInt::deserialize(reader)?.0;
        let postings_offset = VInt::deserialize(reader)?.0;
        let postings_num_bytes = VInt::deserialize(reader)?.0;
        Ok(TermInfo {
            doc_freq,
            total_freq,
            postings_offset,
            postings_num_bytes,
        })
    }
}
