use crate::common::{BinarySerializable, BitSet};
use crate::storage::ReadOnlySource;
use crate::DocId;
use std::io;
use std::sync::Arc;

/// The live-docs bitmap of a segment: set bits are NOT deleted.
///
/// Cloning is cheap; the bitmap is shared by every matcher opened on
/// the segment.
#[derive(Clone)]
pub struct LiveDocs {
    bits: Arc<BitSet>,
    num_deleted: u32,
}

impl LiveDocs {
    pub fn open(source: &ReadOnlySource) -> io::Result<LiveDocs> {
        let bits = BitSet::deserialize(&mut source.as_slice())?;
        let num_deleted = bits.max_value() - bits.len() as u32;
        Ok(LiveDocs {
            bits: Arc::new(bits),
            num_deleted,
        })
    }

    pub fn from_bitset(bits: BitSet) -> LiveDocs {
        let num_deleted = bits.max_value() - bits.len() as u32;
        LiveDocs {
            bits: Arc::new(bits),
            num_deleted,
        }
    }

    #[inline]
    pub fn is_deleted(&self, doc: DocId) -> bool {
        !self.bits.contains(doc)
    }

    pub fn num_deleted(&self) -> u32 {
        self.num_deleted
    }

    pub fn num_live(&self) -> u32 {
        self.bits.len() as u32
    }

    pub(crate) fn bitset(&self) -> &BitSet {
        &self.bits
    }
}
