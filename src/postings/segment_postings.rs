use crate::common::{BinarySerializable, VInt};
use crate::core::LiveDocs;
use crate::matcher::Matcher;
use crate::schema::{PostingFormat, Term};
use crate::scoring::Scorer;
use crate::storage::ReadOnlySource;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// Decoded view of one postings block, plus the cursor walking the
/// block sequence of a term.
pub struct BlockCursor {
    data: ReadOnlySource,
    cursor: usize,
    need_positions: bool,
    // decoded block
    docs: Vec<DocId>,
    freqs: Vec<u32>,
    weights: Vec<f32>,
    boosts: Vec<f32>,
    positions: Vec<u32>,
    characters: Vec<(u32, u32)>,
    occurrence_offsets: Vec<usize>,
    max_doc: DocId,
    block_max_weight: f32,
    exhausted: bool,
}

struct BlockHeader {
    doc_count: usize,
    min_doc: DocId,
    max_doc: DocId,
    max_weight: f32,
    format: PostingFormat,
    body_len: usize,
}

impl BlockCursor {
    /// Opens a cursor over the postings bytes of one term. The cursor
    /// starts before the first block.
    pub fn open(data: ReadOnlySource, need_positions: bool) -> BlockCursor {
        BlockCursor {
            data,
            cursor: 0,
            need_positions,
            docs: Vec::new(),
            freqs: Vec::new(),
            weights: Vec::new(),
            boosts: Vec::new(),
            positions: Vec::new(),
            characters: Vec::new(),
            occurrence_offsets: Vec::new(),
            max_doc: 0,
            block_max_weight: 0.0,
            exhausted: false,
        }
    }

    pub fn empty() -> BlockCursor {
        let mut cursor = BlockCursor::open(ReadOnlySource::empty(), false);
        cursor.exhausted = true;
        cursor
    }

    fn read_header(&mut self) -> Option<BlockHeader> {
        if self.cursor >= self.data.len() {
            return None;
        }
        let slice = &self.data.as_slice()[self.cursor..];
        let mut offset = 0usize;
        let mut read_vint = |offset: &mut usize| -> Option<u64> {
            let (val, num_bytes) = VInt::deserialize_from_slice(&slice[*offset..])?;
            *offset += num_bytes;
            Some(val)
        };
        let doc_count = read_vint(&mut offset)? as usize;
        let min_doc = read_vint(&mut offset)? as DocId;
        let doc_span = read_vint(&mut offset)? as DocId;
        let max_weight = {
            let mut bytes = &slice[offset..];
            let val = f32::deserialize(&mut bytes).ok()?;
            offset += 4;
            val
        };
        let flags = *slice.get(offset)?;
        offset += 1;
        let body_len = read_vint(&mut offset)? as usize;
        self.cursor += offset;
        Some(BlockHeader {
            doc_count,
            min_doc,
            max_doc: min_doc + doc_span,
            max_weight,
            format: PostingFormat::from_flags(flags),
            body_len,
        })
    }

    fn decode_body(&mut self, header: &BlockHeader) -> bool {
        let body_end = self.cursor + header.body_len;
        if body_end > self.data.len() {
            return false;
        }
        let body = &self.data.as_slice()[self.cursor..body_end];
        let mut offset = 0usize;
        let mut read_vint = |offset: &mut usize| -> Option<u64> {
            let (val, num_bytes) = VInt::deserialize_from_slice(&body[*offset..])?;
            *offset += num_bytes;
            Some(val)
        };

        self.docs.clear();
        self.docs.push(header.min_doc);
        let mut doc = header.min_doc;
        for _ in 1..header.doc_count {
            doc += match read_vint(&mut offset) {
                Some(delta) => delta as DocId,
                None => return false,
            };
            self.docs.push(doc);
        }

        self.freqs.clear();
        if header.format.has_freqs() {
            for _ in 0..header.doc_count {
                match read_vint(&mut offset) {
                    Some(freq) => self.freqs.push(freq as u32),
                    None => return false,
                }
            }
        }

        self.weights.clear();
        self.boosts.clear();
        let mut boost_weights: Vec<f32> = Vec::new();
        if header.format.has_boosts() {
            let num_occurrences: usize = self.freqs.iter().map(|&freq| freq as usize).sum();
            for _ in 0..num_occurrences {
                if offset + 4 > body.len() {
                    return false;
                }
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&body[offset..offset + 4]);
                self.boosts.push(f32::from_bits(u32::from_le_bytes(bytes)));
                offset += 4;
            }
            let mut occurrence = 0usize;
            for &freq in &self.freqs {
                let end = occurrence + freq as usize;
                boost_weights.push(self.boosts[occurrence..end].iter().sum());
                occurrence = end;
            }
        }
        for idx in 0..header.doc_count {
            let weight = if header.format.has_boosts() {
                boost_weights[idx]
            } else if header.format.has_freqs() {
                self.freqs[idx] as f32
            } else {
                1.0
            };
            self.weights.push(weight);
        }

        self.positions.clear();
        self.characters.clear();
        self.occurrence_offsets.clear();
        if header.format.has_positions() && self.need_positions {
            let mut occurrence_offset = 0usize;
            for &freq in &self.freqs {
                self.occurrence_offsets.push(occurrence_offset);
                let mut position = 0u32;
                for _ in 0..freq {
                    position += match read_vint(&mut offset) {
                        Some(delta) => delta as u32,
                        None => return false,
                    };
                    self.positions.push(position);
                }
                occurrence_offset += freq as usize;
            }
            self.occurrence_offsets.push(occurrence_offset);
            if header.format.has_characters() {
                for &freq in &self.freqs {
                    let mut start = 0u32;
                    for _ in 0..freq {
                        start += match read_vint(&mut offset) {
                            Some(delta) => delta as u32,
                            None => return false,
                        };
                        let len = match read_vint(&mut offset) {
                            Some(len) => len as u32,
                            None => return false,
                        };
                        self.characters.push((start, start + len));
                    }
                }
            }
        }

        self.cursor = body_end;
        self.max_doc = header.max_doc;
        self.block_max_weight = header.max_weight;
        true
    }

    /// Decodes the next block; returns false at the end of the stream.
    pub fn advance_block(&mut self) -> bool {
        self.advance_block_filtered(|_| true)
    }

    /// Decodes the next block whose max weight satisfies `keep`,
    /// skipping the bodies of rejected blocks.
    pub fn advance_block_filtered<F: Fn(f32) -> bool>(&mut self, keep: F) -> bool {
        loop {
            let header = match self.read_header() {
                Some(header) => header,
                None => {
                    self.exhausted = true;
                    return false;
                }
            };
            if keep(header.max_weight) {
                if self.decode_body(&header) {
                    return true;
                }
                self.exhausted = true;
                return false;
            }
            self.cursor += header.body_len;
        }
    }

    /// Advances blocks until the loaded block's `max_doc >= target`,
    /// skipping the bodies of blocks entirely below the target.
    pub fn skip_to_block(&mut self, target: DocId) -> bool {
        if !self.exhausted && !self.docs.is_empty() && self.max_doc >= target {
            return true;
        }
        loop {
            let header = match self.read_header() {
                Some(header) => header,
                None => {
                    self.exhausted = true;
                    return false;
                }
            };
            if header.max_doc >= target {
                if self.decode_body(&header) {
                    return true;
                }
                self.exhausted = true;
                return false;
            }
            self.cursor += header.body_len;
        }
    }

    pub fn docs(&self) -> &[DocId] {
        &self.docs
    }

    /// Max document id of the loaded block.
    pub fn max_doc(&self) -> DocId {
        self.max_doc
    }

    pub fn block_len(&self) -> usize {
        self.docs.len()
    }

    pub fn weight(&self, idx: usize) -> f32 {
        self.weights[idx]
    }

    pub fn freq(&self, idx: usize) -> u32 {
        self.freqs.get(idx).cloned().unwrap_or(1)
    }

    pub fn block_max_weight(&self) -> f32 {
        self.block_max_weight
    }

    /// The positions of the occurrences in the `idx`-th document of the
    /// block. Empty unless the cursor was opened with
    /// `need_positions` on a position-bearing field.
    pub fn positions(&self, idx: usize) -> &[u32] {
        if self.occurrence_offsets.len() <= idx + 1 {
            return &[];
        }
        &self.positions[self.occurrence_offsets[idx]..self.occurrence_offsets[idx + 1]]
    }

    /// Per-occurrence boosts of the `idx`-th document, when the format
    /// records them.
    pub fn boosts(&self, idx: usize) -> &[f32] {
        if self.boosts.is_empty() {
            return &[];
        }
        let start: usize = self.freqs[..idx].iter().map(|&freq| freq as usize).sum();
        let end = start + self.freqs[idx] as usize;
        &self.boosts[start..end]
    }

    /// Character ranges, parallel to [`BlockCursor::positions`].
    pub fn characters(&self, idx: usize) -> &[(u32, u32)] {
        if self.occurrence_offsets.len() <= idx + 1 || self.characters.is_empty() {
            return &[];
        }
        &self.characters[self.occurrence_offsets[idx]..self.occurrence_offsets[idx + 1]]
    }
}

/// Leaf matcher: the postings of one term within one segment.
pub struct SegmentPostings {
    block: BlockCursor,
    idx: usize,
    live_docs: Option<LiveDocs>,
    scorer: Option<Box<dyn Scorer>>,
    term: Option<Term>,
    active: bool,
}

impl SegmentPostings {
    /// Opens the postings and positions the matcher on its first live
    /// document.
    pub fn open(
        data: ReadOnlySource,
        need_positions: bool,
        live_docs: Option<LiveDocs>,
        scorer: Option<Box<dyn Scorer>>,
        term: Option<Term>,
    ) -> SegmentPostings {
        let mut postings = SegmentPostings {
            block: BlockCursor::open(data, need_positions),
            idx: 0,
            live_docs,
            scorer,
            term,
            active: true,
        };
        postings.active = postings.block.advance_block();
        postings.skip_deleted();
        postings
    }

    pub fn empty() -> SegmentPostings {
        SegmentPostings {
            block: BlockCursor::empty(),
            idx: 0,
            live_docs: None,
            scorer: None,
            term: None,
            active: false,
        }
    }

    fn skip_deleted(&mut self) {
        if self.live_docs.is_none() {
            return;
        }
        while self.active {
            let doc = self.block.docs()[self.idx];
            let deleted = self
                .live_docs
                .as_ref()
                .map(|live| live.is_deleted(doc))
                .unwrap_or(false);
            if !deleted {
                return;
            }
            self.advance_raw();
        }
    }

    fn advance_raw(&mut self) -> bool {
        self.idx += 1;
        if self.idx >= self.block.block_len() {
            self.idx = 0;
            self.active = self.block.advance_block();
        }
        self.active
    }

    /// Term frequency at the current document.
    pub fn term_freq(&self) -> u32 {
        self.block.freq(self.idx)
    }

    /// Positions of the term in the current document.
    pub fn positions(&self) -> &[u32] {
        self.block.positions(self.idx)
    }

    /// Character offsets of the term in the current document.
    pub fn characters(&self) -> &[(u32, u32)] {
        self.block.characters(self.idx)
    }

    /// Per-occurrence boosts of the term in the current document.
    pub fn boosts(&self) -> &[f32] {
        self.block.boosts(self.idx)
    }
}

impl Matcher for SegmentPostings {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.active);
        self.block.docs()[self.idx]
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.advance_raw();
        self.skip_deleted();
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        if self.doc() >= target {
            return true;
        }
        if self.block.max_doc() < target {
            if !self.block.skip_to_block(target) {
                self.active = false;
                return false;
            }
            self.idx = 0;
        }
        // the loaded block contains the answer: exponential search
        // followed by a binary search, starting from the current
        // in-block position.
        let docs = self.block.docs();
        let mut start = self.idx;
        if docs[start] < target {
            let mut step = 1usize;
            let mut end = start;
            loop {
                let probe = end + step;
                if probe < docs.len() && docs[probe] < target {
                    end = probe;
                    step *= 2;
                } else {
                    break;
                }
            }
            let mut lo = end;
            let mut hi = (end + step + 1).min(docs.len());
            while lo < hi {
                let mid = (lo + hi) / 2;
                if docs[mid] < target {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            start = lo;
        }
        debug_assert!(start < docs.len());
        self.idx = start;
        self.skip_deleted();
        self.active
    }

    fn weight(&self) -> f32 {
        self.block.weight(self.idx)
    }

    fn score(&mut self) -> Score {
        let weight = self.block.weight(self.idx);
        match self.scorer {
            Some(ref scorer) => scorer.score(self.doc(), weight),
            None => weight,
        }
    }

    fn supports_block_quality(&self) -> bool {
        self.scorer
            .as_ref()
            .map(|scorer| scorer.supports_block_quality())
            .unwrap_or(false)
    }

    fn block_max_score(&mut self) -> Score {
        match self.scorer {
            Some(ref scorer) if scorer.supports_block_quality() => {
                scorer.max_score(self.block.block_max_weight())
            }
            _ => std::f32::INFINITY,
        }
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        if !self.advance() {
            return false;
        }
        if !self.supports_block_quality() {
            return true;
        }
        while self.active && self.block_max_score() <= threshold {
            // the remainder of this block cannot make the cut; jump to
            // the next block whose bound clears the threshold.
            let scorer = self.scorer.as_ref().expect("block quality without scorer");
            self.active = self
                .block
                .advance_block_filtered(|max_weight| scorer.max_score(max_weight) > threshold);
            self.idx = 0;
            if self.active {
                self.skip_deleted();
            }
        }
        self.active
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        if let Some(ref term) = self.term {
            if self.active && self.doc() == doc {
                terms.insert(term.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::serializer::PostingsSerializer;
    use crate::postings::BLOCK_SIZE;
    use crate::storage::{RamStorage, Storage};
    use std::path::Path;

    fn write_postings(
        format: PostingFormat,
        docs: &[(DocId, u32, Vec<u32>)],
    ) -> ReadOnlySource {
        let storage = RamStorage::create();
        let path = Path::new("test.pst");
        {
            let write = storage.open_write(path).unwrap();
            let mut serializer = PostingsSerializer::wrap(write);
            serializer.new_term(format);
            for (doc, freq, positions) in docs {
                serializer
                    .write_doc(*doc, *freq, positions, &[], &[])
                    .unwrap();
            }
            serializer.close_term().unwrap();
            serializer.close().unwrap();
        }
        storage.open_read(path).unwrap()
    }

    #[test]
    fn test_exists_only_round_trip() {
        let docs: Vec<(DocId, u32, Vec<u32>)> =
            (0..300).map(|i| (i * 2, 1, Vec::new())).collect();
        let source = write_postings(PostingFormat::exists_only(), &docs);
        let mut postings = SegmentPostings::open(source, false, None, None, None);
        let mut collected = Vec::new();
        while postings.is_active() {
            collected.push(postings.doc());
            postings.advance();
        }
        let expected: Vec<DocId> = (0..300).map(|i| i * 2).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_freqs_and_positions_round_trip() {
        let format = PostingFormat::exists_only().with_positions();
        let docs = vec![
            (1u32, 3u32, vec![0u32, 5, 9]),
            (5, 1, vec![2]),
            (8, 2, vec![1, 4]),
        ];
        let source = write_postings(format, &docs);
        let mut postings = SegmentPostings::open(source, true, None, None, None);
        assert!(postings.is_active());
        assert_eq!(postings.doc(), 1);
        assert_eq!(postings.term_freq(), 3);
        assert_eq!(postings.positions(), &[0, 5, 9]);
        assert_eq!(postings.weight(), 3.0);
        postings.advance();
        assert_eq!(postings.doc(), 5);
        assert_eq!(postings.positions(), &[2]);
        postings.advance();
        assert_eq!(postings.doc(), 8);
        assert_eq!(postings.positions(), &[1, 4]);
        assert!(!postings.advance());
    }

    #[test]
    fn test_skip_to_across_blocks() {
        let docs: Vec<(DocId, u32, Vec<u32>)> =
            (0..1000).map(|i| (i * 3, 1, Vec::new())).collect();
        let source = write_postings(PostingFormat::exists_only(), &docs);
        let mut postings = SegmentPostings::open(source, false, None, None, None);
        assert!(postings.skip_to(7));
        assert_eq!(postings.doc(), 9);
        assert!(postings.skip_to(9));
        assert_eq!(postings.doc(), 9);
        assert!(postings.skip_to(2000));
        assert_eq!(postings.doc(), 2001);
        assert!(postings.skip_to(2997));
        assert_eq!(postings.doc(), 2997);
        assert!(!postings.skip_to(3000));
        assert!(!postings.is_active());
    }

    #[test]
    fn test_block_boundaries() {
        let num_docs = BLOCK_SIZE as u32 * 2 + 1;
        let docs: Vec<(DocId, u32, Vec<u32>)> =
            (0..num_docs).map(|i| (i, 1, Vec::new())).collect();
        let source = write_postings(PostingFormat::exists_only(), &docs);
        let mut postings = SegmentPostings::open(source, false, None, None, None);
        let mut count = 0u32;
        while postings.is_active() {
            assert_eq!(postings.doc(), count);
            count += 1;
            postings.advance();
        }
        assert_eq!(count, num_docs);
    }

    #[test]
    fn test_live_docs_filtering() {
        use crate::common::BitSet;
        let docs: Vec<(DocId, u32, Vec<u32>)> =
            (0..10).map(|i| (i, 1, Vec::new())).collect();
        let source = write_postings(PostingFormat::exists_only(), &docs);
        let mut live = BitSet::full(10);
        live.remove(0);
        live.remove(4);
        live.remove(9);
        let live_docs = LiveDocs::from_bitset(live);
        let mut postings =
            SegmentPostings::open(source, false, Some(live_docs), None, None);
        let mut collected = Vec::new();
        while postings.is_active() {
            collected.push(postings.doc());
            postings.advance();
        }
        assert_eq!(collected, vec![1, 2, 3, 5, 6, 7, 8]);
    }
}
