use crate::common::VInt;
use crate::schema::PostingFormat;
use crate::DocId;
use smallvec::SmallVec;

/// In-memory postings of one term, as accumulated by the indexing pool.
///
/// Closed documents are packed into a single delta-encoded byte stream;
/// the occurrences of the document being indexed stay in small scratch
/// buffers until the next document (or the flush) closes it.
pub struct Recorder {
    format: PostingFormat,
    stream: Vec<u8>,
    last_doc: DocId,
    current_doc: Option<DocId>,
    current_positions: SmallVec<[u32; 4]>,
    current_characters: SmallVec<[(u32, u32); 4]>,
    current_boosts: SmallVec<[f32; 4]>,
    current_freq: u32,
    doc_freq: u32,
    total_freq: u64,
}

impl Recorder {
    pub fn new(format: PostingFormat) -> Recorder {
        Recorder {
            format,
            stream: Vec::new(),
            last_doc: 0,
            current_doc: None,
            current_positions: SmallVec::new(),
            current_characters: SmallVec::new(),
            current_boosts: SmallVec::new(),
            current_freq: 0,
            doc_freq: 0,
            total_freq: 0,
        }
    }

    /// Rebuilds a recorder from its spilled form.
    pub fn from_spilled(
        format: PostingFormat,
        stream: Vec<u8>,
        doc_freq: u32,
        total_freq: u64,
    ) -> Recorder {
        Recorder {
            format,
            stream,
            last_doc: 0,
            current_doc: None,
            current_positions: SmallVec::new(),
            current_characters: SmallVec::new(),
            current_boosts: SmallVec::new(),
            current_freq: 0,
            doc_freq,
            total_freq,
        }
    }

    pub fn format(&self) -> PostingFormat {
        self.format
    }

    pub fn doc_freq(&self) -> u32 {
        self.doc_freq
    }

    pub fn total_freq(&self) -> u64 {
        self.total_freq
    }

    /// Records one occurrence of the term.
    ///
    /// `doc` must be non-decreasing across calls.
    pub fn subscribe(
        &mut self,
        doc: DocId,
        position: u32,
        characters: Option<(u32, u32)>,
        boost: f32,
    ) {
        match self.current_doc {
            Some(current) if current == doc => {}
            Some(current) => {
                debug_assert!(current < doc);
                self.close_current_doc();
                self.current_doc = Some(doc);
            }
            None => {
                self.current_doc = Some(doc);
            }
        }
        self.current_freq += 1;
        self.total_freq += 1;
        if self.format.has_positions() {
            self.current_positions.push(position);
        }
        if self.format.has_characters() {
            self.current_characters.push(characters.unwrap_or((0, 0)));
        }
        if self.format.has_boosts() {
            self.current_boosts.push(boost);
        }
    }

    fn close_current_doc(&mut self) {
        let doc = match self.current_doc {
            Some(doc) => doc,
            None => return,
        };
        VInt(u64::from(doc - self.last_doc)).serialize_into_vec(&mut self.stream);
        VInt(u64::from(self.current_freq)).serialize_into_vec(&mut self.stream);
        if self.format.has_positions() {
            let mut previous = 0u32;
            for &position in &self.current_positions {
                VInt(u64::from(position - previous)).serialize_into_vec(&mut self.stream);
                previous = position;
            }
        }
        if self.format.has_characters() {
            let mut previous_start = 0u32;
            for &(start, end) in &self.current_characters {
                VInt(u64::from(start - previous_start)).serialize_into_vec(&mut self.stream);
                VInt(u64::from(end - start)).serialize_into_vec(&mut self.stream);
                previous_start = start;
            }
        }
        if self.format.has_boosts() {
            for &boost in &self.current_boosts {
                self.stream.extend_from_slice(&boost.to_bits().to_le_bytes());
            }
        }
        self.last_doc = doc;
        self.doc_freq += 1;
        self.current_doc = None;
        self.current_freq = 0;
        self.current_positions.clear();
        self.current_characters.clear();
        self.current_boosts.clear();
    }

    /// Closes the document being indexed, if any. Must be called before
    /// `stream()` or `for_each_doc`.
    pub fn finish_doc(&mut self) {
        self.close_current_doc();
    }

    pub fn stream(&self) -> &[u8] {
        debug_assert!(self.current_doc.is_none());
        &self.stream
    }

    /// Approximate heap footprint, for the writer's memory budget.
    pub fn mem_usage(&self) -> usize {
        self.stream.capacity()
            + self.current_positions.capacity() * 4
            + self.current_characters.capacity() * 8
            + self.current_boosts.capacity() * 4
            + std::mem::size_of::<Recorder>()
    }

    /// Replays the closed documents in order.
    pub fn for_each_doc<F>(&self, mut callback: F)
    where
        F: FnMut(DocId, u32, &[u32], &[(u32, u32)], &[f32]),
    {
        debug_assert!(self.current_doc.is_none());
        let mut cursor: &[u8] = &self.stream;
        let mut doc = 0u32;
        let mut positions: Vec<u32> = Vec::new();
        let mut characters: Vec<(u32, u32)> = Vec::new();
        let mut boosts: Vec<f32> = Vec::new();
        let mut read_vint = |cursor: &mut &[u8]| -> u64 {
            let (val, read) = VInt::deserialize_from_slice(cursor)
                .expect("corrupted recorder stream");
            *cursor = &cursor[read..];
            val
        };
        for _ in 0..self.doc_freq {
            doc += read_vint(&mut cursor) as u32;
            let freq = read_vint(&mut cursor) as u32;
            positions.clear();
            characters.clear();
            boosts.clear();
            if self.format.has_positions() {
                let mut position = 0u32;
                for _ in 0..freq {
                    position += read_vint(&mut cursor) as u32;
                    positions.push(position);
                }
            }
            if self.format.has_characters() {
                let mut start = 0u32;
                for _ in 0..freq {
                    start += read_vint(&mut cursor) as u32;
                    let len = read_vint(&mut cursor) as u32;
                    characters.push((start, start + len));
                }
            }
            if self.format.has_boosts() {
                for _ in 0..freq {
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(&cursor[..4]);
                    boosts.push(f32::from_bits(u32::from_le_bytes(bytes)));
                    cursor = &cursor[4..];
                }
            }
            callback(doc, freq, &positions, &characters, &boosts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_round_trip() {
        let format = PostingFormat::exists_only().with_positions();
        let mut recorder = Recorder::new(format);
        recorder.subscribe(0, 1, None, 1.0);
        recorder.subscribe(0, 4, None, 1.0);
        recorder.subscribe(3, 2, None, 1.0);
        recorder.finish_doc();
        assert_eq!(recorder.doc_freq(), 2);
        assert_eq!(recorder.total_freq(), 3);
        let mut replayed = Vec::new();
        recorder.for_each_doc(|doc, freq, positions, _, _| {
            replayed.push((doc, freq, positions.to_vec()));
        });
        assert_eq!(
            replayed,
            vec![(0, 2, vec![1, 4]), (3, 1, vec![2])]
        );
    }

    #[test]
    fn test_recorder_characters_and_boosts() {
        let format = PostingFormat::exists_only().with_characters().with_boosts();
        let mut recorder = Recorder::new(format);
        recorder.subscribe(5, 0, Some((0, 4)), 2.0);
        recorder.subscribe(5, 3, Some((10, 14)), 0.5);
        recorder.finish_doc();
        let mut replayed = Vec::new();
        recorder.for_each_doc(|doc, freq, positions, characters, boosts| {
            replayed.push((
                doc,
                freq,
                positions.to_vec(),
                characters.to_vec(),
                boosts.to_vec(),
            ));
        });
        assert_eq!(
            replayed,
            vec![(5, 2, vec![0, 3], vec![(0, 4), (10, 14)], vec![2.0, 0.5])]
        );
    }
}
