use crate::common::{BinarySerializable, CountingWriter, VInt};
use crate::postings::BLOCK_SIZE;
use crate::schema::PostingFormat;
use crate::storage::WritePtr;
use crate::termdict::{TermDictionaryBuilder, TermInfo};
use crate::DocId;
use std::io;
use std::io::Write;

/// Serializes the postings of one segment into the `.pst` file.
///
/// The expected call discipline is, for each term in increasing term
/// order:
///
/// * `new_term(format)`
/// * `write_doc(...)` for each document, in increasing doc id order
/// * `close_term() -> TermInfo`
///
/// and a final `close()`.
pub struct PostingsSerializer {
    write: CountingWriter<WritePtr>,
    format: PostingFormat,
    term_start_offset: u64,
    term_open: bool,
    doc_freq: u32,
    total_freq: u64,
    // current block
    doc_ids: Vec<DocId>,
    freqs: Vec<u32>,
    positions: Vec<u32>,
    characters: Vec<(u32, u32)>,
    boosts: Vec<f32>,
    block_buffer: Vec<u8>,
}

impl PostingsSerializer {
    pub fn wrap(write: WritePtr) -> PostingsSerializer {
        PostingsSerializer {
            write: CountingWriter::wrap(write),
            format: PostingFormat::exists_only(),
            term_start_offset: 0,
            term_open: false,
            doc_freq: 0,
            total_freq: 0,
            doc_ids: Vec::with_capacity(BLOCK_SIZE),
            freqs: Vec::with_capacity(BLOCK_SIZE),
            positions: Vec::new(),
            characters: Vec::new(),
            boosts: Vec::new(),
            block_buffer: Vec::new(),
        }
    }

    /// Starts the postings of a new term.
    pub fn new_term(&mut self, format: PostingFormat) {
        assert!(
            !self.term_open,
            "new_term called while the previous term was not closed"
        );
        self.term_open = true;
        self.format = format;
        self.term_start_offset = self.write.written_bytes();
        self.doc_freq = 0;
        self.total_freq = 0;
        self.clear_block();
    }

    fn clear_block(&mut self) {
        self.doc_ids.clear();
        self.freqs.clear();
        self.positions.clear();
        self.characters.clear();
        self.boosts.clear();
    }

    /// Registers that the current term appears in `doc`.
    ///
    /// `positions`, `characters` and `boosts` are only consulted when
    /// the field's posting format records them; they must then hold one
    /// entry per occurrence.
    pub fn write_doc(
        &mut self,
        doc: DocId,
        freq: u32,
        positions: &[u32],
        characters: &[(u32, u32)],
        boosts: &[f32],
    ) -> io::Result<()> {
        debug_assert!(self.term_open);
        debug_assert!(self
            .doc_ids
            .last()
            .map(|&last| last < doc)
            .unwrap_or(true));
        self.doc_ids.push(doc);
        self.doc_freq += 1;
        self.total_freq += u64::from(freq);
        if self.format.has_freqs() {
            self.freqs.push(freq);
        }
        if self.format.has_boosts() {
            debug_assert_eq!(boosts.len(), freq as usize);
            self.boosts.extend_from_slice(boosts);
        }
        if self.format.has_positions() {
            debug_assert_eq!(positions.len(), freq as usize);
            self.positions.extend_from_slice(positions);
        }
        if self.format.has_characters() {
            debug_assert_eq!(characters.len(), freq as usize);
            self.characters.extend_from_slice(characters);
        }
        if self.doc_ids.len() == BLOCK_SIZE {
            self.flush_block()?;
        }
        Ok(())
    }

    fn doc_weight(&self, idx: usize) -> f32 {
        if self.format.has_boosts() {
            let mut start = 0usize;
            for i in 0..idx {
                start += self.freqs[i] as usize;
            }
            let end = start + self.freqs[idx] as usize;
            self.boosts[start..end].iter().sum()
        } else if self.format.has_freqs() {
            self.freqs[idx] as f32
        } else {
            1.0
        }
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.doc_ids.is_empty() {
            return Ok(());
        }
        let doc_count = self.doc_ids.len();
        let min_doc = self.doc_ids[0];
        let max_doc = self.doc_ids[doc_count - 1];
        let max_weight = (0..doc_count)
            .map(|idx| self.doc_weight(idx))
            .fold(0.0f32, f32::max);

        // body
        self.block_buffer.clear();
        for i in 1..doc_count {
            VInt(u64::from(self.doc_ids[i] - self.doc_ids[i - 1]))
                .serialize_into_vec(&mut self.block_buffer);
        }
        if self.format.has_freqs() {
            for &freq in &self.freqs {
                VInt(u64::from(freq)).serialize_into_vec(&mut self.block_buffer);
            }
        }
        if self.format.has_boosts() {
            for &boost in &self.boosts {
                self.block_buffer.extend_from_slice(&boost.to_bits().to_le_bytes());
            }
        }
        if self.format.has_positions() {
            let mut occurrence = 0usize;
            for &freq in &self.freqs {
                let mut previous = 0u32;
                for _ in 0..freq {
                    let position = self.positions[occurrence];
                    VInt(u64::from(position - previous)).serialize_into_vec(&mut self.block_buffer);
                    previous = position;
                    occurrence += 1;
                }
            }
        }
        if self.format.has_characters() {
            let mut occurrence = 0usize;
            for &freq in &self.freqs {
                let mut previous_start = 0u32;
                for _ in 0..freq {
                    let (start, end) = self.characters[occurrence];
                    VInt(u64::from(start - previous_start))
                        .serialize_into_vec(&mut self.block_buffer);
                    VInt(u64::from(end - start)).serialize_into_vec(&mut self.block_buffer);
                    previous_start = start;
                    occurrence += 1;
                }
            }
        }

        // header
        VInt(doc_count as u64).serialize(&mut self.write)?;
        VInt(u64::from(min_doc)).serialize(&mut self.write)?;
        VInt(u64::from(max_doc - min_doc)).serialize(&mut self.write)?;
        max_weight.serialize(&mut self.write)?;
        self.format.flags().serialize(&mut self.write)?;
        VInt(self.block_buffer.len() as u64).serialize(&mut self.write)?;
        self.write.write_all(&self.block_buffer)?;

        self.clear_block();
        Ok(())
    }

    /// Closes the current term, returning its dictionary entry.
    pub fn close_term(&mut self) -> io::Result<TermInfo> {
        debug_assert!(self.term_open);
        self.flush_block()?;
        self.term_open = false;
        Ok(TermInfo {
            doc_freq: self.doc_freq,
            total_freq: self.total_freq,
            postings_offset: self.term_start_offset,
            postings_num_bytes: self.write.written_bytes() - self.term_start_offset,
        })
    }

    pub fn close(mut self) -> io::Result<()> {
        assert!(!self.term_open, "close called with an open term");
        let mut write = self.write.finish()?;
        write.flush()
    }
}

/// Couples the term dictionary builder and the postings serializer for
/// one segment: `.trm` and `.pst` are written together, one term at a
/// time, in increasing term order.
pub struct InvertedIndexSerializer {
    terms: TermDictionaryBuilder<WritePtr>,
    postings: PostingsSerializer,
}

impl InvertedIndexSerializer {
    pub fn new(terms_write: WritePtr, postings_write: WritePtr) -> InvertedIndexSerializer {
        InvertedIndexSerializer {
            terms: TermDictionaryBuilder::create(terms_write),
            postings: PostingsSerializer::wrap(postings_write),
        }
    }

    pub fn start_term(&mut self, format: PostingFormat) {
        self.postings.new_term(format);
    }

    pub fn write_doc(
        &mut self,
        doc: DocId,
        freq: u32,
        positions: &[u32],
        characters: &[(u32, u32)],
        boosts: &[f32],
    ) -> io::Result<()> {
        self.postings.write_doc(doc, freq, positions, characters, boosts)
    }

    /// Ends the current term, keyed by the full `(field, value)` bytes.
    pub fn end_term(&mut self, term_key: &[u8]) -> io::Result<TermInfo> {
        let term_info = self.postings.close_term()?;
        self.terms.insert(term_key, &term_info)?;
        Ok(term_info)
    }

    pub fn close(self) -> io::Result<()> {
        let mut terms_write = self.terms.finish()?;
        terms_write.flush()?;
        self.postings.close()
    }
}
