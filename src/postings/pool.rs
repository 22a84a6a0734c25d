use crate::common::{BinarySerializable, VInt};
use crate::postings::recorder::Recorder;
use crate::postings::serializer::InvertedIndexSerializer;
use crate::schema::{Field, PostingFormat, Term};
use crate::storage::{ReadOnlySource, WritePtr};
use crate::tokenizer::TokenStream;
use crate::DocId;
use fnv::FnvHashMap;
use std::io;
use std::io::Write;

/// Gap inserted between the token positions of consecutive values of a
/// multi-valued field, so that phrases cannot match across values.
const POSITION_GAP: u32 = 2;

/// The in-memory term -> postings map of a segment being built.
///
/// When the writer's memory budget overflows, the pool spills itself as
/// a sorted run; at flush time the spilled runs and the live map are
/// merged term by term into the segment serializer.
pub struct PostingsPool {
    terms: FnvHashMap<Term, Recorder>,
    mem_usage: usize,
}

impl Default for PostingsPool {
    fn default() -> PostingsPool {
        PostingsPool {
            terms: FnvHashMap::default(),
            mem_usage: 0,
        }
    }
}

impl PostingsPool {
    pub fn new() -> PostingsPool {
        PostingsPool::default()
    }

    /// Approximate heap usage of the pool.
    pub fn mem_usage(&self) -> usize {
        self.mem_usage
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Records one occurrence of `term` in `doc`.
    pub fn subscribe(
        &mut self,
        doc: DocId,
        term: &Term,
        format: PostingFormat,
        position: u32,
        characters: Option<(u32, u32)>,
        boost: f32,
    ) {
        if let Some(recorder) = self.terms.get_mut(term) {
            let before = recorder.mem_usage();
            recorder.subscribe(doc, position, characters, boost);
            self.mem_usage += recorder.mem_usage() - before;
        } else {
            let mut recorder = Recorder::new(format);
            recorder.subscribe(doc, position, characters, boost);
            self.mem_usage += recorder.mem_usage() + term.as_slice().len();
            self.terms.insert(term.clone(), recorder);
        }
    }

    /// Tokenizes and indexes one value of a text field; returns the
    /// number of tokens.
    ///
    /// `position_offset` carries the position of the end of the previous
    /// value of the same field in the same document.
    pub fn index_text(
        &mut self,
        doc: DocId,
        field: Field,
        format: PostingFormat,
        token_stream: &mut dyn TokenStream,
        position_offset: &mut u32,
    ) -> u32 {
        let mut term = Term::for_field(field);
        let mut num_tokens = 0u32;
        let mut last_position = *position_offset;
        while token_stream.advance() {
            let token = token_stream.token();
            term.set_text(&token.text);
            let position = *position_offset + token.position as u32;
            last_position = position;
            let characters = if format.has_characters() {
                Some((token.offset_from as u32, token.offset_to as u32))
            } else {
                None
            };
            self.subscribe(doc, &term, format, position, characters, token.boost);
            num_tokens += 1;
        }
        if num_tokens > 0 {
            *position_offset = last_position + POSITION_GAP;
        }
        num_tokens
    }

    /// Looks up the documents recorded for `term` so far. Used to apply
    /// deletions to the not-yet-flushed buffer.
    pub fn buffered_docs(&mut self, term: &Term) -> Vec<DocId> {
        match self.terms.get_mut(term) {
            Some(recorder) => {
                recorder.finish_doc();
                let mut docs = Vec::with_capacity(recorder.doc_freq() as usize);
                recorder.for_each_doc(|doc, _, _, _, _| docs.push(doc));
                docs
            }
            None => Vec::new(),
        }
    }

    /// Writes the pool as a sorted run and clears it.
    pub fn spill(&mut self, mut write: WritePtr) -> io::Result<()> {
        let mut entries: Vec<(Term, Recorder)> = self.terms.drain().collect();
        self.mem_usage = 0;
        entries.sort_by(|(left, _), (right, _)| left.as_slice().cmp(right.as_slice()));
        VInt(entries.len() as u64).serialize(&mut write)?;
        for (term, recorder) in entries.iter_mut() {
            recorder.finish_doc();
            VInt(term.as_slice().len() as u64).serialize(&mut write)?;
            write.write_all(term.as_slice())?;
            recorder.format().flags().serialize(&mut write)?;
            VInt(u64::from(recorder.doc_freq())).serialize(&mut write)?;
            VInt(recorder.total_freq()).serialize(&mut write)?;
            VInt(recorder.stream().len() as u64).serialize(&mut write)?;
            write.write_all(recorder.stream())?;
        }
        write.flush()
    }

    /// Merges the spilled runs and the live map into the serializer.
    ///
    /// Runs must be given oldest first: within one term, a run's
    /// documents all precede the next run's, and the live map comes
    /// last.
    pub fn serialize(
        mut self,
        runs: Vec<PoolReader>,
        serializer: &mut InvertedIndexSerializer,
    ) -> io::Result<()> {
        let mut entries: Vec<(Term, Recorder)> = self.terms.drain().collect();
        entries.sort_by(|(left, _), (right, _)| left.as_slice().cmp(right.as_slice()));
        for (_, recorder) in entries.iter_mut() {
            recorder.finish_doc();
        }

        // one source per run, plus the in-memory pool as the youngest
        let mut sources: Vec<PoolSource> = runs.into_iter().map(PoolSource::Run).collect();
        sources.push(PoolSource::Memory {
            entries: entries.into_iter(),
            current: None,
        });
        for source in sources.iter_mut() {
            source.advance();
        }

        loop {
            // find the smallest current term across sources
            let mut smallest: Option<Vec<u8>> = None;
            for source in sources.iter() {
                if let Some(key) = source.current_key() {
                    let is_smaller = smallest
                        .as_ref()
                        .map(|smallest_key| key < &smallest_key[..])
                        .unwrap_or(true);
                    if is_smaller {
                        smallest = Some(key.to_vec());
                    }
                }
            }
            let term_key = match smallest {
                Some(key) => key,
                None => break,
            };
            let mut format: Option<PostingFormat> = None;
            for source in sources.iter() {
                if source.current_key() == Some(&term_key[..]) {
                    format = source.current_format();
                    break;
                }
            }
            serializer.start_term(format.unwrap_or_else(PostingFormat::exists_only));
            // sources are ordered oldest to youngest: doc ids ascend
            for source in sources.iter_mut() {
                if source.current_key() == Some(&term_key[..]) {
                    source.replay_current(serializer)?;
                    source.advance();
                }
            }
            serializer.end_term(&term_key)?;
        }
        Ok(())
    }
}

/// One source of the flush merge: a spilled run or the live map.
enum PoolSource {
    Run(PoolReader),
    Memory {
        entries: std::vec::IntoIter<(Term, Recorder)>,
        current: Option<(Term, Recorder)>,
    },
}

impl PoolSource {
    fn advance(&mut self) {
        match self {
            PoolSource::Run(reader) => reader.advance(),
            PoolSource::Memory { entries, current } => {
                *current = entries.next();
            }
        }
    }

    fn current_key(&self) -> Option<&[u8]> {
        match self {
            PoolSource::Run(reader) => reader.current_key(),
            PoolSource::Memory { current, .. } => {
                current.as_ref().map(|(term, _)| term.as_slice())
            }
        }
    }

    fn current_format(&self) -> Option<PostingFormat> {
        match self {
            PoolSource::Run(reader) => reader.current_format(),
            PoolSource::Memory { current, .. } => {
                current.as_ref().map(|(_, recorder)| recorder.format())
            }
        }
    }

    fn replay_current(&mut self, serializer: &mut InvertedIndexSerializer) -> io::Result<()> {
        let recorder = match self {
            PoolSource::Run(reader) => reader.current_recorder(),
            PoolSource::Memory { current, .. } => match current {
                Some((_, recorder)) => recorder,
                None => return Ok(()),
            },
        };
        let mut result = Ok(());
        recorder.for_each_doc(|doc, freq, positions, characters, boosts| {
            if result.is_ok() {
                result = serializer.write_doc(doc, freq, positions, characters, boosts);
            }
        });
        result
    }
}

/// Sequential reader over a spilled run.
pub struct PoolReader {
    data: ReadOnlySource,
    cursor: usize,
    remaining: usize,
    current_key: Vec<u8>,
    current: Option<Recorder>,
}

impl PoolReader {
    pub fn open(data: ReadOnlySource) -> io::Result<PoolReader> {
        let (num_terms, header_len) = VInt::deserialize_from_slice(data.as_slice())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "truncated spill run header")
            })?;
        Ok(PoolReader {
            data,
            cursor: header_len,
            remaining: num_terms as usize,
            current_key: Vec::new(),
            current: None,
        })
    }

    fn advance(&mut self) {
        if self.remaining == 0 {
            self.current = None;
            return;
        }
        self.remaining -= 1;
        let slice = &self.data.as_slice()[self.cursor..];
        let mut offset = 0usize;
        let mut read_vint = |offset: &mut usize| -> u64 {
            let (val, read) = VInt::deserialize_from_slice(&slice[*offset..])
                .expect("corrupted spill run");
            *offset += read;
            val
        };
        let key_len = read_vint(&mut offset) as usize;
        self.current_key.clear();
        self.current_key.extend_from_slice(&slice[offset..offset + key_len]);
        offset += key_len;
        let flags = slice[offset];
        offset += 1;
        let doc_freq = read_vint(&mut offset) as u32;
        let total_freq = read_vint(&mut offset);
        let stream_len = read_vint(&mut offset) as usize;
        let stream = slice[offset..offset + stream_len].to_vec();
        offset += stream_len;
        self.cursor += offset;
        self.current = Some(Recorder::from_spilled(
            PostingFormat::from_flags(flags),
            stream,
            doc_freq,
            total_freq,
        ));
    }

    fn current_key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|_| &self.current_key[..])
    }

    fn current_format(&self) -> Option<PostingFormat> {
        self.current.as_ref().map(Recorder::format)
    }

    fn current_recorder(&self) -> &Recorder {
        self.current.as_ref().expect("no current run entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::storage::{RamStorage, Storage};
    use crate::termdict::TermDictionary;
    use std::path::Path;

    fn flush_pool(
        pool: PostingsPool,
        runs: Vec<PoolReader>,
        storage: &RamStorage,
    ) -> (TermDictionary, ReadOnlySource) {
        let trm_path = Path::new("seg.trm");
        let pst_path = Path::new("seg.pst");
        let mut serializer = InvertedIndexSerializer::new(
            storage.open_write(trm_path).unwrap(),
            storage.open_write(pst_path).unwrap(),
        );
        pool.serialize(runs, &mut serializer).unwrap();
        serializer.close().unwrap();
        let dict = TermDictionary::from_source(storage.open_read(trm_path).unwrap()).unwrap();
        let postings_data = storage.open_read(pst_path).unwrap();
        (dict, postings_data)
    }

    #[test]
    fn test_pool_flush_and_read_back() {
        use crate::postings::SegmentPostings;
        let storage = RamStorage::create();
        let mut pool = PostingsPool::new();
        let format = PostingFormat::exists_only().with_positions();
        let term_a = Term::from_field_text(Field(0), "apple");
        let term_b = Term::from_field_text(Field(0), "banana");
        pool.subscribe(0, &term_a, format, 0, None, 1.0);
        pool.subscribe(0, &term_b, format, 1, None, 1.0);
        pool.subscribe(2, &term_a, format, 4, None, 1.0);
        let (dict, postings_data) = flush_pool(pool, Vec::new(), &storage);

        assert_eq!(dict.num_terms(), 2);
        let info = dict.get(term_a.as_slice()).unwrap();
        assert_eq!(info.doc_freq, 2);
        let data = postings_data.slice(
            info.postings_offset as usize,
            (info.postings_offset + info.postings_num_bytes) as usize,
        );
        let mut postings = SegmentPostings::open(data, true, None, None, None);
        assert_eq!(postings.doc(), 0);
        assert_eq!(postings.positions(), &[0]);
        postings.advance();
        assert_eq!(postings.doc(), 2);
        assert_eq!(postings.positions(), &[4]);
        assert!(!postings.advance());
    }

    #[test]
    fn test_pool_spill_and_merge() {
        let storage = RamStorage::create();
        let format = PostingFormat::exists_only().with_freqs();
        let term = Term::from_field_text(Field(0), "tree");
        let other = Term::from_field_text(Field(0), "shrub");

        let mut pool = PostingsPool::new();
        pool.subscribe(0, &term, format, 0, None, 1.0);
        pool.subscribe(1, &other, format, 0, None, 1.0);
        let run_path = Path::new("run0");
        pool.spill(storage.open_write(run_path).unwrap()).unwrap();
        assert_eq!(pool.num_terms(), 0);

        pool.subscribe(5, &term, format, 0, None, 1.0);
        let run = PoolReader::open(storage.open_read(run_path).unwrap()).unwrap();
        let (dict, postings_data) = flush_pool(pool, vec![run], &storage);

        assert_eq!(dict.num_terms(), 2);
        let info = dict.get(term.as_slice()).unwrap();
        assert_eq!(info.doc_freq, 2);
        let data = postings_data.slice(
            info.postings_offset as usize,
            (info.postings_offset + info.postings_num_bytes) as usize,
        );
        use crate::postings::SegmentPostings;
        let mut postings = SegmentPostings::open(data, false, None, None, None);
        assert_eq!(postings.doc(), 0);
        postings.advance();
        assert_eq!(postings.doc(), 5);
        assert!(!postings.advance());
    }

    #[test]
    fn test_pool_mem_usage_grows() {
        let mut pool = PostingsPool::new();
        let format = PostingFormat::exists_only();
        assert_eq!(pool.mem_usage(), 0);
        for i in 0..100 {
            let term = Term::from_field_text(Field(0), &format!("term{}", i));
            pool.subscribe(0, &term, format, 0, None, 1.0);
        }
        assert!(pool.mem_usage() > 100 * std::mem::size_of::<Recorder>());
    }
}
