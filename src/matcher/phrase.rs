use super::Matcher;
use crate::postings::SegmentPostings;
use crate::schema::Term;
use crate::vector::VectorReader;
use crate::DocId;
use crate::Score;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Counts the phrase occurrences given one ascending position list per
/// phrase term.
///
/// A chain of positions `p_0 < p_1 < ... < p_{n-1}` counts when every
/// adjacent pair satisfies `0 < p_{i+1} - p_i <= slop + 1`: the slop
/// allowance applies per pair, not as one shared budget, and 0 means
/// strict adjacency. Continuations are taken greedily (the smallest
/// admissible position at each step).
fn count_phrase_matches(position_lists: &[&[u32]], slop: u32) -> u32 {
    let mut count = 0u32;
    'starts: for &start in position_lists[0] {
        let mut previous = start;
        for positions in &position_lists[1..] {
            // smallest continuation after `previous` within reach
            let next = positions
                .iter()
                .cloned()
                .find(|&position| position > previous && position - previous <= slop + 1);
            match next {
                Some(position) => previous = position,
                None => continue 'starts,
            }
        }
        count += 1;
    }
    count
}

/// Positional phrase matcher: intersects the phrase terms' postings and
/// verifies adjacency against their position lists.
pub struct PhraseMatcher {
    children: Vec<SegmentPostings>,
    slop: u32,
    phrase_freq: u32,
    active: bool,
}

impl PhraseMatcher {
    pub fn new(children: Vec<SegmentPostings>, slop: u32) -> PhraseMatcher {
        assert!(children.len() >= 2);
        let mut matcher = PhraseMatcher {
            active: children.iter().all(Matcher::is_active),
            children,
            slop,
            phrase_freq: 0,
        };
        matcher.align_and_verify(true);
        matcher
    }

    /// Aligns all children on one document (leapfrog), then checks the
    /// positions; advances until a true phrase match is found.
    fn align_and_verify(&mut self, include_current: bool) {
        if !self.active {
            return;
        }
        let mut first_pass = include_current;
        loop {
            if !first_pass && !self.children[0].advance() {
                self.active = false;
                return;
            }
            first_pass = false;
            // leapfrog intersection on documents
            let mut candidate = self
                .children
                .iter()
                .map(|child| child.doc())
                .max()
                .expect("at least two children");
            'align: loop {
                for child in self.children.iter_mut() {
                    if !child.is_active() {
                        self.active = false;
                        return;
                    }
                    if child.doc() < candidate {
                        if !child.skip_to(candidate) {
                            self.active = false;
                            return;
                        }
                        if child.doc() > candidate {
                            candidate = child.doc();
                            continue 'align;
                        }
                    }
                }
                break;
            }
            let position_lists: SmallVec<[&[u32]; 4]> = self
                .children
                .iter()
                .map(|child| child.positions())
                .collect();
            let freq = count_phrase_matches(&position_lists, self.slop);
            if freq > 0 {
                self.phrase_freq = freq;
                return;
            }
        }
    }
}

impl Matcher for PhraseMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.active);
        self.children[0].doc()
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.align_and_verify(false);
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        if self.doc() >= target {
            return true;
        }
        if !self.children[0].skip_to(target) {
            self.active = false;
            return false;
        }
        self.align_and_verify(true);
        self.active
    }

    fn weight(&self) -> f32 {
        self.phrase_freq as f32
    }

    fn score(&mut self) -> Score {
        self.children.iter_mut().map(|child| child.score()).sum()
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        for child in &self.children {
            child.matching_terms(doc, terms);
        }
    }
}

/// Phrase matcher for fields whose postings do not carry positions but
/// which store forward vectors: the doc stream is the intersection of
/// the terms' postings, and positions are fetched from the per-document
/// vector.
pub struct VectorPhraseMatcher {
    children: Vec<SegmentPostings>,
    term_bytes: Vec<Vec<u8>>,
    vectors: VectorReader,
    slop: u32,
    phrase_freq: u32,
    active: bool,
}

impl VectorPhraseMatcher {
    pub fn new(
        children: Vec<SegmentPostings>,
        term_bytes: Vec<Vec<u8>>,
        vectors: VectorReader,
        slop: u32,
    ) -> VectorPhraseMatcher {
        assert_eq!(children.len(), term_bytes.len());
        assert!(children.len() >= 2);
        let mut matcher = VectorPhraseMatcher {
            active: children.iter().all(Matcher::is_active),
            children,
            term_bytes,
            vectors,
            slop,
            phrase_freq: 0,
        };
        matcher.align_and_verify(true);
        matcher
    }

    fn verify_current(&mut self) -> u32 {
        let doc = self.children[0].doc();
        let vector = self.vectors.vector(doc);
        let mut position_lists: Vec<&[u32]> = Vec::with_capacity(self.term_bytes.len());
        for term in &self.term_bytes {
            match vector
                .iter()
                .find(|(entry_term, _)| entry_term == term)
            {
                Some((_, positions)) => position_lists.push(positions),
                None => return 0,
            }
        }
        count_phrase_matches(&position_lists, self.slop)
    }

    fn align_and_verify(&mut self, include_current: bool) {
        if !self.active {
            return;
        }
        let mut first_pass = include_current;
        loop {
            if !first_pass && !self.children[0].advance() {
                self.active = false;
                return;
            }
            first_pass = false;
            let mut candidate = self
                .children
                .iter()
                .map(|child| child.doc())
                .max()
                .expect("at least two children");
            'align: loop {
                for child in self.children.iter_mut() {
                    if child.doc() < candidate {
                        if !child.skip_to(candidate) {
                            self.active = false;
                            return;
                        }
                        if child.doc() > candidate {
                            candidate = child.doc();
                            continue 'align;
                        }
                    }
                }
                break;
            }
            let freq = self.verify_current();
            if freq > 0 {
                self.phrase_freq = freq;
                return;
            }
        }
    }
}

impl Matcher for VectorPhraseMatcher {
    fn is_active(&self) -> bool {
        self.active
    }

    fn doc(&self) -> DocId {
        debug_assert!(self.active);
        self.children[0].doc()
    }

    fn advance(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.align_and_verify(false);
        self.active
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.active {
            return false;
        }
        if self.doc() >= target {
            return true;
        }
        if !self.children[0].skip_to(target) {
            self.active = false;
            return false;
        }
        self.align_and_verify(true);
        self.active
    }

    fn weight(&self) -> f32 {
        self.phrase_freq as f32
    }

    fn score(&mut self) -> Score {
        self.children.iter_mut().map(|child| child.score()).sum()
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        for child in &self.children {
            child.matching_terms(doc, terms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::count_phrase_matches;

    #[test]
    fn test_phrase_positions_exact() {
        // "little lamb" in "mary had a little lamb"
        assert_eq!(count_phrase_matches(&[&[3], &[4]], 0), 1);
        // "mary lamb" is not adjacent
        assert_eq!(count_phrase_matches(&[&[0], &[4]], 0), 0);
    }

    #[test]
    fn test_phrase_slop_boundary() {
        // matches iff 0 < pb - pa <= slop + 1
        assert_eq!(count_phrase_matches(&[&[0], &[4]], 1), 0);
        assert_eq!(count_phrase_matches(&[&[0], &[4]], 3), 1);
        assert_eq!(count_phrase_matches(&[&[0], &[4]], 4), 1);
    }

    #[test]
    fn test_phrase_three_terms() {
        // positions: a at 0, b at 1, c at 2 -> exact chain
        assert_eq!(count_phrase_matches(&[&[0], &[1], &[2]], 0), 1);
        // c too far for slop 0, fine for slop 1
        assert_eq!(count_phrase_matches(&[&[0], &[1], &[3]], 0), 0);
        assert_eq!(count_phrase_matches(&[&[0], &[1], &[3]], 1), 1);
    }

    #[test]
    fn test_phrase_multiple_occurrences() {
        // "a b a b"
        assert_eq!(count_phrase_matches(&[&[0, 2], &[1, 3]], 0), 2);
    }
}
