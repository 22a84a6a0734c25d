//! Streaming iterators over matching documents.
//!
//! A [`Matcher`] walks ascending document ids. The leaf matchers are the
//! postings readers; the combinators in this module mirror the query
//! algebra (intersection, union, and-not, and-maybe, phrase, nested...).
//!
//! Block-max pruning: `block_max_score` bounds the score any document up
//! to the end of the current block can reach, and `skip_to_quality`
//! jumps over blocks whose bound cannot beat a collector's threshold.

mod and_maybe;
mod every;
mod exclusion;
mod filter;
mod intersection;
mod inverse;
mod nested;
mod phrase;
mod rebase;
mod require;
mod union;

pub use self::and_maybe::AndMaybeMatcher;
pub use self::every::EveryMatcher;
pub use self::exclusion::ExclusionMatcher;
pub use self::filter::FilterMatcher;
pub use self::intersection::IntersectionMatcher;
pub use self::inverse::InverseMatcher;
pub use self::nested::{NestedChildrenMatcher, NestedParentMatcher};
pub use self::phrase::{PhraseMatcher, VectorPhraseMatcher};
pub use self::rebase::ChainedMatcher;
pub use self::require::RequireMatcher;
pub use self::union::{DisjunctionMaxMatcher, OrScoring, UnionMatcher};

use crate::schema::Term;
use crate::DocId;
use crate::Score;
use std::collections::BTreeSet;

/// A stateful forward iterator over ascending document ids.
///
/// A fresh matcher is positioned on its first match (if any): `doc()`
/// is valid as soon as `is_active()` returns true, without a prior call
/// to `advance`.
pub trait Matcher {
    /// True while the matcher is positioned on a match.
    fn is_active(&self) -> bool;

    /// The current document id. Undefined when `!is_active()`.
    fn doc(&self) -> DocId;

    /// Advances to the next match; returns `is_active()`.
    fn advance(&mut self) -> bool;

    /// Advances to the first match with id `>= target`.
    fn skip_to(&mut self, target: DocId) -> bool {
        while self.is_active() && self.doc() < target {
            self.advance();
        }
        self.is_active()
    }

    /// Raw term weight at the current document (term frequency for
    /// frequency-bearing formats, possibly boost-adjusted).
    fn weight(&self) -> f32 {
        1.0
    }

    /// Model-scored value at the current document.
    fn score(&mut self) -> Score;

    /// True if `block_max_score`/`skip_to_quality` give real bounds.
    fn supports_block_quality(&self) -> bool {
        false
    }

    /// Upper bound of `score()` for every remaining document of the
    /// current block.
    fn block_max_score(&mut self) -> Score {
        std::f32::INFINITY
    }

    /// Advances at least once, skipping past blocks whose
    /// `block_max_score` is `<= threshold`; returns `is_active()`.
    fn skip_to_quality(&mut self, _threshold: Score) -> bool {
        self.advance()
    }

    /// Adds to `terms` the query terms this matcher matched in `doc`.
    fn matching_terms(&self, _doc: DocId, _terms: &mut BTreeSet<Term>) {}
}

impl Matcher for Box<dyn Matcher> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn doc(&self) -> DocId {
        (**self).doc()
    }

    fn advance(&mut self) -> bool {
        (**self).advance()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        (**self).skip_to(target)
    }

    fn weight(&self) -> f32 {
        (**self).weight()
    }

    fn score(&mut self) -> Score {
        (**self).score()
    }

    fn supports_block_quality(&self) -> bool {
        (**self).supports_block_quality()
    }

    fn block_max_score(&mut self) -> Score {
        (**self).block_max_score()
    }

    fn skip_to_quality(&mut self, threshold: Score) -> bool {
        (**self).skip_to_quality(threshold)
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        (**self).matching_terms(doc, terms)
    }
}

/// Matcher over no document.
pub struct EmptyMatcher;

impl Matcher for EmptyMatcher {
    fn is_active(&self) -> bool {
        false
    }

    fn doc(&self) -> DocId {
        unreachable!("EmptyMatcher has no current document")
    }

    fn advance(&mut self) -> bool {
        false
    }

    fn score(&mut self) -> Score {
        0.0
    }
}

/// Replaces the score of the wrapped matcher with a constant.
pub struct ConstScoreMatcher {
    inner: Box<dyn Matcher>,
    const_score: Score,
}

impl ConstScoreMatcher {
    pub fn new(inner: Box<dyn Matcher>, const_score: Score) -> ConstScoreMatcher {
        ConstScoreMatcher { inner, const_score }
    }
}

impl Matcher for ConstScoreMatcher {
    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn doc(&self) -> DocId {
        self.inner.doc()
    }

    fn advance(&mut self) -> bool {
        self.inner.advance()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.inner.skip_to(target)
    }

    fn weight(&self) -> f32 {
        self.inner.weight()
    }

    fn score(&mut self) -> Score {
        self.const_score
    }

    fn supports_block_quality(&self) -> bool {
        true
    }

    fn block_max_score(&mut self) -> Score {
        self.const_score
    }

    fn matching_terms(&self, doc: DocId, terms: &mut BTreeSet<Term>) {
        self.inner.matching_terms(doc, terms)
    }
}

/// Collects the remaining `(doc, score)` pairs of a matcher. Test and
/// debugging helper.
pub fn drain_matcher(matcher: &mut dyn Matcher) -> Vec<(DocId, Score)> {
    let mut out = Vec::new();
    while matcher.is_active() {
        out.push((matcher.doc(), matcher.score()));
        matcher.advance();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::test_helpers::VecMatcher;
    use super::*;
    use rand::prelude::*;
    use std::collections::BTreeSet;

    fn random_doc_set(rng: &mut StdRng, max_doc: DocId, density: f64) -> Vec<DocId> {
        (0..max_doc)
            .filter(|_| rng.gen_bool(density))
            .collect()
    }

    fn docs_of(matcher: &mut dyn Matcher) -> Vec<DocId> {
        drain_matcher(matcher)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect()
    }

    #[test]
    fn test_combinators_against_set_operations() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let left = random_doc_set(&mut rng, 500, 0.2);
            let right = random_doc_set(&mut rng, 500, 0.3);
            let left_set: BTreeSet<DocId> = left.iter().cloned().collect();
            let right_set: BTreeSet<DocId> = right.iter().cloned().collect();

            let boxed = |docs: &[DocId]| -> Box<dyn Matcher> {
                Box::new(VecMatcher::from_docs(docs))
            };

            let mut intersection =
                IntersectionMatcher::new(vec![boxed(&left), boxed(&right)]);
            let expected: Vec<DocId> =
                left_set.intersection(&right_set).cloned().collect();
            assert_eq!(docs_of(&mut intersection), expected);

            let mut union =
                UnionMatcher::new(vec![boxed(&left), boxed(&right)], OrScoring::Sum);
            let expected: Vec<DocId> = left_set.union(&right_set).cloned().collect();
            assert_eq!(docs_of(&mut union), expected);

            let mut exclusion = ExclusionMatcher::new(boxed(&left), boxed(&right));
            let expected: Vec<DocId> =
                left_set.difference(&right_set).cloned().collect();
            assert_eq!(docs_of(&mut exclusion), expected);

            let mut and_maybe = AndMaybeMatcher::new(boxed(&left), boxed(&right));
            assert_eq!(docs_of(&mut and_maybe), left.clone());
        }
    }

    #[test]
    fn test_random_skip_to_agrees_with_advance() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let left = random_doc_set(&mut rng, 400, 0.15);
            let right = random_doc_set(&mut rng, 400, 0.15);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let make_union = |left: &[DocId], right: &[DocId]| {
                UnionMatcher::new(
                    vec![
                        Box::new(VecMatcher::from_docs(left)) as Box<dyn Matcher>,
                        Box::new(VecMatcher::from_docs(right)) as Box<dyn Matcher>,
                    ],
                    OrScoring::Sum,
                )
            };
            let all_docs = docs_of(&mut make_union(&left, &right));
            let mut matcher = make_union(&left, &right);
            let target: DocId = rng.gen_range(0, 400);
            let expected = all_docs.iter().cloned().find(|&doc| doc >= target);
            let reached = matcher.skip_to(target);
            assert_eq!(reached, expected.is_some());
            if let Some(expected_doc) = expected {
                assert_eq!(matcher.doc(), expected_doc);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    /// Matcher over a fixed list of `(doc, score)` pairs.
    pub struct VecMatcher {
        entries: Vec<(DocId, Score)>,
        cursor: usize,
    }

    impl VecMatcher {
        pub fn new(entries: Vec<(DocId, Score)>) -> VecMatcher {
            VecMatcher { entries, cursor: 0 }
        }

        pub fn from_docs(docs: &[DocId]) -> VecMatcher {
            VecMatcher::new(docs.iter().map(|&doc| (doc, 1.0)).collect())
        }
    }

    impl Matcher for VecMatcher {
        fn is_active(&self) -> bool {
            self.cursor < self.entries.len()
        }

        fn doc(&self) -> DocId {
            self.entries[self.cursor].0
        }

        fn advance(&mut self) -> bool {
            self.cursor += 1;
            self.is_active()
        }

        fn weight(&self) -> f32 {
            self.entries[self.cursor].1
        }

        fn score(&mut self) -> Score {
            self.entries[self.cursor].1
        }
    }
}
