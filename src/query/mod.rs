//! The query algebra.
//!
//! A [`Query`] is an immutable value describing what to match; building
//! one never touches the index. `normalize` simplifies the tree
//! (flattening nested groups, short-circuiting empties) and
//! `matcher` compiles it against a reader snapshot.

mod build;
mod expand;

pub use self::build::query_bitset;
pub(crate) use self::build::segment_query_bitset;
pub(crate) use self::expand::lev_builder;
pub use self::expand::MAX_EXPANDED_TERMS;

use crate::common::{f64_to_sortable, i64_to_sortable};
use crate::schema::{Field, Term};
use crate::DateTime;
use std::hash::{Hash, Hasher};
use std::ops::Bound;

/// `f32` wrapper comparing and hashing by bit pattern, so queries stay
/// value-comparable and hashable.
#[derive(Clone, Copy, Debug)]
pub struct ScoreValue(pub f32);

impl PartialEq for ScoreValue {
    fn eq(&self, other: &ScoreValue) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for ScoreValue {}

impl Hash for ScoreValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f32> for ScoreValue {
    fn from(val: f32) -> ScoreValue {
        ScoreValue(val)
    }
}

/// Bound of a range query, as the big-endian byte key it translates to
/// in the term dictionary.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RangeBound {
    Unbounded,
    Included(Vec<u8>),
    Excluded(Vec<u8>),
}

impl RangeBound {
    pub(crate) fn as_bound(&self) -> Bound<&[u8]> {
        match self {
            RangeBound::Unbounded => Bound::Unbounded,
            RangeBound::Included(key) => Bound::Included(&key[..]),
            RangeBound::Excluded(key) => Bound::Excluded(&key[..]),
        }
    }

    fn map_value<T, F: Fn(T) -> Vec<u8>>(bound: Bound<T>, to_key: F) -> RangeBound {
        match bound {
            Bound::Unbounded => RangeBound::Unbounded,
            Bound::Included(val) => RangeBound::Included(to_key(val)),
            Bound::Excluded(val) => RangeBound::Excluded(to_key(val)),
        }
    }
}

/// Algebraic representation of a search.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Query {
    /// Matches nothing.
    Empty,
    /// Matches every live document, or every document where `field` is
    /// present.
    Every(Option<Field>),
    /// Matches the documents containing one exact term.
    Term(Term),
    /// Consecutive terms in one field, with up to `slop` extra gaps.
    Phrase {
        field: Field,
        terms: Vec<String>,
        slop: u32,
    },
    /// Intersection of the sub-queries; scores are summed.
    And(Vec<Query>),
    /// Union of the sub-queries.
    Or {
        subqueries: Vec<Query>,
        /// Minimum number of sub-queries a document must match.
        minimum_match: usize,
        /// When set, scores get a bonus growing with the number of
        /// matching sub-queries.
        count_bonus: Option<ScoreValue>,
    },
    /// Matches the live documents NOT matching the sub-query.
    Not(Box<Query>),
    /// Documents of `positive` absent from `negative`.
    AndNot {
        positive: Box<Query>,
        negative: Box<Query>,
    },
    /// Matches `required`; `optional` only contributes to scores.
    AndMaybe {
        required: Box<Query>,
        optional: Box<Query>,
    },
    /// Both must match, only `scored` contributes to scores.
    Require {
        scored: Box<Query>,
        required: Box<Query>,
    },
    /// Union scored by the best sub-query plus a fraction of the rest.
    DisjunctionMax {
        subqueries: Vec<Query>,
        tie_break: ScoreValue,
    },
    /// Every term starting with `prefix`.
    Prefix { field: Field, prefix: String },
    /// Shell-style pattern: `*` and `?` wildcards.
    Wildcard { field: Field, pattern: String },
    /// Every term matching the regular expression.
    Regex { field: Field, pattern: String },
    /// Terms within a byte range of the dictionary. Numeric and date
    /// ranges are built through the typed constructors, which encode
    /// the bounds so byte order matches value order.
    Range {
        field: Field,
        lower: RangeBound,
        upper: RangeBound,
    },
    /// Terms within Levenshtein `distance` of `text`; the first
    /// `prefix_len` characters must match exactly.
    Fuzzy {
        field: Field,
        text: String,
        distance: u8,
        prefix_len: usize,
    },
    /// Union of externally generated variants of one word (e.g.
    /// morphological forms), scored per variant.
    Variants { field: Field, variants: Vec<String> },
    /// Replaces the sub-query's scores with a constant.
    ConstantScore { query: Box<Query>, score: ScoreValue },
    /// For each child matching `children`, the nearest preceding parent
    /// matching `parents` (contiguous-group invariant).
    NestedParent {
        parents: Box<Query>,
        children: Box<Query>,
    },
    /// For each parent matching `parent_query`, its contiguous children
    /// range; `parents` defines the parent set.
    NestedChildren {
        parents: Box<Query>,
        parent_query: Box<Query>,
    },
}

impl Query {
    /// A term query over a text field.
    pub fn term(field: Field, text: &str) -> Query {
        Query::Term(Term::from_field_text(field, text))
    }

    pub fn and(subqueries: Vec<Query>) -> Query {
        Query::And(subqueries)
    }

    pub fn or(subqueries: Vec<Query>) -> Query {
        Query::Or {
            subqueries,
            minimum_match: 1,
            count_bonus: None,
        }
    }

    pub fn phrase(field: Field, terms: Vec<&str>, slop: u32) -> Query {
        Query::Phrase {
            field,
            terms: terms.into_iter().map(str::to_string).collect(),
            slop,
        }
    }

    pub fn u64_range(field: Field, lower: Bound<u64>, upper: Bound<u64>) -> Query {
        Query::Range {
            field,
            lower: RangeBound::map_value(lower, |val| val.to_be_bytes().to_vec()),
            upper: RangeBound::map_value(upper, |val| val.to_be_bytes().to_vec()),
        }
    }

    pub fn i64_range(field: Field, lower: Bound<i64>, upper: Bound<i64>) -> Query {
        Query::Range {
            field,
            lower: RangeBound::map_value(lower, |val| i64_to_sortable(val).to_be_bytes().to_vec()),
            upper: RangeBound::map_value(upper, |val| i64_to_sortable(val).to_be_bytes().to_vec()),
        }
    }

    pub fn f64_range(field: Field, lower: Bound<f64>, upper: Bound<f64>) -> Query {
        Query::Range {
            field,
            lower: RangeBound::map_value(lower, |val| f64_to_sortable(val).to_be_bytes().to_vec()),
            upper: RangeBound::map_value(upper, |val| f64_to_sortable(val).to_be_bytes().to_vec()),
        }
    }

    pub fn date_range(field: Field, lower: Bound<&DateTime>, upper: Bound<&DateTime>) -> Query {
        let to_key =
            |date: &DateTime| i64_to_sortable(date.timestamp()).to_be_bytes().to_vec();
        Query::Range {
            field,
            lower: RangeBound::map_value(lower, to_key),
            upper: RangeBound::map_value(upper, to_key),
        }
    }

    /// Terms within a text range (inclusive bounds given as `Some`).
    pub fn term_range(
        field: Field,
        lower: Bound<&str>,
        upper: Bound<&str>,
    ) -> Query {
        let to_key = |text: &str| text.as_bytes().to_vec();
        Query::Range {
            field,
            lower: RangeBound::map_value(lower, to_key),
            upper: RangeBound::map_value(upper, to_key),
        }
    }

    /// Flattens nested groups, removes empty sub-queries and
    /// short-circuits degenerate forms.
    pub fn normalize(self) -> Query {
        match self {
            Query::And(subqueries) => {
                let mut flattened = Vec::with_capacity(subqueries.len());
                for subquery in subqueries {
                    match subquery.normalize() {
                        Query::Empty => return Query::Empty,
                        Query::And(inner) => flattened.extend(inner),
                        Query::Every(None) => {}
                        other => flattened.push(other),
                    }
                }
                match flattened.len() {
                    0 => Query::Every(None),
                    1 => flattened.into_iter().next().unwrap(),
                    _ => Query::And(flattened),
                }
            }
            Query::Or {
                subqueries,
                minimum_match,
                count_bonus,
            } => {
                let plain = minimum_match <= 1 && count_bonus.is_none();
                let mut flattened = Vec::with_capacity(subqueries.len());
                for subquery in subqueries {
                    match subquery.normalize() {
                        Query::Empty => {}
                        Query::Or {
                            subqueries: inner,
                            minimum_match: 1,
                            count_bonus: None,
                        } if plain => flattened.extend(inner),
                        other => flattened.push(other),
                    }
                }
                match (flattened.len(), plain) {
                    (0, _) => Query::Empty,
                    (1, true) => flattened.into_iter().next().unwrap(),
                    _ => Query::Or {
                        subqueries: flattened,
                        minimum_match,
                        count_bonus,
                    },
                }
            }
            Query::Not(inner) => match inner.normalize() {
                Query::Empty => Query::Every(None),
                Query::Every(None) => Query::Empty,
                other => Query::Not(Box::new(other)),
            },
            Query::AndNot { positive, negative } => {
                let positive = positive.normalize();
                let negative = negative.normalize();
                match (positive, negative) {
                    (Query::Empty, _) => Query::Empty,
                    (positive, Query::Empty) => positive,
                    (positive, negative) => Query::AndNot {
                        positive: Box::new(positive),
                        negative: Box::new(negative),
                    },
                }
            }
            Query::AndMaybe { required, optional } => {
                let required = required.normalize();
                let optional = optional.normalize();
                match (required, optional) {
                    (Query::Empty, _) => Query::Empty,
                    (required, Query::Empty) => required,
                    (required, optional) => Query::AndMaybe {
                        required: Box::new(required),
                        optional: Box::new(optional),
                    },
                }
            }
            Query::Require { scored, required } => {
                let scored = scored.normalize();
                let required = required.normalize();
                match (scored, required) {
                    (Query::Empty, _) | (_, Query::Empty) => Query::Empty,
                    (scored, required) => Query::Require {
                        scored: Box::new(scored),
                        required: Box::new(required),
                    },
                }
            }
            Query::DisjunctionMax {
                subqueries,
                tie_break,
            } => {
                let flattened: Vec<Query> = subqueries
                    .into_iter()
                    .map(Query::normalize)
                    .filter(|subquery| *subquery != Query::Empty)
                    .collect();
                match flattened.len() {
                    0 => Query::Empty,
                    1 => flattened.into_iter().next().unwrap(),
                    _ => Query::DisjunctionMax {
                        subqueries: flattened,
                        tie_break,
                    },
                }
            }
            Query::ConstantScore { query, score } => match query.normalize() {
                Query::Empty => Query::Empty,
                other => Query::ConstantScore {
                    query: Box::new(other),
                    score,
                },
            },
            Query::NestedParent { parents, children } => {
                let parents = parents.normalize();
                let children = children.normalize();
                match (parents, children) {
                    (Query::Empty, _) | (_, Query::Empty) => Query::Empty,
                    (parents, children) => Query::NestedParent {
                        parents: Box::new(parents),
                        children: Box::new(children),
                    },
                }
            }
            Query::NestedChildren {
                parents,
                parent_query,
            } => {
                let parents = parents.normalize();
                let parent_query = parent_query.normalize();
                match (parents, parent_query) {
                    (Query::Empty, _) | (_, Query::Empty) => Query::Empty,
                    (parents, parent_query) => Query::NestedChildren {
                        parents: Box::new(parents),
                        parent_query: Box::new(parent_query),
                    },
                }
            }
            Query::Phrase {
                field,
                terms,
                slop,
            } => {
                if terms.is_empty() {
                    Query::Empty
                } else if terms.len() == 1 {
                    Query::Term(Term::from_field_text(field, &terms[0]))
                } else {
                    Query::Phrase {
                        field,
                        terms,
                        slop,
                    }
                }
            }
            Query::Variants { field, variants } => {
                if variants.is_empty() {
                    Query::Empty
                } else {
                    Query::Variants { field, variants }
                }
            }
            other => other,
        }
    }
}
