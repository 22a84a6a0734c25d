use crate::collector::{Collector, Results};
use crate::column::{ColumnReader, ColumnValue};
use crate::common::{f64_to_sortable, BitSet};
use crate::core::IndexReader;
use crate::matcher::Matcher;
use crate::query::{query_bitset, Query};
use crate::schema::Field;
use crate::scoring::Weighting;
use crate::DocId;
use crate::Result;
use crate::Score;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A grouping/sorting key derived for one document.
///
/// Ordering across variants follows the declaration order; `Missing`
/// is last so that documents without a value sort after the rest.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FacetKey {
    Bool(bool),
    U64(u64),
    Str(String),
    Bytes(Vec<u8>),
    Composite(Vec<FacetKey>),
    Missing,
}

/// A rule assigning each document one (or more) facet keys.
#[derive(Clone)]
pub enum FacetSpec {
    /// Key = the document's column value for `field`.
    Field { field: Field, reverse: bool },
    /// Key = the document's score.
    Score { reverse: bool },
    /// Key = the labels of the bucket queries matching the document.
    QueryBuckets {
        buckets: Vec<(String, Query)>,
        /// With overlap, a document lands in every matching bucket;
        /// without, in the first one.
        allow_overlap: bool,
    },
    /// Key = the label of the numeric bucket containing the column
    /// value. Boundaries are expressed over the sortable `u64` images,
    /// built through [`FacetSpec::numeric_buckets`].
    RangeBuckets {
        field: Field,
        boundaries: Vec<(String, u64, u64)>,
        reverse: bool,
    },
    /// Key computed by a user callback.
    Function(Arc<dyn Fn(DocId, Score) -> FacetKey + Send + Sync>),
    /// Lexicographic combination of several facets.
    Multi(Vec<FacetSpec>),
}

impl FacetSpec {
    pub fn field(field: Field) -> FacetSpec {
        FacetSpec::Field {
            field,
            reverse: false,
        }
    }

    pub fn field_reversed(field: Field) -> FacetSpec {
        FacetSpec::Field {
            field,
            reverse: true,
        }
    }

    pub fn score() -> FacetSpec {
        FacetSpec::Score { reverse: false }
    }

    /// Buckets `[start, end)` of width `gap` over a `u64` column.
    pub fn numeric_buckets(field: Field, start: u64, end: u64, gap: u64) -> FacetSpec {
        assert!(gap > 0);
        let mut boundaries = Vec::new();
        let mut lower = start;
        while lower < end {
            let upper = (lower + gap).min(end);
            boundaries.push((format!("{}-{}", lower, upper), lower, upper));
            lower = upper;
        }
        FacetSpec::RangeBuckets {
            field,
            boundaries,
            reverse: false,
        }
    }

    fn is_reversed(&self) -> bool {
        match self {
            FacetSpec::Field { reverse, .. }
            | FacetSpec::Score { reverse }
            | FacetSpec::RangeBuckets { reverse, .. } => *reverse,
            _ => false,
        }
    }

    /// Binds the facet to a reader snapshot.
    pub(crate) fn evaluator(
        &self,
        reader: &IndexReader,
        weighting: &Arc<dyn Weighting>,
    ) -> Result<FacetEvaluator> {
        match self {
            FacetSpec::Field { field, reverse } => Ok(FacetEvaluator::Column {
                columns: segment_columns(reader, *field),
                bases: reader.doc_bases().to_vec(),
                reverse: *reverse,
            }),
            FacetSpec::Score { reverse } => Ok(FacetEvaluator::Score { reverse: *reverse }),
            FacetSpec::QueryBuckets {
                buckets,
                allow_overlap,
            } => {
                let mut compiled = Vec::with_capacity(buckets.len());
                for (label, query) in buckets {
                    let bitset = query_bitset(query, reader, weighting)?;
                    compiled.push((label.clone(), Arc::new(bitset)));
                }
                Ok(FacetEvaluator::QueryBuckets {
                    buckets: compiled,
                    allow_overlap: *allow_overlap,
                })
            }
            FacetSpec::RangeBuckets {
                field,
                boundaries,
                reverse,
            } => Ok(FacetEvaluator::RangeBuckets {
                columns: segment_columns(reader, *field),
                bases: reader.doc_bases().to_vec(),
                boundaries: boundaries.clone(),
                reverse: *reverse,
            }),
            FacetSpec::Function(function) => Ok(FacetEvaluator::Function(function.clone())),
            FacetSpec::Multi(specs) => {
                let evaluators = specs
                    .iter()
                    .map(|spec| spec.evaluator(reader, weighting))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FacetEvaluator::Multi(evaluators))
            }
        }
    }
}

fn segment_columns(reader: &IndexReader, field: Field) -> Vec<Option<Arc<ColumnReader>>> {
    reader
        .segment_readers()
        .iter()
        .map(|segment| segment.column(field).ok())
        .collect()
}

/// A [`FacetSpec`] bound to one reader: maps `(doc, score)` to keys.
pub(crate) enum FacetEvaluator {
    Column {
        columns: Vec<Option<Arc<ColumnReader>>>,
        bases: Vec<DocId>,
        reverse: bool,
    },
    Score {
        reverse: bool,
    },
    QueryBuckets {
        buckets: Vec<(String, Arc<BitSet>)>,
        allow_overlap: bool,
    },
    RangeBuckets {
        columns: Vec<Option<Arc<ColumnReader>>>,
        bases: Vec<DocId>,
        boundaries: Vec<(String, u64, u64)>,
        reverse: bool,
    },
    Function(Arc<dyn Fn(DocId, Score) -> FacetKey + Send + Sync>),
    Multi(Vec<FacetEvaluator>),
}

fn segment_of(bases: &[DocId], doc: DocId) -> (usize, DocId) {
    let mut segment_ord = match bases.binary_search(&doc) {
        Ok(exact) => exact,
        Err(insertion) => insertion - 1,
    };
    while segment_ord + 1 < bases.len() && bases[segment_ord + 1] <= doc {
        segment_ord += 1;
    }
    (segment_ord, doc - bases[segment_ord])
}

fn column_value_key(
    columns: &[Option<Arc<ColumnReader>>],
    bases: &[DocId],
    doc: DocId,
) -> FacetKey {
    let (segment_ord, local) = segment_of(bases, doc);
    match columns[segment_ord]
        .as_ref()
        .and_then(|column| column.value(local))
    {
        Some(ColumnValue::U64(val)) => FacetKey::U64(val),
        Some(ColumnValue::Bytes(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => FacetKey::Str(text),
            Err(err) => FacetKey::Bytes(err.into_bytes()),
        },
        Some(ColumnValue::Bool(val)) => FacetKey::Bool(val),
        None => FacetKey::Missing,
    }
}

impl FacetEvaluator {
    /// The keys of `doc`; most facets yield exactly one.
    pub fn keys(&self, doc: DocId, score: Score, out: &mut Vec<FacetKey>) {
        match self {
            FacetEvaluator::Column { columns, bases, .. } => {
                out.push(column_value_key(columns, bases, doc));
            }
            FacetEvaluator::Score { .. } => {
                out.push(FacetKey::U64(f64_to_sortable(f64::from(score))));
            }
            FacetEvaluator::QueryBuckets {
                buckets,
                allow_overlap,
            } => {
                let mut matched = false;
                for (label, bitset) in buckets {
                    if bitset.contains(doc) {
                        out.push(FacetKey::Str(label.clone()));
                        matched = true;
                        if !allow_overlap {
                            break;
                        }
                    }
                }
                if !matched {
                    out.push(FacetKey::Missing);
                }
            }
            FacetEvaluator::RangeBuckets {
                columns,
                bases,
                boundaries,
                ..
            } => {
                let key = match column_value_key(columns, bases, doc) {
                    FacetKey::U64(val) => boundaries
                        .iter()
                        .find(|&&(_, lower, upper)| lower <= val && val < upper)
                        .map(|(label, _, _)| FacetKey::Str(label.clone()))
                        .unwrap_or(FacetKey::Missing),
                    _ => FacetKey::Missing,
                };
                out.push(key);
            }
            FacetEvaluator::Function(function) => {
                out.push(function(doc, score));
            }
            FacetEvaluator::Multi(evaluators) => {
                let mut components = Vec::with_capacity(evaluators.len());
                for evaluator in evaluators {
                    components.push(evaluator.sort_key(doc, score).0);
                }
                out.push(FacetKey::Composite(components));
            }
        }
    }

    /// The primary key of `doc` with its reverse flag, for sorting.
    pub fn sort_key(&self, doc: DocId, score: Score) -> (FacetKey, bool) {
        let mut keys = Vec::with_capacity(1);
        self.keys(doc, score, &mut keys);
        let key = keys.into_iter().next().unwrap_or(FacetKey::Missing);
        (key, self.is_reversed())
    }

    fn is_reversed(&self) -> bool {
        match self {
            FacetEvaluator::Column { reverse, .. }
            | FacetEvaluator::Score { reverse }
            | FacetEvaluator::RangeBuckets { reverse, .. } => *reverse,
            _ => false,
        }
    }

    pub fn needs_score(&self) -> bool {
        match self {
            FacetEvaluator::Score { .. } | FacetEvaluator::Function(_) => true,
            FacetEvaluator::Multi(evaluators) => {
                evaluators.iter().any(FacetEvaluator::needs_score)
            }
            _ => false,
        }
    }
}

/// How a facet group accumulates its documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacetMapKind {
    /// Documents in collection order.
    OrderedList,
    /// Documents in arbitrary order (cheapest).
    UnorderedList,
    /// Only the number of documents.
    Count,
    /// Only the best-scoring document.
    Best,
}

/// One group of a facet.
#[derive(Clone, Debug, PartialEq)]
pub enum FacetGroup {
    Docs(Vec<DocId>),
    Count(usize),
    Best { doc: DocId, score: Score },
}

/// Per-facet accumulated groups.
pub type GroupedResults = BTreeMap<FacetKey, FacetGroup>;

/// Wrapper collector assigning every collected document to its facet
/// groups.
pub struct FacetCollector {
    inner: Box<dyn Collector>,
    facets: Vec<(String, FacetEvaluator, FacetMapKind)>,
    groups: Vec<GroupedResults>,
    scratch: Vec<FacetKey>,
}

impl FacetCollector {
    pub(crate) fn wrap(
        inner: Box<dyn Collector>,
        facets: Vec<(String, FacetEvaluator, FacetMapKind)>,
    ) -> FacetCollector {
        let groups = facets.iter().map(|_| GroupedResults::new()).collect();
        FacetCollector {
            inner,
            facets,
            groups,
            scratch: Vec::new(),
        }
    }
}

impl Collector for FacetCollector {
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()> {
        let score = matcher.score();
        for (facet_ord, (_, evaluator, kind)) in self.facets.iter().enumerate() {
            self.scratch.clear();
            evaluator.keys(doc, score, &mut self.scratch);
            let groups = &mut self.groups[facet_ord];
            for key in self.scratch.drain(..) {
                match kind {
                    FacetMapKind::OrderedList | FacetMapKind::UnorderedList => {
                        match groups
                            .entry(key)
                            .or_insert_with(|| FacetGroup::Docs(Vec::new()))
                        {
                            FacetGroup::Docs(docs) => docs.push(doc),
                            _ => unreachable!(),
                        }
                    }
                    FacetMapKind::Count => {
                        match groups.entry(key).or_insert(FacetGroup::Count(0)) {
                            FacetGroup::Count(count) => *count += 1,
                            _ => unreachable!(),
                        }
                    }
                    FacetMapKind::Best => {
                        let entry = groups
                            .entry(key)
                            .or_insert(FacetGroup::Best { doc, score });
                        if let FacetGroup::Best {
                            doc: best_doc,
                            score: best_score,
                        } = entry
                        {
                            if score > *best_score {
                                *best_doc = doc;
                                *best_score = score;
                            }
                        }
                    }
                }
            }
        }
        self.inner.collect(doc, matcher)
    }

    fn quality_threshold(&self) -> Option<Score> {
        // grouping must observe every match
        None
    }

    fn harvest(self: Box<Self>) -> Results {
        let mut results = self.inner.harvest();
        for ((name, _, _), groups) in self.facets.into_iter().zip(self.groups) {
            results.groups.insert(name, groups);
        }
        results
    }
}
