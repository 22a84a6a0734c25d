//! Collectors: consumers of a matcher producing a [`Results`] set.
//!
//! The base collectors (top-K, sorted, unlimited) own the ranking; the
//! wrapper collectors (facets, matched terms, time limit) observe the
//! stream and enrich the results. The search driver feeds every
//! matching document to the collector and, when the collector exposes a
//! quality threshold, lets the matcher skip blocks that cannot beat it.

mod collapse;
mod facet;
mod sorted;
mod time_limit;
mod top_k;
mod unlimited;

pub use self::collapse::CollapseSpec;
pub use self::facet::{
    FacetCollector, FacetGroup, FacetKey, FacetMapKind, FacetSpec, GroupedResults,
};
pub use self::sorted::{SortKey, SortedCollector};
pub use self::time_limit::TimeLimitCollector;
pub use self::top_k::TopKCollector;
pub use self::unlimited::UnlimitedCollector;

pub(crate) use self::collapse::Collapser;

use crate::matcher::Matcher;
use crate::schema::Term;
use crate::DocId;
use crate::Result;
use crate::Score;
use std::collections::{BTreeSet, HashMap};

/// Consumes the documents of a matcher.
pub trait Collector {
    /// Registers one matching document. The matcher is positioned on
    /// `doc`; the collector may pull its score or matched terms.
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()>;

    /// When set, the driver may ask the matcher to skip blocks whose
    /// best possible score is `<=` this threshold. `None` disables
    /// pruning (collectors that must observe every match).
    fn quality_threshold(&self) -> Option<Score> {
        None
    }

    /// Produces the final results.
    fn harvest(self: Box<Self>) -> Results;
}

/// A hit of the results: the index-wide docnum, the score when the
/// collection was scored, and the sort key when it was sorted.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub doc: DocId,
    pub score: Option<Score>,
    pub sort_key: Option<SortKey>,
}

/// Total number of matching documents: exact when the whole stream was
/// observed, a `[min, max]` bracket when early termination skipped
/// part of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TotalHits {
    pub min: u64,
    pub max: u64,
}

impl TotalHits {
    pub fn exact(count: u64) -> TotalHits {
        TotalHits {
            min: count,
            max: count,
        }
    }

    /// Some iff the total is exact.
    pub fn get_exact(&self) -> Option<u64> {
        if self.min == self.max {
            Some(self.min)
        } else {
            None
        }
    }
}

/// The product of a search.
#[derive(Clone, Debug)]
pub struct Results {
    /// Ordered hits (best first).
    pub hits: Vec<Hit>,
    pub total: TotalHits,
    /// Facet name -> groups, for grouped searches.
    pub groups: HashMap<String, GroupedResults>,
    /// Collapse key -> number of documents removed under that key.
    pub collapsed_counts: HashMap<FacetKey, usize>,
    /// Per-hit matched query terms, when requested.
    pub matched_terms: HashMap<DocId, BTreeSet<Term>>,
    /// True when a time limit cut the collection short.
    pub partial: bool,
}

impl Results {
    pub(crate) fn new() -> Results {
        Results {
            hits: Vec::new(),
            total: TotalHits::exact(0),
            groups: HashMap::new(),
            collapsed_counts: HashMap::new(),
            matched_terms: HashMap::new(),
            partial: false,
        }
    }

    /// Number of hits actually returned.
    pub fn scored_length(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn docs<'a>(&'a self) -> impl Iterator<Item = DocId> + 'a {
        self.hits.iter().map(|hit| hit.doc)
    }

    /// The groups of one facet.
    pub fn groups(&self, name: &str) -> Option<&GroupedResults> {
        self.groups.get(name)
    }
}

/// Wrapper recording which query terms matched each collected document.
pub struct TermsCollector {
    inner: Box<dyn Collector>,
    matched_terms: HashMap<DocId, BTreeSet<Term>>,
}

impl TermsCollector {
    pub fn wrap(inner: Box<dyn Collector>) -> TermsCollector {
        TermsCollector {
            inner,
            matched_terms: HashMap::new(),
        }
    }
}

impl Collector for TermsCollector {
    fn collect(&mut self, doc: DocId, matcher: &mut dyn Matcher) -> Result<()> {
        let mut terms = BTreeSet::new();
        matcher.matching_terms(doc, &mut terms);
        if !terms.is_empty() {
            self.matched_terms.insert(doc, terms);
        }
        self.inner.collect(doc, matcher)
    }

    fn quality_threshold(&self) -> Option<Score> {
        // term recording must observe every match
        None
    }

    fn harvest(self: Box<Self>) -> Results {
        let mut results = self.inner.harvest();
        results.matched_terms = self.matched_terms;
        results
    }
}
