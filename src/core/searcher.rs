use crate::collector::{
    Collapser, CollapseSpec, Collector, FacetCollector, FacetMapKind, FacetSpec, Results,
    SortedCollector, TermsCollector, TimeLimitCollector, TopKCollector, TotalHits,
    UnlimitedCollector,
};
use crate::error::LexisError;
use crate::matcher::{FilterMatcher, Matcher};
use crate::query::{query_bitset, Query};
use crate::core::IndexReader;
use crate::schema::{Document, Field, Term};
use crate::scoring::Weighting;
use crate::DocId;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options of one search call.
pub struct SearchOptions {
    /// Number of hits to return; `None` collects everything.
    pub limit: Option<usize>,
    /// Sort facets replacing the score ordering.
    pub sorted_by: Vec<FacetSpec>,
    /// Facets to group by: `(name, facet, accumulation)`.
    pub grouped_by: Vec<(String, FacetSpec, FacetMapKind)>,
    /// Only documents matching this query are collected.
    pub filter: Option<Query>,
    /// Documents matching this query are excluded.
    pub mask: Option<Query>,
    /// Record which query terms matched each hit.
    pub terms: bool,
    /// Keep at most N documents per collapse key.
    pub collapse: Option<CollapseSpec>,
    /// Abort collection after this much time.
    pub time_limit: Option<Duration>,
    /// With a time limit: return the partial results instead of the
    /// `TimeLimit` error.
    pub allow_partial: bool,
    /// Run an extra unscored pass to make the total exact even under
    /// early termination.
    pub count_exact: bool,
}

impl Default for SearchOptions {
    fn default() -> SearchOptions {
        SearchOptions {
            limit: Some(10),
            sorted_by: Vec::new(),
            grouped_by: Vec::new(),
            filter: None,
            mask: None,
            terms: false,
            collapse: None,
            time_limit: None,
            allow_partial: false,
            count_exact: false,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> SearchOptions {
        SearchOptions {
            limit: Some(limit),
            ..SearchOptions::default()
        }
    }

    pub fn unlimited() -> SearchOptions {
        SearchOptions {
            limit: None,
            ..SearchOptions::default()
        }
    }

    pub fn sorted_by(facet: FacetSpec) -> SearchOptions {
        SearchOptions {
            limit: None,
            sorted_by: vec![facet],
            ..SearchOptions::default()
        }
    }
}

/// Executes queries over one reader snapshot with one ranking model.
///
/// The searcher borrows nothing mutable: it can be freely created,
/// cloned and discarded.
#[derive(Clone)]
pub struct Searcher {
    reader: IndexReader,
    weighting: Arc<dyn Weighting>,
}

impl Searcher {
    pub(crate) fn new(reader: IndexReader, weighting: Arc<dyn Weighting>) -> Searcher {
        Searcher { reader, weighting }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn weighting(&self) -> &Arc<dyn Weighting> {
        &self.weighting
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> u64 {
        self.reader.doc_count()
    }

    /// Document frequency of a term across the snapshot.
    pub fn doc_freq(&self, term: &Term) -> u64 {
        self.reader.doc_freq(term)
    }

    /// The stored fields of a hit.
    pub fn document(&self, doc: DocId) -> Result<Document> {
        self.reader.doc(doc)
    }

    /// The stored fields of every document matching `query`, in docnum
    /// order.
    pub fn documents(&self, query: &Query) -> Result<Vec<Document>> {
        let results = self.search(query, &SearchOptions::unlimited())?;
        results
            .docs()
            .map(|doc| self.document(doc))
            .collect::<Result<Vec<Document>>>()
    }

    /// Runs `query` and collects according to `options`.
    pub fn search(&self, query: &Query, options: &SearchOptions) -> Result<Results> {
        let query = query.clone().normalize();
        let collector = self.build_collector(options)?;
        let mut matcher = self.wrapped_matcher(&query, options)?;
        self.drive(matcher.as_mut(), collector, &query, options)
    }

    /// Runs `query` against an externally built collector.
    pub fn search_with_collector(
        &self,
        query: &Query,
        collector: Box<dyn Collector>,
    ) -> Result<Results> {
        let query = query.clone().normalize();
        let options = SearchOptions::default();
        let mut matcher = self.wrapped_matcher(&query, &options)?;
        self.drive(matcher.as_mut(), collector, &query, &options)
    }

    fn wrapped_matcher(
        &self,
        query: &Query,
        options: &SearchOptions,
    ) -> Result<Box<dyn Matcher>> {
        let mut matcher = query.matcher(&self.reader, &self.weighting)?;
        let allow = match &options.filter {
            Some(filter) => Some(Arc::new(query_bitset(
                &filter.clone().normalize(),
                &self.reader,
                &self.weighting,
            )?)),
            None => None,
        };
        let deny = match &options.mask {
            Some(mask) => Some(Arc::new(query_bitset(
                &mask.clone().normalize(),
                &self.reader,
                &self.weighting,
            )?)),
            None => None,
        };
        if allow.is_some() || deny.is_some() {
            matcher = Box::new(FilterMatcher::new(matcher, allow, deny));
        }
        Ok(matcher)
    }

    fn build_collector(&self, options: &SearchOptions) -> Result<Box<dyn Collector>> {
        let collapser = match &options.collapse {
            Some(spec) => Some(Collapser::new(
                spec.facet.evaluator(&self.reader, &self.weighting)?,
                spec.limit,
            )),
            None => None,
        };
        let mut collector: Box<dyn Collector> = if !options.sorted_by.is_empty() {
            let evaluators = options
                .sorted_by
                .iter()
                .map(|facet| facet.evaluator(&self.reader, &self.weighting))
                .collect::<Result<Vec<_>>>()?;
            Box::new(SortedCollector::new(evaluators, options.limit, collapser))
        } else {
            match (options.limit, collapser) {
                (Some(limit), Some(collapser)) => {
                    Box::new(TopKCollector::with_collapser(limit, collapser))
                }
                (Some(limit), None) => Box::new(TopKCollector::with_limit(limit)),
                (None, _) => Box::new(UnlimitedCollector::new(true)),
            }
        };
        if !options.grouped_by.is_empty() {
            let mut facets = Vec::with_capacity(options.grouped_by.len());
            for (name, facet, kind) in &options.grouped_by {
                facets.push((
                    name.clone(),
                    facet.evaluator(&self.reader, &self.weighting)?,
                    *kind,
                ));
            }
            collector = Box::new(FacetCollector::wrap(collector, facets));
        }
        if options.terms {
            collector = Box::new(TermsCollector::wrap(collector));
        }
        if let Some(time_limit) = options.time_limit {
            collector = Box::new(TimeLimitCollector::wrap(
                collector,
                Instant::now() + time_limit,
            ));
        }
        Ok(collector)
    }

    /// The collection loop: feed matches to the collector, and let the
    /// matcher skip past blocks that cannot beat the collector's
    /// threshold.
    fn drive(
        &self,
        matcher: &mut dyn Matcher,
        mut collector: Box<dyn Collector>,
        query: &Query,
        options: &SearchOptions,
    ) -> Result<Results> {
        let mut seen = 0u64;
        let mut pruned = false;
        let mut timed_out = false;
        while matcher.is_active() {
            let doc = matcher.doc();
            match collector.collect(doc, matcher) {
                Ok(()) => {}
                Err(LexisError::TimeLimit) if options.allow_partial => {
                    timed_out = true;
                    break;
                }
                Err(err) => return Err(err),
            }
            seen += 1;
            match collector.quality_threshold() {
                Some(threshold) if matcher.supports_block_quality() => {
                    pruned = true;
                    matcher.skip_to_quality(threshold);
                }
                _ => {
                    matcher.advance();
                }
            }
        }
        let mut results = collector.harvest();
        results.partial = timed_out;
        results.total = if timed_out || pruned {
            TotalHits {
                min: seen,
                max: self.reader.doc_count(),
            }
        } else {
            TotalHits::exact(seen)
        };
        if options.count_exact && results.total.get_exact().is_none() && !timed_out {
            results.total = TotalHits::exact(self.count(query, options)?);
        }
        Ok(results)
    }

    /// Counts the matches of `query` with an unscored pass.
    pub fn count(&self, query: &Query, options: &SearchOptions) -> Result<u64> {
        let mut matcher = self.wrapped_matcher(query, options)?;
        let mut count = 0u64;
        while matcher.is_active() {
            count += 1;
            matcher.advance();
        }
        Ok(count)
    }

    /// The most characteristic terms of `field` over `docs`, extracted
    /// from the forward vectors and ranked by tf-idf.
    pub fn key_terms(&self, docs: &[DocId], field: Field, limit: usize) -> Result<Vec<String>> {
        let entry = self.reader.schema().get_field_entry(field);
        if !entry.field_type().has_vectors() {
            return Err(LexisError::FieldConfiguration(format!(
                "field {:?} does not store vectors; key terms are unavailable",
                entry.name()
            )));
        }
        let mut term_freqs: HashMap<Vec<u8>, u64> = HashMap::new();
        for &doc in docs {
            let (segment_ord, local) = self.reader.segment_for_doc(doc);
            let segment = &self.reader.segment_readers()[segment_ord];
            if let Some(vectors) = segment.vector_reader(field) {
                for (term, positions) in vectors.vector(local) {
                    *term_freqs.entry(term).or_insert(0) += positions.len() as u64;
                }
            }
        }
        let num_docs = self.reader.doc_count().max(1);
        let mut scored: Vec<(f64, Vec<u8>)> = term_freqs
            .into_iter()
            .map(|(term_bytes, freq)| {
                let term = Term::from_field_bytes(field, &term_bytes);
                let doc_freq = self.reader.doc_freq(&term).max(1);
                let idf = (num_docs as f64 / doc_freq as f64).ln().max(1e-6);
                (freq as f64 * idf, term_bytes)
            })
            .collect();
        scored.sort_by(|(left, left_bytes), (right, right_bytes)| {
            right
                .partial_cmp(left)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| left_bytes.cmp(right_bytes))
        });
        Ok(scored
            .into_iter()
            .take(limit)
            .filter_map(|(_, bytes)| String::from_utf8(bytes).ok())
            .collect())
    }

    /// Replaces the zero-frequency terms of `query` with the nearest
    /// dictionary term within edit distance 2 (highest document
    /// frequency wins). Sub-queries are corrected recursively.
    pub fn correct_query(&self, query: &Query) -> Result<Query> {
        let corrected = match query.clone() {
            Query::Term(term) => {
                if self.reader.doc_freq(&term) > 0 {
                    Query::Term(term)
                } else {
                    match self.best_correction(&term)? {
                        Some(correction) => Query::Term(correction),
                        None => Query::Term(term),
                    }
                }
            }
            Query::And(subqueries) => Query::And(
                subqueries
                    .iter()
                    .map(|subquery| self.correct_query(subquery))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Query::Or {
                subqueries,
                minimum_match,
                count_bonus,
            } => Query::Or {
                subqueries: subqueries
                    .iter()
                    .map(|subquery| self.correct_query(subquery))
                    .collect::<Result<Vec<_>>>()?,
                minimum_match,
                count_bonus,
            },
            other => other,
        };
        Ok(corrected)
    }

    fn best_correction(&self, term: &Term) -> Result<Option<Term>> {
        use levenshtein_automata::Distance;
        let text = match std::str::from_utf8(term.value_bytes()) {
            Ok(text) => text,
            Err(_) => return Ok(None),
        };
        let dfa = crate::query::lev_builder(2, true).build_dfa(text);
        let field = term.field();
        let mut best: Option<(u64, u8, Term)> = None;
        for segment in self.reader.segment_readers() {
            let field_prefix = Term::for_field(field);
            let mut streamer = segment.term_dict().stream_prefix(field_prefix.as_slice());
            while streamer.advance() {
                let value = &streamer.key()[4..];
                if let Distance::Exact(distance) = dfa.eval(value) {
                    if distance <= 2 {
                        let candidate = Term::from_bytes(streamer.key());
                        let doc_freq = self.reader.doc_freq(&candidate);
                        let better = match &best {
                            Some((best_freq, best_distance, _)) => {
                                (distance, std::cmp::Reverse(doc_freq))
                                    < (*best_distance, std::cmp::Reverse(*best_freq))
                            }
                            None => true,
                        };
                        if better {
                            best = Some((doc_freq, distance, candidate));
                        }
                    }
                }
            }
        }
        Ok(best.map(|(_, _, term)| term))
    }
}
