use super::Query;
use crate::common::BitSet;
use crate::core::{IndexReader, SegmentReader};
use crate::error::LexisError;
use crate::matcher::{
    AndMaybeMatcher, ChainedMatcher, ConstScoreMatcher, DisjunctionMaxMatcher, EmptyMatcher,
    EveryMatcher, ExclusionMatcher, IntersectionMatcher, Matcher, NestedChildrenMatcher,
    NestedParentMatcher, OrScoring, PhraseMatcher, RequireMatcher, UnionMatcher,
    VectorPhraseMatcher,
};
use crate::schema::{Field, Term};
use crate::scoring::{Scorer, ScoringContext, TermStatistics, Weighting};
use crate::DocId;
use crate::Result;
use std::sync::Arc;

impl Query {
    /// Compiles the query against a reader snapshot.
    ///
    /// The result is a chain of per-segment matchers, already rebased
    /// to index-wide document numbers.
    pub fn matcher(
        &self,
        reader: &IndexReader,
        weighting: &Arc<dyn Weighting>,
    ) -> Result<Box<dyn Matcher>> {
        let mut parts: Vec<(DocId, Box<dyn Matcher>)> = Vec::new();
        for segment_ord in 0..reader.segment_readers().len() {
            let base = reader.doc_bases()[segment_ord];
            let segment_matcher = self.segment_matcher(reader, segment_ord, weighting)?;
            parts.push((base, segment_matcher));
        }
        if parts.is_empty() {
            return Ok(Box::new(EmptyMatcher));
        }
        Ok(Box::new(ChainedMatcher::new(parts)))
    }

    /// Compiles the query against one segment, in local docnums.
    pub(crate) fn segment_matcher(
        &self,
        reader: &IndexReader,
        segment_ord: usize,
        weighting: &Arc<dyn Weighting>,
    ) -> Result<Box<dyn Matcher>> {
        let segment = &reader.segment_readers()[segment_ord];
        match self {
            Query::Empty => Ok(Box::new(EmptyMatcher)),
            Query::Every(None) => Ok(segment.all_docs_matcher()),
            Query::Every(Some(field)) => every_with_field(reader, segment, *field),
            Query::Term(term) => {
                validate_term_field(reader, term)?;
                Ok(Box::new(term_matcher(
                    reader, segment, weighting, term, false,
                )))
            }
            Query::And(subqueries) => {
                let children = subqueries
                    .iter()
                    .map(|subquery| subquery.segment_matcher(reader, segment_ord, weighting))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(IntersectionMatcher::new(children)))
            }
            Query::Or {
                subqueries,
                minimum_match,
                count_bonus,
            } => {
                let children = subqueries
                    .iter()
                    .map(|subquery| subquery.segment_matcher(reader, segment_ord, weighting))
                    .collect::<Result<Vec<_>>>()?;
                let scoring = match count_bonus {
                    Some(bonus) => OrScoring::CountBonus(bonus.0),
                    None => OrScoring::Sum,
                };
                Ok(Box::new(UnionMatcher::with_minimum_match(
                    children,
                    scoring,
                    *minimum_match,
                )))
            }
            Query::Not(inner) => {
                // a lone Not is resolved against the ambient
                // every-document matcher
                let negative = inner.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(ExclusionMatcher::new(
                    segment.all_docs_matcher(),
                    negative,
                )))
            }
            Query::AndNot { positive, negative } => {
                let positive = positive.segment_matcher(reader, segment_ord, weighting)?;
                let negative = negative.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(ExclusionMatcher::new(positive, negative)))
            }
            Query::AndMaybe { required, optional } => {
                let required = required.segment_matcher(reader, segment_ord, weighting)?;
                let optional = optional.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(AndMaybeMatcher::new(required, optional)))
            }
            Query::Require { scored, required } => {
                let scored = scored.segment_matcher(reader, segment_ord, weighting)?;
                let required = required.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(RequireMatcher::new(scored, required)))
            }
            Query::DisjunctionMax {
                subqueries,
                tie_break,
            } => {
                let children = subqueries
                    .iter()
                    .map(|subquery| subquery.segment_matcher(reader, segment_ord, weighting))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(DisjunctionMaxMatcher::new(children, tie_break.0)))
            }
            Query::ConstantScore { query, score } => {
                let inner = query.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(ConstScoreMatcher::new(inner, score.0)))
            }
            Query::Phrase {
                field,
                terms,
                slop,
            } => phrase_matcher(reader, segment, weighting, *field, terms, *slop),
            Query::Prefix { .. }
            | Query::Wildcard { .. }
            | Query::Regex { .. }
            | Query::Range { .. }
            | Query::Fuzzy { .. }
            | Query::Variants { .. } => {
                super::expand::expanded_matcher(self, reader, segment, weighting)
            }
            Query::NestedParent { parents, children } => {
                let parent_set =
                    segment_query_bitset(parents, reader, segment_ord, weighting)?;
                let children = children.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(NestedParentMatcher::new(
                    children,
                    Arc::new(parent_set),
                )))
            }
            Query::NestedChildren {
                parents,
                parent_query,
            } => {
                let parent_set =
                    segment_query_bitset(parents, reader, segment_ord, weighting)?;
                let parent_matcher =
                    parent_query.segment_matcher(reader, segment_ord, weighting)?;
                Ok(Box::new(NestedChildrenMatcher::new(
                    parent_matcher,
                    Arc::new(parent_set),
                    segment.max_doc(),
                    segment.live_docs().cloned(),
                )))
            }
        }
    }
}

fn validate_term_field(reader: &IndexReader, term: &Term) -> Result<()> {
    let field = term.field();
    if field.0 as usize >= reader.schema().num_fields() {
        return Err(LexisError::NoSuchField(field));
    }
    let entry = reader.schema().get_field_entry(field);
    if !entry.is_indexed() {
        return Err(LexisError::Query(format!(
            "field {:?} is not indexed",
            entry.name()
        )));
    }
    Ok(())
}

/// Builds the scorer of one term against one segment; statistics are
/// index-wide so scores do not depend on the segment layout.
pub(crate) fn term_scorer(
    reader: &IndexReader,
    segment: &SegmentReader,
    weighting: &Arc<dyn Weighting>,
    term: &Term,
    stats: TermStatistics,
) -> Box<dyn Scorer> {
    let field = term.field();
    let entry = reader.schema().get_field_entry(field);
    weighting.scorer(ScoringContext {
        field,
        field_boost: entry.field_type().boost(),
        collection: reader.statistics(),
        term: stats,
        lengths: segment.length_reader(field),
    })
}

pub(crate) fn term_matcher(
    reader: &IndexReader,
    segment: &SegmentReader,
    weighting: &Arc<dyn Weighting>,
    term: &Term,
    need_positions: bool,
) -> crate::postings::SegmentPostings {
    let stats = TermStatistics {
        doc_freq: reader.doc_freq(term),
        total_freq: reader.total_term_freq(term),
    };
    if stats.doc_freq == 0 {
        return crate::postings::SegmentPostings::empty();
    }
    let scorer = term_scorer(reader, segment, weighting, term, stats);
    segment.postings(term, need_positions, Some(scorer))
}

fn every_with_field(
    reader: &IndexReader,
    segment: &SegmentReader,
    field: Field,
) -> Result<Box<dyn Matcher>> {
    if field.0 as usize >= reader.schema().num_fields() {
        return Err(LexisError::NoSuchField(field));
    }
    let entry = reader.schema().get_field_entry(field);
    if let Some(lengths) = segment.length_reader(field) {
        return Ok(Box::new(EveryMatcher::with_predicate(
            segment.max_doc(),
            segment.live_docs().cloned(),
            Arc::new(move |doc| lengths.get(doc) > 0),
        )));
    }
    if entry.field_type().column_type().is_some() {
        let column = segment.column(field)?;
        return Ok(Box::new(EveryMatcher::with_predicate(
            segment.max_doc(),
            segment.live_docs().cloned(),
            Arc::new(move |doc| column.value(doc).is_some()),
        )));
    }
    Err(LexisError::FieldConfiguration(format!(
        "field {:?} has neither lengths nor a column; cannot test presence",
        entry.name()
    )))
}

fn phrase_matcher(
    reader: &IndexReader,
    segment: &SegmentReader,
    weighting: &Arc<dyn Weighting>,
    field: Field,
    terms: &[String],
    slop: u32,
) -> Result<Box<dyn Matcher>> {
    let entry = reader.schema().get_field_entry(field);
    let format = entry.field_type().posting_format().ok_or_else(|| {
        LexisError::Query(format!("field {:?} is not indexed", entry.name()))
    })?;
    if terms.len() < 2 {
        return Err(LexisError::Query(
            "a phrase requires at least two terms".to_string(),
        ));
    }
    let term_objects: Vec<Term> = terms
        .iter()
        .map(|text| Term::from_field_text(field, text))
        .collect();
    if format.has_positions() {
        let mut children = Vec::with_capacity(term_objects.len());
        for term in &term_objects {
            let child = term_matcher(reader, segment, weighting, term, true);
            if !child.is_active() {
                return Ok(Box::new(EmptyMatcher));
            }
            children.push(child);
        }
        return Ok(Box::new(PhraseMatcher::new(children, slop)));
    }
    if entry.field_type().has_vectors() {
        let vectors = segment.vector_reader(field).ok_or_else(|| {
            LexisError::FieldConfiguration(format!(
                "field {:?} declares vectors but the segment has none",
                entry.name()
            ))
        })?;
        let mut children = Vec::with_capacity(term_objects.len());
        let mut term_bytes = Vec::with_capacity(term_objects.len());
        for term in &term_objects {
            let child = term_matcher(reader, segment, weighting, term, false);
            if !child.is_active() {
                return Ok(Box::new(EmptyMatcher));
            }
            children.push(child);
            term_bytes.push(term.value_bytes().to_vec());
        }
        return Ok(Box::new(VectorPhraseMatcher::new(
            children, term_bytes, vectors, slop,
        )));
    }
    Err(LexisError::Query(format!(
        "field {:?} records neither positions nor vectors; phrases are not supported",
        entry.name()
    )))
}

/// Runs a query over one segment and collects the matching local
/// docnums into a bitmap.
pub(crate) fn segment_query_bitset(
    query: &Query,
    reader: &IndexReader,
    segment_ord: usize,
    weighting: &Arc<dyn Weighting>,
) -> Result<BitSet> {
    let segment = &reader.segment_readers()[segment_ord];
    let mut bitset = BitSet::with_max_value(segment.max_doc());
    let mut matcher = query.segment_matcher(reader, segment_ord, weighting)?;
    while matcher.is_active() {
        bitset.insert(matcher.doc());
        matcher.advance();
    }
    Ok(bitset)
}

/// Runs a query over the whole reader and collects the matching
/// index-wide docnums into a bitmap. Used for filters and masks.
pub fn query_bitset(
    query: &Query,
    reader: &IndexReader,
    weighting: &Arc<dyn Weighting>,
) -> Result<BitSet> {
    let mut bitset = BitSet::with_max_value(reader.max_doc());
    let mut matcher = query.matcher(reader, weighting)?;
    while matcher.is_active() {
        bitset.insert(matcher.doc());
        matcher.advance();
    }
    Ok(bitset)
}
