use super::build::term_matcher;
use super::Query;
use crate::core::{IndexReader, SegmentReader};
use crate::error::LexisError;
use crate::matcher::{EmptyMatcher, Matcher, OrScoring, UnionMatcher};
use crate::schema::{Field, Term};
use crate::scoring::Weighting;
use crate::Result;
use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder, DFA};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex};

/// Cap on the number of terms an expanding query may enumerate.
pub const MAX_EXPANDED_TERMS: usize = 1024;

/// Levenshtein automaton builders are expensive to construct; they only
/// depend on `(distance, transposition)`, so they are built once and
/// shared.
static LEV_BUILDER_CACHE: Lazy<Mutex<HashMap<(u8, bool), Arc<LevenshteinAutomatonBuilder>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn lev_builder(distance: u8, transposition: bool) -> Arc<LevenshteinAutomatonBuilder> {
    let mut cache = LEV_BUILDER_CACHE
        .lock()
        .expect("levenshtein builder cache poisoned");
    cache
        .entry((distance, transposition))
        .or_insert_with(|| {
            Arc::new(LevenshteinAutomatonBuilder::new(distance, transposition))
        })
        .clone()
}

/// Compiles an expanding query (prefix/wildcard/regex/range/fuzzy/
/// variants) against one segment: enumerate the matching dictionary
/// terms, then union their postings.
pub(crate) fn expanded_matcher(
    query: &Query,
    reader: &IndexReader,
    segment: &SegmentReader,
    weighting: &Arc<dyn Weighting>,
) -> Result<Box<dyn Matcher>> {
    let terms: Vec<Term> = match query {
        Query::Prefix { field, prefix } => {
            collect_prefix(segment, *field, prefix.as_bytes(), None)?
        }
        Query::Wildcard { field, pattern } => {
            let regex = wildcard_to_regex(pattern);
            let compiled = compile_regex(&regex)?;
            let literal_prefix = wildcard_literal_prefix(pattern);
            collect_prefix(segment, *field, literal_prefix.as_bytes(), Some(&compiled))?
        }
        Query::Regex { field, pattern } => {
            let compiled = compile_regex(pattern)?;
            collect_prefix(segment, *field, b"", Some(&compiled))?
        }
        Query::Range {
            field,
            lower,
            upper,
        } => {
            let lower_key = match lower.as_bound() {
                Bound::Included(key) => Bound::Included(full_key(*field, key)),
                Bound::Excluded(key) => Bound::Excluded(full_key(*field, key)),
                Bound::Unbounded => Bound::Included(full_key(*field, b"")),
            };
            let upper_key = match upper.as_bound() {
                Bound::Included(key) => Bound::Included(full_key(*field, key)),
                Bound::Excluded(key) => Bound::Excluded(full_key(*field, key)),
                // unbounded above still stops at the end of the field
                Bound::Unbounded => match field_upper_bound(*field) {
                    Some(key) => Bound::Excluded(key),
                    None => Bound::Unbounded,
                },
            };
            collect_range(segment, *field, lower_key, upper_key)?
        }
        Query::Fuzzy {
            field,
            text,
            distance,
            prefix_len,
        } => {
            let dfa = lev_builder(*distance, true).build_dfa(text);
            let prefix: String = text.chars().take(*prefix_len).collect();
            collect_fuzzy(segment, *field, prefix.as_bytes(), &dfa, *distance)?
        }
        Query::Variants { field, variants } => variants
            .iter()
            .map(|variant| Term::from_field_text(*field, variant))
            .filter(|term| segment.term_info(term).is_some())
            .collect(),
        _ => unreachable!("expanded_matcher called on a non-expanding query"),
    };
    if terms.is_empty() {
        return Ok(Box::new(EmptyMatcher));
    }
    let mut children: Vec<Box<dyn Matcher>> = Vec::with_capacity(terms.len());
    for term in &terms {
        children.push(Box::new(term_matcher(
            reader, segment, weighting, term, false,
        )));
    }
    Ok(Box::new(UnionMatcher::new(children, OrScoring::Sum)))
}

fn compile_regex(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|err| LexisError::Query(format!("invalid regex: {}", err)))
}

fn full_key(field: Field, value: &[u8]) -> Vec<u8> {
    let mut key = field.0.to_be_bytes().to_vec();
    key.extend_from_slice(value);
    key
}

/// The key just past every term of `field`: the next field's prefix.
fn field_upper_bound(field: Field) -> Option<Vec<u8>> {
    field
        .0
        .checked_add(1)
        .map(|next| next.to_be_bytes().to_vec())
}

fn guard_cap(field: Field, count: usize) -> Result<()> {
    if count > MAX_EXPANDED_TERMS {
        Err(LexisError::TooManyTerms {
            field,
            cap: MAX_EXPANDED_TERMS,
        })
    } else {
        Ok(())
    }
}

fn collect_prefix(
    segment: &SegmentReader,
    field: Field,
    prefix: &[u8],
    filter: Option<&regex::Regex>,
) -> Result<Vec<Term>> {
    let full_prefix = full_key(field, prefix);
    let mut streamer = segment.term_dict().stream_prefix(&full_prefix);
    let mut terms = Vec::new();
    while streamer.advance() {
        let key = streamer.key();
        if let Some(regex) = filter {
            let value = &key[4..];
            match std::str::from_utf8(value) {
                Ok(text) if regex.is_match(text) => {}
                _ => continue,
            }
        }
        terms.push(Term::from_bytes(key));
        guard_cap(field, terms.len())?;
    }
    Ok(terms)
}

fn collect_range(
    segment: &SegmentReader,
    field: Field,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
) -> Result<Vec<Term>> {
    let lower_ref = match &lower {
        Bound::Included(key) => Bound::Included(&key[..]),
        Bound::Excluded(key) => Bound::Excluded(&key[..]),
        Bound::Unbounded => Bound::Unbounded,
    };
    let mut streamer = segment.term_dict().stream_range(lower_ref, upper);
    let mut terms = Vec::new();
    while streamer.advance() {
        terms.push(Term::from_bytes(streamer.key()));
        guard_cap(field, terms.len())?;
    }
    Ok(terms)
}

fn collect_fuzzy(
    segment: &SegmentReader,
    field: Field,
    prefix: &[u8],
    dfa: &DFA,
    max_distance: u8,
) -> Result<Vec<Term>> {
    let full_prefix = full_key(field, prefix);
    let mut streamer = segment.term_dict().stream_prefix(&full_prefix);
    let mut terms = Vec::new();
    while streamer.advance() {
        let value = &streamer.key()[4..];
        match dfa.eval(value) {
            Distance::Exact(distance) if distance <= max_distance => {
                terms.push(Term::from_bytes(streamer.key()));
                guard_cap(field, terms.len())?;
            }
            _ => {}
        }
    }
    Ok(terms)
}

/// Translates a shell-style wildcard pattern (`*`, `?`) into a regex.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex
}

/// The literal prefix of a wildcard pattern, used to bound the
/// dictionary scan.
fn wildcard_literal_prefix(pattern: &str) -> String {
    pattern
        .chars()
        .take_while(|&c| c != '*' && c != '?')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_translation() {
        assert_eq!(wildcard_to_regex("ab*c?"), "ab.*c.");
        assert_eq!(wildcard_to_regex("a.b"), "a\\.b");
        assert_eq!(wildcard_literal_prefix("abc*de"), "abc");
        assert_eq!(wildcard_literal_prefix("?x"), "");
    }
}
