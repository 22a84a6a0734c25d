//! # lexis
//!
//! A full-text search engine library.
//!
//! lexis maintains an on-disk inverted index made of immutable
//! segments and answers boolean and ranked queries against it. It is a
//! programmer's toolkit: no server, no UI, just the data structures,
//! the on-disk format, the single-writer/many-reader concurrency
//! discipline and the matcher/scorer algebra.
//!
//! ```rust
//! use lexis::schema::{id_options, stored_options, text_options, Schema};
//! use lexis::{doc, Index, Query, SearchOptions};
//!
//! # fn main() -> lexis::Result<()> {
//! let mut schema_builder = Schema::builder();
//! let title = schema_builder.add_text_field("title", text_options().set_stored());
//! let path = schema_builder.add_text_field("path", id_options() | stored_options());
//! let content = schema_builder.add_text_field("content", text_options());
//! let index = Index::create_in_ram(schema_builder.build());
//!
//! let mut writer = index.writer(lexis::indexer::HEAP_SIZE_MIN, 1)?;
//! writer.add_document(doc!(
//!     title => "First document",
//!     path => "/a",
//!     content => "This is the first document we've added",
//! ))?;
//! writer.add_document(doc!(
//!     title => "Second document",
//!     path => "/b",
//!     content => "The second one is even more interesting",
//! ))?;
//! writer.commit()?;
//!
//! let searcher = index.searcher()?;
//! let results = searcher.search(&Query::term(content, "first"), &SearchOptions::default())?;
//! assert_eq!(results.scored_length(), 1);
//! let stored = searcher.document(results.hits[0].doc)?;
//! assert_eq!(stored.get_first(path).unwrap().text(), Some("/a"));
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

#[macro_use]
mod macros;

pub mod collector;
pub mod column;
pub mod common;
pub mod core;
mod error;
pub mod fieldlength;
pub mod indexer;
pub mod matcher;
pub mod postings;
pub mod query;
pub mod schema;
pub mod scoring;
pub mod storage;
pub mod store;
pub mod termdict;
pub mod tokenizer;
pub mod vector;

pub use crate::collector::Results;
pub use crate::core::{Index, IndexReader, SearchOptions, Searcher};
pub use crate::error::LexisError;
pub use crate::query::Query;
pub use crate::schema::{Document, Schema, Term};

/// A document number local to a segment, or rebased index-wide by a
/// reader's document bases.
pub type DocId = u32;

/// Score of a document against a query.
pub type Score = f32;

/// Timestamps carried by date values.
pub type DateTime = chrono::DateTime<chrono::Utc>;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, LexisError>;

#[cfg(test)]
mod tests {
    use crate::collector::{FacetKey, FacetMapKind, FacetSpec};
    use crate::indexer::{CommitOptions, MergeMode, NoMergePolicy, HEAP_SIZE_MIN};
    use crate::query::Query;
    use crate::schema::{
        id_options, stored_options, text_options, NumericOptions, Schema,
    };
    use crate::{Index, LexisError, SearchOptions};
    use std::ops::Bound;

    fn doc_count_schema() -> (Schema, crate::schema::Field, crate::schema::Field, crate::schema::Field) {
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", text_options().set_stored());
        let path = builder.add_text_field("path", id_options() | stored_options());
        let content = builder.add_text_field("content", text_options());
        (builder.build(), title, path, content)
    }

    #[test]
    fn test_basic_index_and_search() {
        let (schema, title, path, content) = doc_count_schema();
        let index = Index::create_in_ram(schema);
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(
                title => "First document",
                path => "/a",
                content => "This is the first document we've added",
            ))
            .unwrap();
        writer
            .add_document(doc!(
                title => "Second document",
                path => "/b",
                content => "The second one is even more interesting",
            ))
            .unwrap();
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 2);
        let results = searcher
            .search(&Query::term(content, "first"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 1);
        let stored = searcher.document(results.hits[0].doc).unwrap();
        assert_eq!(stored.get_first(path).unwrap().text(), Some("/a"));
        assert_eq!(results.total.get_exact(), Some(1));
    }

    #[test]
    fn test_phrase_and_slop_boundaries() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(content => "Mary had a little lamb"))
            .unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let hits = |query: &Query| {
            searcher
                .search(query, &SearchOptions::default())
                .unwrap()
                .scored_length()
        };
        assert_eq!(hits(&Query::phrase(content, vec!["little", "lamb"], 1)), 1);
        assert_eq!(hits(&Query::phrase(content, vec!["little", "lamb"], 0)), 1);
        assert_eq!(hits(&Query::phrase(content, vec!["mary", "lamb"], 1)), 0);
        assert_eq!(hits(&Query::phrase(content, vec!["mary", "lamb"], 4)), 1);
        assert_eq!(hits(&Query::phrase(content, vec!["lamb", "little"], 1)), 0);
    }

    #[test]
    fn test_unique_field_update() {
        let mut builder = Schema::builder();
        let path = builder.add_text_field("path", id_options().set_unique() | stored_options());
        let content = builder.add_text_field("content", text_options().set_stored());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        for revision in 0..3 {
            writer
                .update_document(doc!(
                    path => "/x",
                    content => format!("revision {}", revision).as_str(),
                ))
                .unwrap();
        }
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        let results = searcher
            .search(&Query::term(path, "/x"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 1);
        let stored = searcher.document(results.hits[0].doc).unwrap();
        assert_eq!(
            stored.get_first(content).unwrap().text(),
            Some("revision 2")
        );
        assert_eq!(searcher.doc_count(), 1);
    }

    #[test]
    fn test_unique_update_across_commits() {
        let mut builder = Schema::builder();
        let path = builder.add_text_field("path", id_options().set_unique());
        let content = builder.add_text_field("content", text_options().set_stored());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .update_document(doc!(path => "/x", content => "old"))
            .unwrap();
        writer.commit().unwrap();
        writer
            .update_document(doc!(path => "/x", content => "new"))
            .unwrap();
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        let results = searcher
            .search(&Query::term(path, "/x"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 1);
        let stored = searcher.document(results.hits[0].doc).unwrap();
        assert_eq!(stored.get_first(content).unwrap().text(), Some("new"));
    }

    #[test]
    fn test_boolean_combinators() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "apple pie")).unwrap();
        writer.add_document(doc!(content => "apple")).unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let docs = |query: &Query| -> Vec<u32> {
            let mut docs: Vec<u32> = searcher
                .search(query, &SearchOptions::unlimited())
                .unwrap()
                .docs()
                .collect();
            docs.sort();
            docs
        };
        let apple = Query::term(content, "apple");
        let pie = Query::term(content, "pie");
        assert_eq!(docs(&Query::and(vec![apple.clone(), pie.clone()])), vec![0]);
        assert_eq!(docs(&Query::or(vec![apple.clone(), pie.clone()])), vec![0, 1]);
        assert_eq!(
            docs(&Query::AndNot {
                positive: Box::new(apple.clone()),
                negative: Box::new(pie.clone()),
            }),
            vec![1]
        );
        assert_eq!(docs(&Query::Not(Box::new(pie))), vec![1]);
        assert_eq!(docs(&Query::Every(None)), vec![0, 1]);
    }

    #[test]
    fn test_nested_group() {
        let mut builder = Schema::builder();
        let kind = builder.add_text_field("kind", id_options());
        let name = builder.add_text_field("name", id_options() | stored_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .group(|group| {
                group.add_document(doc!(kind => "class", name => "Index"));
                group.add_document(doc!(kind => "method", name => "add"));
                group.add_document(doc!(kind => "method", name => "close"));
                Ok(())
            })
            .unwrap();
        writer
            .group(|group| {
                group.add_document(doc!(kind => "class", name => "Searcher"));
                group.add_document(doc!(kind => "method", name => "search"));
                Ok(())
            })
            .unwrap();
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        let query = Query::NestedParent {
            parents: Box::new(Query::term(kind, "class")),
            children: Box::new(Query::term(name, "close")),
        };
        let results = searcher.search(&query, &SearchOptions::default()).unwrap();
        assert_eq!(results.scored_length(), 1);
        let parent = searcher.document(results.hits[0].doc).unwrap();
        assert_eq!(parent.get_first(name).unwrap().text(), Some("Index"));

        let children_query = Query::NestedChildren {
            parents: Box::new(Query::term(kind, "class")),
            parent_query: Box::new(Query::term(name, "Searcher")),
        };
        let results = searcher
            .search(&children_query, &SearchOptions::unlimited())
            .unwrap();
        let names: Vec<String> = results
            .docs()
            .map(|doc| {
                searcher
                    .document(doc)
                    .unwrap()
                    .get_first(name)
                    .unwrap()
                    .text()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["search".to_string()]);
    }

    #[test]
    fn test_sort_by_numeric_column() {
        let mut builder = Schema::builder();
        let price = builder.add_u64_field(
            "price",
            NumericOptions::default().set_indexed().set_column().set_stored(),
        );
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(price => 20u64)).unwrap();
        writer.add_document(doc!(price => 10u64)).unwrap();
        writer.add_document(doc!(price => 15u64)).unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let sorted_prices = |reverse: bool| -> Vec<u64> {
            let facet = if reverse {
                FacetSpec::field_reversed(price)
            } else {
                FacetSpec::field(price)
            };
            searcher
                .search(&Query::Every(None), &SearchOptions::sorted_by(facet))
                .unwrap()
                .docs()
                .map(|doc| {
                    searcher
                        .document(doc)
                        .unwrap()
                        .get_first(price)
                        .unwrap()
                        .u64_value()
                        .unwrap()
                })
                .collect()
        };
        assert_eq!(sorted_prices(false), vec![10, 15, 20]);
        assert_eq!(sorted_prices(true), vec![20, 15, 10]);
    }

    #[test]
    fn test_deletion_visibility() {
        let (schema, _title, path, content) = doc_count_schema();
        let index = Index::create_in_ram(schema);
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(path => "/a", content => "shared token alpha"))
            .unwrap();
        writer
            .add_document(doc!(path => "/b", content => "shared token beta"))
            .unwrap();
        writer
            .add_document(doc!(path => "/c", content => "lonely gamma"))
            .unwrap();
        writer.commit().unwrap();
        assert_eq!(index.searcher().unwrap().doc_count(), 3);

        writer.delete_by_term(crate::Term::from_field_text(content, "shared"));
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 1);
        for token in &["shared", "alpha", "beta"] {
            let results = searcher
                .search(&Query::term(content, token), &SearchOptions::default())
                .unwrap();
            assert_eq!(results.scored_length(), 0, "token {:?} survived", token);
        }
        let results = searcher
            .search(&Query::term(content, "gamma"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 1);
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "alpha")).unwrap();
        writer.commit().unwrap();

        let mut reader = index.reader().unwrap();
        let frozen = reader.clone();
        let count_alpha = |reader: &crate::IndexReader| {
            reader
                .searcher(None)
                .search(&Query::term(content, "alpha"), &SearchOptions::default())
                .unwrap()
                .scored_length()
        };
        assert_eq!(count_alpha(&frozen), 1);

        writer.add_document(doc!(content => "alpha again")).unwrap();
        writer.commit().unwrap();
        writer.add_document(doc!(content => "alpha thrice")).unwrap();
        writer.commit().unwrap();

        // the old snapshot is unaffected by the commits
        assert_eq!(count_alpha(&frozen), 1);
        assert!(reader.refresh().unwrap());
        assert_eq!(count_alpha(&reader), 3);
        assert_eq!(count_alpha(&frozen), 1);
    }

    #[test]
    fn test_merge_preserves_results() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.set_merge_policy(Box::new(NoMergePolicy));
        for batch in 0..4 {
            for i in 0..8 {
                let text = if (batch + i) % 2 == 0 {
                    "even token stream"
                } else {
                    "odd token flow"
                };
                writer.add_document(doc!(content => text)).unwrap();
            }
            writer.commit().unwrap();
        }
        writer.delete_by_term(crate::Term::from_field_text(content, "flow"));
        writer.commit().unwrap();

        let query = Query::term(content, "token");
        let before: Vec<u32> = index
            .searcher()
            .unwrap()
            .search(&query, &SearchOptions::unlimited())
            .unwrap()
            .docs()
            .collect();
        assert_eq!(index.reader().unwrap().segment_readers().len(), 4);

        writer
            .commit_with(CommitOptions {
                merge: MergeMode::Optimize,
            })
            .unwrap();
        let reader = index.reader().unwrap();
        assert_eq!(reader.segment_readers().len(), 1);
        let after = reader
            .searcher(None)
            .search(&query, &SearchOptions::unlimited())
            .unwrap();
        assert_eq!(after.scored_length(), before.len());
        // merged docnums are remapped but the matched set is the same
        // size and every doc still contains the token
        assert_eq!(after.total.get_exact(), Some(before.len() as u64));
    }

    #[test]
    fn test_idempotent_commit() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "something")).unwrap();
        let generation = writer.commit().unwrap();
        assert_eq!(writer.commit().unwrap(), generation);
        assert_eq!(writer.commit().unwrap(), generation);
        assert_eq!(index.current_generation().unwrap(), generation);
    }

    #[test]
    fn test_top_k_matches_brute_force() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        // repeated tokens make frequencies, and thus scores, vary
        for i in 0..200u32 {
            let text = format!(
                "{} {}",
                "needle ".repeat((i % 7 + 1) as usize),
                "hay ".repeat((i % 13 + 1) as usize)
            );
            writer.add_document(doc!(content => text.as_str())).unwrap();
        }
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();
        let query = Query::or(vec![
            Query::term(content, "needle"),
            Query::term(content, "hay"),
        ]);

        let brute_force: Vec<(u32, f32)> = {
            let mut all: Vec<(u32, f32)> = searcher
                .search(&query, &SearchOptions::unlimited())
                .unwrap()
                .hits
                .iter()
                .map(|hit| (hit.doc, hit.score.unwrap()))
                .collect();
            all.sort_by(|(left_doc, left_score), (right_doc, right_score)| {
                right_score
                    .partial_cmp(left_score)
                    .unwrap()
                    .then(left_doc.cmp(right_doc))
            });
            all.truncate(10);
            all
        };
        let top_k: Vec<(u32, f32)> = searcher
            .search(&query, &SearchOptions::with_limit(10))
            .unwrap()
            .hits
            .iter()
            .map(|hit| (hit.doc, hit.score.unwrap()))
            .collect();
        assert_eq!(top_k, brute_force);
    }

    #[test]
    fn test_expanding_queries() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let price = builder.add_u64_field("price", NumericOptions::default().set_indexed());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(content => "carpet", price => 10u64))
            .unwrap();
        writer
            .add_document(doc!(content => "car", price => 20u64))
            .unwrap();
        writer
            .add_document(doc!(content => "cartoon dog", price => 30u64))
            .unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let count = |query: &Query| {
            searcher
                .search(query, &SearchOptions::unlimited())
                .unwrap()
                .scored_length()
        };
        assert_eq!(
            count(&Query::Prefix {
                field: content,
                prefix: "car".to_string(),
            }),
            3
        );
        assert_eq!(
            count(&Query::Wildcard {
                field: content,
                pattern: "car*t".to_string(),
            }),
            1
        );
        assert_eq!(
            count(&Query::Regex {
                field: content,
                pattern: "car(pet|toon)".to_string(),
            }),
            2
        );
        assert_eq!(
            count(&Query::Fuzzy {
                field: content,
                text: "cor".to_string(),
                distance: 1,
                prefix_len: 0,
            }),
            1
        );
        assert_eq!(
            count(&Query::u64_range(
                price,
                Bound::Included(10),
                Bound::Excluded(30),
            )),
            2
        );
        assert_eq!(
            count(&Query::u64_range(price, Bound::Excluded(10), Bound::Unbounded)),
            2
        );
    }

    #[test]
    fn test_facet_grouping() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let price = builder.add_u64_field("price", NumericOptions::default().set_column());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        for (text, value) in &[("a", 5u64), ("a", 15), ("a", 5), ("a", 25)] {
            writer
                .add_document(doc!(content => *text, price => *value))
                .unwrap();
        }
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let mut options = SearchOptions::unlimited();
        options.grouped_by = vec![(
            "price".to_string(),
            FacetSpec::field(price),
            FacetMapKind::Count,
        )];
        let results = searcher
            .search(&Query::term(content, "a"), &options)
            .unwrap();
        let groups = results.groups("price").unwrap();
        assert_eq!(
            groups.get(&FacetKey::U64(5)),
            Some(&crate::collector::FacetGroup::Count(2))
        );
        assert_eq!(
            groups.get(&FacetKey::U64(15)),
            Some(&crate::collector::FacetGroup::Count(1))
        );
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_filter_and_mask() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let flag = builder.add_text_field("flag", id_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(content => "match", flag => "keep"))
            .unwrap();
        writer
            .add_document(doc!(content => "match", flag => "drop"))
            .unwrap();
        writer
            .add_document(doc!(content => "match", flag => "keep"))
            .unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let mut options = SearchOptions::unlimited();
        options.filter = Some(Query::term(flag, "keep"));
        let docs: Vec<u32> = searcher
            .search(&Query::term(content, "match"), &options)
            .unwrap()
            .docs()
            .collect();
        assert_eq!(docs, vec![0, 2]);

        let mut options = SearchOptions::unlimited();
        options.mask = Some(Query::term(flag, "keep"));
        let docs: Vec<u32> = searcher
            .search(&Query::term(content, "match"), &options)
            .unwrap()
            .docs()
            .collect();
        assert_eq!(docs, vec![1]);
    }

    #[test]
    fn test_matched_terms_reporting() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "alpha beta")).unwrap();
        writer.add_document(doc!(content => "alpha")).unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let mut options = SearchOptions::unlimited();
        options.terms = true;
        let results = searcher
            .search(
                &Query::or(vec![
                    Query::term(content, "alpha"),
                    Query::term(content, "beta"),
                ]),
                &options,
            )
            .unwrap();
        let terms_of = |doc: u32| -> Vec<String> {
            results.matched_terms[&doc]
                .iter()
                .map(|term| term.text().to_string())
                .collect()
        };
        assert_eq!(terms_of(0), vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(terms_of(1), vec!["alpha".to_string()]);
    }

    #[test]
    fn test_time_limit_partial_results() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        for _ in 0..500 {
            writer.add_document(doc!(content => "token")).unwrap();
        }
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let mut options = SearchOptions::unlimited();
        options.time_limit = Some(std::time::Duration::from_secs(0));
        match searcher.search(&Query::term(content, "token"), &options) {
            Err(LexisError::TimeLimit) => {}
            other => panic!("expected a TimeLimit error, got {:?}", other.map(|_| ())),
        }

        options.allow_partial = true;
        let results = searcher
            .search(&Query::term(content, "token"), &options)
            .unwrap();
        assert!(results.partial);
    }

    #[test]
    fn test_clear_commit_replaces_segments() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "old data")).unwrap();
        writer.commit().unwrap();
        writer.add_document(doc!(content => "new data")).unwrap();
        writer
            .commit_with(CommitOptions {
                merge: MergeMode::Clear,
            })
            .unwrap();

        let searcher = index.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 1);
        let results = searcher
            .search(&Query::term(content, "old"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 0);
        let results = searcher
            .search(&Query::term(content, "new"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 1);
    }

    #[test]
    fn test_writer_lock_is_exclusive() {
        let mut builder = Schema::builder();
        builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let _writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        assert!(matches::matches!(
            index.writer(HEAP_SIZE_MIN, 1),
            Err(LexisError::Locked(_))
        ));
    }

    #[test]
    fn test_writer_lock_released_on_drop() {
        let mut builder = Schema::builder();
        builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        {
            let _writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        }
        let _second = index.writer(HEAP_SIZE_MIN, 1).unwrap();
    }

    #[test]
    fn test_cancel_discards_buffered_docs() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "kept")).unwrap();
        writer.commit().unwrap();
        writer.add_document(doc!(content => "discarded")).unwrap();
        writer.cancel().unwrap();
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 1);
        let results = searcher
            .search(&Query::term(content, "discarded"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 0);
    }

    #[test]
    fn test_parallel_indexing() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(2 * HEAP_SIZE_MIN, 2).unwrap();
        for i in 0..100 {
            writer
                .add_document(doc!(content => format!("document number {}", i).as_str()))
                .unwrap();
        }
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 100);
        let results = searcher
            .search(&Query::term(content, "document"), &SearchOptions::unlimited())
            .unwrap();
        assert_eq!(results.scored_length(), 100);
    }

    #[test]
    fn test_delete_by_query_nested_group_is_atomic() {
        let mut builder = Schema::builder();
        let kind = builder.add_text_field("kind", id_options());
        let name = builder.add_text_field("name", id_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .group(|group| {
                group.add_document(doc!(kind => "class", name => "Doomed"));
                group.add_document(doc!(kind => "method", name => "a"));
                group.add_document(doc!(kind => "method", name => "b"));
                Ok(())
            })
            .unwrap();
        writer
            .group(|group| {
                group.add_document(doc!(kind => "class", name => "Kept"));
                group.add_document(doc!(kind => "method", name => "c"));
                Ok(())
            })
            .unwrap();
        writer.commit().unwrap();
        assert_eq!(index.searcher().unwrap().doc_count(), 5);

        writer.delete_by_query(Query::NestedParent {
            parents: Box::new(Query::term(kind, "class")),
            children: Box::new(Query::term(name, "a")),
        });
        writer.commit().unwrap();

        let searcher = index.searcher().unwrap();
        // the whole first group is gone, parent and children alike
        assert_eq!(searcher.doc_count(), 2);
        assert_eq!(
            searcher
                .search(&Query::term(name, "b"), &SearchOptions::default())
                .unwrap()
                .scored_length(),
            0
        );
        assert_eq!(
            searcher
                .search(&Query::term(name, "Kept"), &SearchOptions::default())
                .unwrap()
                .scored_length(),
            1
        );
    }

    #[test]
    fn test_vectors_key_terms_and_vector_phrase() {
        let mut builder = Schema::builder();
        // exists-only postings, but a forward vector: phrases go
        // through the vector matcher
        let content = builder.add_text_field(
            "content",
            text_options()
                .set_format(crate::schema::PostingFormat::exists_only())
                .set_vectors(),
        );
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(content => "mary had a little lamb"))
            .unwrap();
        writer
            .add_document(doc!(content => "a lamb and a little goat"))
            .unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let results = searcher
            .search(
                &Query::phrase(content, vec!["little", "lamb"], 0),
                &SearchOptions::unlimited(),
            )
            .unwrap();
        let docs: Vec<u32> = results.docs().collect();
        assert_eq!(docs, vec![0]);

        let key_terms = searcher.key_terms(&[0], content, 2).unwrap();
        assert_eq!(key_terms.len(), 2);
        // "mary" and "had" are unique to doc 0, so they outrank the
        // terms shared with doc 1
        assert!(key_terms.contains(&"mary".to_string()) || key_terms.contains(&"had".to_string()));
    }

    #[test]
    fn test_correct_query_suggests_close_terms() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer
            .add_document(doc!(content => "searching searched searches"))
            .unwrap();
        writer.commit().unwrap();
        let searcher = index.searcher().unwrap();

        let corrected = searcher
            .correct_query(&Query::term(content, "serching"))
            .unwrap();
        assert_eq!(corrected, Query::term(content, "searching"));
        // an existing term is left alone
        let untouched = searcher
            .correct_query(&Query::term(content, "searched"))
            .unwrap();
        assert_eq!(untouched, Query::term(content, "searched"));
    }

    #[test]
    fn test_reader_staleness_check() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let index = Index::create_in_ram(builder.build());
        let reader = index.reader().unwrap();
        assert!(reader.check_current().is_ok());
        let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
        writer.add_document(doc!(content => "newer")).unwrap();
        writer.commit().unwrap();
        match reader.check_current() {
            Err(LexisError::OutOfDate { held: 0, current: 1 }) => {}
            other => panic!("expected OutOfDate, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_extension_across_generations() {
        let mut builder = Schema::builder();
        let content = builder.add_text_field("content", text_options());
        let mut index = Index::create_in_ram(builder.build());
        {
            let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
            writer.add_document(doc!(content => "first")).unwrap();
            writer.commit().unwrap();
        }

        let mut extended = crate::schema::SchemaBuilder::from_schema(&index.schema());
        let tags = extended.add_text_field("tags", text_options());
        index.update_schema(extended.build()).unwrap();
        {
            let mut writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
            writer
                .add_document(doc!(content => "second", tags => "fresh"))
                .unwrap();
            writer.commit().unwrap();
        }

        // re-opening from storage sees the persisted, extended schema
        let reopened = Index::open(index.storage().box_clone()).unwrap();
        assert_eq!(reopened.schema().get_field("tags"), Some(tags));
        let reader = reopened.reader().unwrap();
        assert_eq!(reader.schema().get_field("tags"), Some(tags));
        let results = reader
            .searcher(None)
            .search(&Query::term(tags, "fresh"), &SearchOptions::default())
            .unwrap();
        assert_eq!(results.scored_length(), 1);
    }

    #[test]
    fn test_empty_index_error() {
        let storage = crate::storage::RamStorage::create();
        match Index::open(Box::new(storage)) {
            Err(LexisError::EmptyIndex) => {}
            _ => panic!("expected EmptyIndex"),
        }
    }
}
