use lexis::indexer::HEAP_SIZE_MIN;
use lexis::schema::{text_options, Schema};
use lexis::{doc, Index, Query, SearchOptions};

#[test]
fn test_write_commit_fails() {
    let mut schema_builder = Schema::builder();
    let text_field = schema_builder.add_text_field("text", text_options());
    let index = Index::create_in_ram(schema_builder.build());

    let mut index_writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
    for _ in 0..100 {
        index_writer.add_document(doc!(text_field => "a")).unwrap();
    }
    index_writer.commit().unwrap();

    fail::cfg("RamStorage::atomic_write", "return(error_write_failed)").unwrap();
    for _ in 0..100 {
        index_writer.add_document(doc!(text_field => "b")).unwrap();
    }
    assert!(index_writer.commit().is_err());
    fail::cfg("RamStorage::atomic_write", "off").unwrap();

    // the failed commit left the previous generation authoritative
    let searcher = index.searcher().unwrap();
    let num_docs_containing = |s: &str| {
        searcher
            .search(&Query::term(text_field, s), &SearchOptions::unlimited())
            .unwrap()
            .scored_length()
    };
    assert_eq!(num_docs_containing("a"), 100);
    assert_eq!(num_docs_containing("b"), 0);
}
