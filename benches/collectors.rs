use criterion::{criterion_group, criterion_main, Criterion};
use lexis::collector::{FacetMapKind, FacetSpec};
use lexis::indexer::HEAP_SIZE_MIN;
use lexis::schema::{text_options, NumericOptions, Schema};
use lexis::{doc, Index, Query, SearchOptions};
use rand::seq::SliceRandom;
use rand::thread_rng;

fn build_index() -> (Index, lexis::schema::Field, lexis::schema::Field) {
    let mut schema_builder = Schema::builder();
    let content = schema_builder.add_text_field("content", text_options());
    let category = schema_builder.add_u64_field("category", NumericOptions::default().set_column());
    let index = Index::create_in_ram(schema_builder.build());

    let mut docs = vec![];
    for val in 0..50u64 {
        for _ in 0..val * val {
            docs.push(doc!(content => "token", category => val));
        }
    }
    // 40425 docs
    docs[..].shuffle(&mut thread_rng());

    let mut index_writer = index.writer(HEAP_SIZE_MIN, 1).unwrap();
    for doc in docs {
        index_writer.add_document(doc).unwrap();
    }
    index_writer.commit().unwrap();
    (index, content, category)
}

pub fn bench_facet_collector(b: &mut Criterion) {
    let (index, content, category) = build_index();
    b.bench_function("facet_collector", |b| {
        let searcher = index.searcher().unwrap();
        let mut options = SearchOptions::unlimited();
        options.grouped_by = vec![(
            "category".to_string(),
            FacetSpec::field(category),
            FacetMapKind::Count,
        )];
        b.iter(|| {
            searcher
                .search(&Query::term(content, "token"), &options)
                .unwrap();
        });
    });
}

pub fn bench_top_k_collector(b: &mut Criterion) {
    let (index, content, _category) = build_index();
    b.bench_function("top_k_collector", |b| {
        let searcher = index.searcher().unwrap();
        b.iter(|| {
            searcher
                .search(&Query::term(content, "token"), &SearchOptions::with_limit(10))
                .unwrap();
        });
    });
}

criterion_group!(benches, bench_facet_collector, bench_top_k_collector);
criterion_main!(benches);
