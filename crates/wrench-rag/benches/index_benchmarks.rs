//! Benchmarks for brute-force knowledge index search.
//!
//! Uses 2,000 atoms split across four vendors, roughly the size of a
//! maintenance manual library for a single site. Set `BENCH_FULL_SCALE=1`
//! to run with 20,000 atoms.

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

use wrench_rag::embedding::HashEmbedding;
use wrench_rag::{KnowledgeAtom, KnowledgeIndex};

const CI_ATOM_COUNT: usize = 2_000;
const FULL_SCALE_ATOM_COUNT: usize = 20_000;
const VENDORS: [&str; 4] = ["daikin", "mitsubishi", "carrier", "trane"];

fn atom_text(index: usize) -> String {
    format!(
        "Fault code E{} on the outdoor unit indicates a compressor protection trip. \
         Check refrigerant pressure, inspect the condenser fan and verify supply voltage. \
         Procedure reference {}",
        index % 97,
        index
    )
}

fn build_index(count: usize, embedder: &HashEmbedding) -> KnowledgeIndex {
    let index = KnowledgeIndex::new();
    for i in 0..count {
        let content = atom_text(i);
        let embedding = embedder.embed_text(&content).unwrap_or_default();
        index
            .insert(KnowledgeAtom {
                id: format!("atom-{}", i),
                vendor: VENDORS[i % VENDORS.len()].to_string(),
                embedding,
                content,
                updated_at: Utc::now(),
            })
            .unwrap();
    }
    index
}

fn bench_search(c: &mut Criterion) {
    let count = if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_ATOM_COUNT
    } else {
        CI_ATOM_COUNT
    };
    let embedder = HashEmbedding::new();
    let index = build_index(count, &embedder);
    let query = embedder
        .embed_text("compressor trip E12 outdoor unit")
        .unwrap_or_default();

    c.bench_function("knowledge_search_all_vendors", |b| {
        b.iter(|| index.search_atoms(&query, None, 5).unwrap())
    });

    c.bench_function("knowledge_search_vendor_filter", |b| {
        b.iter(|| index.search_atoms(&query, Some("daikin"), 5).unwrap())
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
