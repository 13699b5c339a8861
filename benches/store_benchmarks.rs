use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use samyama_rdf::rdf::{Literal, NamedNode, RdfPredicate, RdfTerm, Triple, TriplePattern, TripleStore};
use samyama_rdf::SparqlDatabase;

fn iri(s: &str) -> RdfTerm {
    NamedNode::new(&format!("http://example.org/{}", s)).unwrap().into()
}

/// Ring of people: each knows the next, plus a name and an age
fn people(size: usize) -> Vec<Triple> {
    let mut triples = Vec::with_capacity(size * 3);
    for i in 0..size {
        let person = iri(&format!("p{}", i));
        triples.push(Triple::from_terms(person.clone(), iri("knows"), iri(&format!("p{}", (i + 1) % size))).unwrap());
        triples.push(
            Triple::from_terms(person.clone(), iri("name"), Literal::new_simple_literal(format!("Person{}", i)).into())
                .unwrap(),
        );
        triples.push(Triple::from_terms(person, iri("age"), Literal::integer((i % 100) as i64).into()).unwrap());
    }
    triples
}

/// Benchmark triple insertion with incremental index maintenance
fn bench_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("insertion");

    for size in [100, 1000, 10_000].iter() {
        let triples = people(*size);
        group.bench_with_input(BenchmarkId::new("incremental", size), &triples, |b, triples| {
            b.iter(|| {
                let mut store = TripleStore::new();
                for t in triples {
                    store.add(t);
                }
                criterion::black_box(store.len());
            });
        });
        group.bench_with_input(BenchmarkId::new("bulk", size), &triples, |b, triples| {
            b.iter(|| {
                let mut store = TripleStore::new();
                store.begin_bulk_load();
                for t in triples {
                    store.add(t);
                }
                store.build_all_indexes();
                criterion::black_box(store.len());
            });
        });
    }
    group.finish();
}

/// Benchmark single-pattern lookups against the permutation indices
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [1000, 10_000].iter() {
        let mut store = TripleStore::new();
        for t in people(*size) {
            store.add(&t);
        }
        let knows = RdfPredicate::new("http://example.org/knows").unwrap();
        let target = NamedNode::new("http://example.org/p7").unwrap();

        group.bench_with_input(BenchmarkId::new("by_object", size), size, |b, _| {
            let pattern = TriplePattern::new(None, Some(knows.clone()), Some(target.clone().into()));
            b.iter(|| criterion::black_box(store.lookup(&pattern).len()));
        });
        group.bench_with_input(BenchmarkId::new("by_predicate", size), size, |b, _| {
            let pattern = TriplePattern::new(None, Some(knows.clone()), None);
            b.iter(|| criterion::black_box(store.lookup(&pattern).len()));
        });
    }
    group.finish();
}

/// Benchmark a two-hop join with a filter
fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for size in [1000, 10_000].iter() {
        let mut db = SparqlDatabase::new();
        db.store_mut().register_prefix("ex", "http://example.org/");
        db.store_mut().begin_bulk_load();
        for t in people(*size) {
            db.store_mut().add(&t);
        }
        db.build_all_indexes();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let results = db
                    .evaluate_query(
                        "SELECT ?x ?z WHERE { ?x ex:knows ?y . ?y ex:knows ?z . ?z ex:age ?a FILTER(?a < 10) }",
                    )
                    .unwrap();
                criterion::black_box(results.len());
            });
        });
    }
    group.finish();
}

/// Benchmark transitive closure over a chain
fn bench_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");
    group.sample_size(10);

    for size in [10, 40].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut db = SparqlDatabase::new();
                db.store_mut().register_prefix("ex", "http://example.org/");
                for i in 0..size {
                    let s = iri(&format!("n{}", i));
                    let o = iri(&format!("n{}", i + 1));
                    db.store_mut().add(&Triple::from_terms(s, iri("next"), o).unwrap());
                }
                let outcome = db
                    .process_rule_definition("ex:next(?x, ?z) :- ex:next(?x, ?y), ex:next(?y, ?z).")
                    .unwrap();
                criterion::black_box(outcome.report.derived);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insertion, bench_lookup, bench_query, bench_inference);
criterion_main!(benches);
