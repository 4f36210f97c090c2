//! Benchmarks for translation, ingestion, materialization and checks.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use cheese_trace::graph::TripleStore;
use cheese_trace::query::{compliance_gaps, traceability_report};
use cheese_trace::rules::materialize;
use cheese_trace::translate::{LotRow, Translator};

/// Alternating milk/cheese lots: every cheese comes from the milk lot before
/// it, every 20th milk lot is high risk and every 50th skips its test.
fn rows(n: usize) -> Vec<LotRow> {
    (0..n)
        .map(|i| {
            let lot_id = format!("LOT{i:07}");
            if i % 2 == 0 {
                let level = if i % 20 == 0 { "High" } else { "low" };
                LotRow::new(
                    lot_id,
                    "milk",
                    &json!({
                        "sourceFarmId": format!("FARM{:03}", i % 17),
                        "riskAssessment": {"zoonosisIndicator": level},
                        "skipQualityTest": i % 50 == 0,
                    }),
                )
            } else {
                LotRow::new(
                    lot_id,
                    "cheese",
                    &json!({"sourceMilkId": format!("LOT{:07}", i - 1)}),
                )
            }
        })
        .collect()
}

fn populated_store(rows: &[LotRow]) -> TripleStore {
    let store = TripleStore::new();
    let translator = Translator::new();
    for row in rows {
        store.extend(translator.translate_at(row, 0.0));
    }
    store
}

fn bench_translate(c: &mut Criterion) {
    let translator = Translator::new();
    let rows = rows(1);
    let row = &rows[0];
    c.bench_function("translate_milk_row", |bench| {
        bench.iter(|| black_box(translator.translate_at(row, 0.0)))
    });
}

fn bench_ingest(c: &mut Criterion) {
    let rows = rows(500);
    c.bench_function("ingest_500_rows", |bench| {
        bench.iter(|| black_box(populated_store(&rows).len()))
    });
}

fn bench_materialize(c: &mut Criterion) {
    for n in [500, 10_000] {
        let rows = rows(n);
        c.bench_function(&format!("materialize_{n}_rows"), |bench| {
            bench.iter_batched(
                || populated_store(&rows),
                |store| black_box(materialize(&store)),
                BatchSize::LargeInput,
            )
        });
    }
}

fn bench_checks(c: &mut Criterion) {
    for n in [500, 10_000] {
        let store = populated_store(&rows(n));
        materialize(&store);
        c.bench_function(&format!("traceability_report_{n}"), |bench| {
            bench.iter(|| black_box(traceability_report(&store)))
        });
        c.bench_function(&format!("compliance_gaps_{n}"), |bench| {
            bench.iter(|| black_box(compliance_gaps(&store)))
        });
    }
}

criterion_group!(
    benches,
    bench_translate,
    bench_ingest,
    bench_materialize,
    bench_checks
);
criterion_main!(benches);
