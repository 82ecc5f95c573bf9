use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::Value as JsonValue;
use stockledger_core::{ProductId, ReservationId, SkuCode};
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::{InMemoryStockRecordStore, LedgerConfig, NewStockItem, StockLedger};
use stockledger_inventory::{Reserve, StockCommand, execute};

type Ledger = StockLedger<InMemoryStockRecordStore, InMemoryEventBus<EventEnvelope<JsonValue>>>;

fn ledger_with(on_hand: i64) -> (Ledger, SkuCode) {
    let ledger = StockLedger::with_config(
        InMemoryStockRecordStore::new(),
        InMemoryEventBus::new(),
        LedgerConfig::default().with_reservation_ttl(None),
    );
    let sku = SkuCode::parse("BENCH-1").unwrap();
    ledger
        .create_item(NewStockItem::new(ProductId::new(), sku.clone(), on_hand))
        .unwrap();
    (ledger, sku)
}

/// Pure decision + apply, no storage.
fn bench_engine_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_execute");

    for held in [0usize, 100, 1_000] {
        let (ledger, sku) = ledger_with(1_000_000);
        for i in 0..held {
            let id = ReservationId::parse(format!("held-{i}")).unwrap();
            ledger.reserve_stock(&sku, 1, &id, None).unwrap();
        }
        let record = ledger.get_by_sku_code(&sku).unwrap();
        let command = StockCommand::Reserve(Reserve {
            reservation_id: ReservationId::parse("next").unwrap(),
            quantity: 1,
            notes: None,
            expires_at: None,
            occurred_at: chrono::Utc::now(),
        });

        group.bench_with_input(BenchmarkId::new("reserve", held), &held, |b, _| {
            b.iter(|| black_box(execute(black_box(&record), black_box(&command)).unwrap()));
        });
    }

    group.finish();
}

/// Reserve + release round trip through the store, uncontended.
fn bench_ledger_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_round_trip");
    group.throughput(Throughput::Elements(2));

    let id = ReservationId::parse("cycle").unwrap();
    group.bench_function("reserve_then_release", |b| {
        // Closed reservation ids cannot be reused, so each iteration gets a fresh ledger.
        b.iter_batched(
            || ledger_with(10),
            |(ledger, sku)| {
                ledger.reserve_stock(&sku, 1, &id, None).unwrap();
                ledger.release_stock(&sku, 1, &id, None).unwrap();
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Several threads hammering one SKU, so most attempts lose the version race.
fn bench_contended_reserve(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_reserve");
    group.sample_size(20);

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 50));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let (ledger, sku) = ledger_with(1_000_000);
                let ledger = Arc::new(ledger);
                let barrier = Arc::new(Barrier::new(threads));
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let ledger = ledger.clone();
                        let barrier = barrier.clone();
                        let sku = sku.clone();
                        thread::spawn(move || {
                            barrier.wait();
                            for i in 0..50 {
                                let id = ReservationId::parse(format!("t{t}-{i}")).unwrap();
                                let _ = ledger.reserve_stock(&sku, 1, &id, None);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_engine_execute,
    bench_ledger_round_trip,
    bench_contended_reserve
);
criterion_main!(benches);
