use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use tradeerp_core::{LotId, ProductId};
use tradeerp_infra::services::AllocateOutbound;
use tradeerp_infra::{CostingEngine, EngineConfig, InMemoryLotLedger};
use tradeerp_inventory::{
    InventoryLot, LandedCost, ReceiveLot, StorageLocation, plan_fee_distribution, plan_outbound,
};
use tradeerp_products::Product;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn receive_lot(product_id: ProductId, i: u64) -> ReceiveLot {
    ReceiveLot {
        product_id,
        receipt_id: None,
        lot_code: None,
        received_date: start() + Days::new(i % 28),
        quantity: 10 + (i % 7) as i64,
        costs: LandedCost::new(
            Decimal::from(100 + i),
            dec!(12.5),
            dec!(3.3),
            Decimal::ZERO,
        ),
        storage_location: StorageLocation::Warehouse,
        notes: None,
    }
}

/// Lots with a warehouse fee already accrued, so the fee term is exercised.
fn lots(count: u64) -> Vec<InventoryLot> {
    let product_id = ProductId::new();
    (0..count)
        .map(|i| {
            let mut lot = InventoryLot::receive(LotId::new(), receive_lot(product_id, i)).unwrap();
            lot.accrue_fee(dec!(7.77)).unwrap();
            lot
        })
        .collect()
}

fn bench_fifo_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_plan");

    for lot_count in [10u64, 100, 1000].iter() {
        let candidates = lots(*lot_count);
        let available: i64 = candidates.iter().map(|l| l.quantity_remaining()).sum();
        group.throughput(Throughput::Elements(*lot_count));
        group.bench_with_input(
            BenchmarkId::new("drain_all_lots", lot_count),
            &candidates,
            |b, candidates| {
                b.iter(|| black_box(plan_outbound(candidates, black_box(available), 2).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_fee_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fee_distribution_plan");
    let base_date = start() + Days::new(30);

    for lot_count in [10u64, 100, 1000].iter() {
        let candidates = lots(*lot_count);
        group.throughput(Throughput::Elements(*lot_count));
        group.bench_with_input(
            BenchmarkId::new("weighted_split", lot_count),
            &candidates,
            |b, candidates| {
                b.iter(|| {
                    black_box(plan_fee_distribution(candidates, dec!(10000), base_date, 2).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_allocate_and_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_outbound");

    for lot_count in [10u64, 100].iter() {
        let engine = CostingEngine::new(Arc::new(InMemoryLotLedger::new()), EngineConfig::default());
        let product = Product::new(ProductId::new(), "BENCH-1", "Bench product").unwrap();
        let product_id = product.id_typed();
        engine.upsert_product(product).unwrap();
        for i in 0..*lot_count {
            engine.receive_inbound(receive_lot(product_id, i)).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("allocate_then_reverse", lot_count),
            lot_count,
            |b, _| {
                b.iter(|| {
                    let result = engine
                        .allocate_outbound(AllocateOutbound {
                            product_id,
                            quantity: black_box(25),
                            outbound_date: start() + Days::new(40),
                            storage_location: None,
                            sale: None,
                            notes: None,
                        })
                        .unwrap();
                    engine.reverse_outbounds(&result.movement_ids).unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fifo_plan,
    bench_fee_plan,
    bench_allocate_and_reverse
);
criterion_main!(benches);
