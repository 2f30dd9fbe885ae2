use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use glowdesk_core::{AggregateId, StaffId};
use glowdesk_events::{EventEnvelope, InMemoryEventBus};
use glowdesk_infra::command_dispatcher::CommandDispatcher;
use glowdesk_infra::event_store::InMemoryEventStore;
use glowdesk_inventory::{
    AdjustStock, CreateItem, InventoryCommand, InventoryItem, ItemId, MovementReason,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Naive CRUD simulation: direct key-value updates (no events, no history).
#[derive(Debug, Clone)]
struct NaiveCrudStore {
    inner: Arc<RwLock<HashMap<AggregateId, i64>>>,
}

impl NaiveCrudStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn create(&self, item_id: AggregateId) {
        let mut map = self.inner.write().unwrap();
        map.insert(item_id, 0);
    }

    fn adjust_stock(&self, item_id: AggregateId, delta: i64) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        if let Some(stock) = map.get_mut(&item_id) {
            let new_stock = *stock + delta;
            if new_stock < 0 {
                return Err(());
            }
            *stock = new_stock;
            Ok(())
        } else {
            Err(())
        }
    }
}

type Dispatcher = CommandDispatcher<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

fn setup_dispatcher() -> (Dispatcher, AggregateId, ItemId) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let agg = AggregateId::new();
    let item_id = ItemId::new(agg);

    dispatcher
        .dispatch::<InventoryItem>(
            agg,
            "inventory.item",
            InventoryCommand::CreateItem(CreateItem {
                item_id,
                sku: "BENCH-1".to_string(),
                name: "Bench item".to_string(),
                supplier_id: None,
                cost_price_cents: 100,
                retail_price_cents: None,
                opening_stock: 0,
                low_stock_threshold: 0,
                reorder_quantity: 0,
                unit_of_measure: "unit".to_string(),
                expires_on: None,
                allow_negative_stock: false,
                performed_by: StaffId::new(),
                performed_by_name: "bench".to_string(),
                occurred_at: Utc::now(),
            }),
            |id| InventoryItem::empty(ItemId::new(id)),
        )
        .unwrap();

    (dispatcher, agg, item_id)
}

fn adjust_command(item_id: ItemId, quantity: i64) -> InventoryCommand {
    InventoryCommand::AdjustStock(AdjustStock {
        item_id,
        quantity,
        reason: MovementReason::Received,
        notes: None,
        reference: None,
        performed_by: StaffId::new(),
        performed_by_name: "bench".to_string(),
        occurred_at: Utc::now(),
    })
}

/// Latency of one adjustment through the full pipeline, at varying stream
/// depths: rehydration replays the whole history, so depth is the knob that
/// matters.
fn bench_adjust_latency_by_history_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjust_latency_by_history_depth");

    for depth in [10u64, 100, 1_000] {
        let (dispatcher, agg, item_id) = setup_dispatcher();
        for _ in 0..depth {
            dispatcher
                .dispatch::<InventoryItem>(agg, "inventory.item", adjust_command(item_id, 1), |id| {
                    InventoryItem::empty(ItemId::new(id))
                })
                .unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                dispatcher
                    .dispatch::<InventoryItem>(
                        agg,
                        "inventory.item",
                        black_box(adjust_command(item_id, 1)),
                        |id| InventoryItem::empty(ItemId::new(id)),
                    )
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Event-sourced adjustments vs a naive counter update, for context on what
/// the audit trail costs.
fn bench_adjust_throughput_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjust_throughput");
    group.throughput(Throughput::Elements(1));

    group.bench_function("event_sourced", |b| {
        let (dispatcher, agg, item_id) = setup_dispatcher();
        b.iter(|| {
            dispatcher
                .dispatch::<InventoryItem>(
                    agg,
                    "inventory.item",
                    black_box(adjust_command(item_id, 1)),
                    |id| InventoryItem::empty(ItemId::new(id)),
                )
                .unwrap()
        });
    });

    group.bench_function("naive_crud", |b| {
        let store = NaiveCrudStore::new();
        let item_id = AggregateId::new();
        store.create(item_id);
        b.iter(|| store.adjust_stock(black_box(item_id), 1).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_adjust_latency_by_history_depth,
    bench_adjust_throughput_vs_naive_crud
);
criterion_main!(benches);
