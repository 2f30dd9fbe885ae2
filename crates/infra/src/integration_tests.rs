//! Integration tests for the full event-sourced pipeline.
//!
//! Tests: Command → EventStore → EventBus → Projections → ReadModels
//!
//! Verifies:
//! - Commands produce events that update read models correctly
//! - Rejected commands leave both the counter and the movement log untouched
//! - Low-stock episodes and acknowledgments track stock crossings
//! - Purchase-order receiving and stocktake completion drive the ledger

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use glowdesk_core::{AggregateId, StaffId};
    use glowdesk_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use glowdesk_inventory::{
        AdjustStock, AlertSeverity, CreateItem, InventoryCommand, InventoryItem, ItemId,
        MovementReason, MovementReference,
    };
    use glowdesk_purchasing::{
        AddOrderLine, CreatePurchaseOrder, GoodsReceived, LineReceipt, MarkOrdered, PurchaseOrder,
        PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus,
        ReceiveGoods,
    };
    use glowdesk_stocktake::{
        CompleteStocktake, RecordCount, SnapshotLine, StartStocktake, Stocktake, StocktakeCommand,
        StocktakeEvent, StocktakeId,
    };
    use glowdesk_suppliers::SupplierId;

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{InMemoryEventStore, StoredEvent};
    use crate::projections::low_stock::LowStockProjection;
    use crate::projections::movement_log::MovementLogProjection;
    use crate::projections::purchase_orders::{PurchaseOrderReadModel, PurchaseOrdersProjection};
    use crate::projections::stock_levels::{ItemReadModel, StockLevelsProjection};
    use crate::read_model::InMemoryReadStore;

    type Dispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    struct Pipeline {
        dispatcher: Dispatcher,
        stock_levels: Arc<StockLevelsProjection<Arc<InMemoryReadStore<ItemId, ItemReadModel>>>>,
        movement_log: Arc<MovementLogProjection>,
        low_stock: Arc<LowStockProjection>,
        purchase_orders: Arc<
            PurchaseOrdersProjection<
                Arc<InMemoryReadStore<PurchaseOrderId, PurchaseOrderReadModel>>,
            >,
        >,
    }

    fn setup() -> Pipeline {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> =
            Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(store, bus.clone());

        let stock_levels = Arc::new(StockLevelsProjection::new(Arc::new(
            InMemoryReadStore::new(),
        )));
        let movement_log = Arc::new(MovementLogProjection::new());
        let low_stock = Arc::new(LowStockProjection::new());
        let purchase_orders = Arc::new(PurchaseOrdersProjection::new(Arc::new(
            InMemoryReadStore::new(),
        )));

        // Subscribe to the bus BEFORE any events are published.
        let sub_ready = {
            let stock_levels = stock_levels.clone();
            let movement_log = movement_log.clone();
            let low_stock = low_stock.clone();
            let purchase_orders = purchase_orders.clone();
            let bus = bus.clone();
            let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
            std::thread::spawn(move || {
                let sub = bus.subscribe();
                let _ = ready_tx.send(());
                while let Ok(env) = sub.recv() {
                    let result = match env.aggregate_type() {
                        "inventory.item" => stock_levels
                            .apply_envelope(&env)
                            .and_then(|_| movement_log.apply_envelope(&env))
                            .and_then(|_| low_stock.apply_envelope(&env)),
                        "purchasing.order" => purchase_orders.apply_envelope(&env),
                        _ => Ok(()),
                    };
                    if let Err(e) = result {
                        eprintln!("Failed to apply envelope: {e:?}");
                    }
                }
            });
            ready_rx
        };
        // Ensure the subscriber is ready before returning (prevents missing early events).
        let _ = sub_ready.recv_timeout(std::time::Duration::from_secs(1));

        Pipeline {
            dispatcher,
            stock_levels,
            movement_log,
            low_stock,
            purchase_orders,
        }
    }

    /// Helper: wait a short time for the subscriber thread to drain the bus.
    fn wait_for_processing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    fn staff() -> (StaffId, String) {
        (StaffId::new(), "Dana".to_string())
    }

    fn create_item(pipeline: &Pipeline, opening_stock: i64, threshold: i64) -> ItemId {
        let agg = AggregateId::new();
        let item_id = ItemId::new(agg);
        let (performed_by, performed_by_name) = staff();

        pipeline
            .dispatcher
            .dispatch::<InventoryItem>(
                agg,
                "inventory.item",
                InventoryCommand::CreateItem(CreateItem {
                    item_id,
                    sku: format!("SKU-{agg}"),
                    name: "Keratin Mask 250ml".to_string(),
                    supplier_id: None,
                    cost_price_cents: 1_200,
                    retail_price_cents: Some(3_400),
                    opening_stock,
                    low_stock_threshold: threshold,
                    reorder_quantity: 10,
                    unit_of_measure: "jar".to_string(),
                    expires_on: None,
                    allow_negative_stock: false,
                    performed_by,
                    performed_by_name,
                    occurred_at: Utc::now(),
                }),
                |id| InventoryItem::empty(ItemId::new(id)),
            )
            .unwrap();

        item_id
    }

    fn adjust(
        pipeline: &Pipeline,
        item_id: ItemId,
        quantity: i64,
        reason: MovementReason,
        reference: Option<MovementReference>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let (performed_by, performed_by_name) = staff();
        pipeline.dispatcher.dispatch::<InventoryItem>(
            item_id.0,
            "inventory.item",
            InventoryCommand::AdjustStock(AdjustStock {
                item_id,
                quantity,
                reason,
                notes: None,
                reference,
                performed_by,
                performed_by_name,
                occurred_at: Utc::now(),
            }),
            |id| InventoryItem::empty(ItemId::new(id)),
        )
    }

    #[test]
    fn create_and_adjust_updates_read_models() {
        let pipeline = setup();
        let item_id = create_item(&pipeline, 24, 5);

        adjust(&pipeline, item_id, -4, MovementReason::Sold, None).unwrap();
        wait_for_processing();

        let rm = pipeline.stock_levels.get(&item_id).unwrap();
        assert_eq!(rm.current_stock, 20);
        assert_eq!(rm.sku, format!("SKU-{}", item_id.0));

        let movements = pipeline.movement_log.list_for_item(item_id);
        assert_eq!(movements.len(), 2);
        // Newest first.
        assert_eq!(movements[0].reason, MovementReason::Sold);
        assert_eq!(movements[0].previous_stock, 24);
        assert_eq!(movements[0].new_stock, 20);
        assert_eq!(movements[1].reason, MovementReason::InitialStock);

        // The counter equals the fold of the ledger.
        let ledger_sum: i64 = movements
            .iter()
            .map(|m| match m.direction {
                glowdesk_inventory::MovementDirection::In => m.quantity,
                glowdesk_inventory::MovementDirection::Out => -m.quantity,
            })
            .sum();
        assert_eq!(ledger_sum, rm.current_stock);
    }

    #[test]
    fn rejected_overdraw_leaves_counter_and_ledger_unchanged() {
        let pipeline = setup();
        let item_id = create_item(&pipeline, 3, 5);
        wait_for_processing();

        let before_stock = pipeline.stock_levels.get(&item_id).unwrap().current_stock;
        let before_movements = pipeline.movement_log.list_for_item(item_id).len();

        let err = adjust(&pipeline, item_id, -4, MovementReason::Sold, None).unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));
        wait_for_processing();

        assert_eq!(
            pipeline.stock_levels.get(&item_id).unwrap().current_stock,
            before_stock
        );
        assert_eq!(
            pipeline.movement_log.list_for_item(item_id).len(),
            before_movements
        );
    }

    #[test]
    fn low_stock_episodes_reset_acknowledgment_on_recovery() {
        let pipeline = setup();
        let item_id = create_item(&pipeline, 10, 5);
        wait_for_processing();
        assert!(pipeline.low_stock.alert_for(item_id).is_none());

        // 10 → 2: warning.
        adjust(&pipeline, item_id, -8, MovementReason::Sold, None).unwrap();
        wait_for_processing();
        let alert = pipeline.low_stock.alert_for(item_id).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(alert.acknowledgment.is_none());

        let (by, by_name) = staff();
        pipeline
            .low_stock
            .acknowledge(item_id, by, by_name, Utc::now())
            .unwrap();

        // 2 → 0: critical, same episode, acknowledgment sticks.
        adjust(&pipeline, item_id, -2, MovementReason::Sold, None).unwrap();
        wait_for_processing();
        let alert = pipeline.low_stock.alert_for(item_id).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert!(alert.acknowledgment.is_some());
        let first_episode = alert.episode;

        // Restock above threshold: alert clears.
        adjust(&pipeline, item_id, 20, MovementReason::Received, None).unwrap();
        wait_for_processing();
        assert!(pipeline.low_stock.alert_for(item_id).is_none());

        // Drop again: fresh, unacknowledged episode.
        adjust(&pipeline, item_id, -16, MovementReason::UsedInService, None).unwrap();
        wait_for_processing();
        let alert = pipeline.low_stock.alert_for(item_id).unwrap();
        assert_eq!(alert.episode, first_episode + 1);
        assert!(alert.acknowledgment.is_none());
    }

    fn receive_order(
        pipeline: &Pipeline,
        order_id: PurchaseOrderId,
        item_id: ItemId,
        quantity: i64,
    ) -> GoodsReceived {
        let (performed_by, performed_by_name) = staff();
        let committed = pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                order_id.0,
                "purchasing.order",
                PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                    order_id,
                    receipts: vec![LineReceipt {
                        item_id,
                        quantity,
                        notes: None,
                    }],
                    performed_by,
                    performed_by_name,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();

        let received: PurchaseOrderEvent =
            serde_json::from_value(committed[0].payload.clone()).unwrap();
        let received = match received {
            PurchaseOrderEvent::GoodsReceived(e) => e,
            other => panic!("Expected GoodsReceived, got {other:?}"),
        };

        // The application layer reflects each receipt line in the ledger.
        for line in &received.receipts {
            adjust(
                pipeline,
                line.item_id,
                line.quantity,
                MovementReason::Received,
                Some(MovementReference::purchase_order(order_id.0)),
            )
            .unwrap();
        }

        received
    }

    #[test]
    fn receiving_in_two_deliveries_completes_the_order_and_the_ledger() {
        let pipeline = setup();
        let item_id = create_item(&pipeline, 0, 5);

        let agg = AggregateId::new();
        let order_id = PurchaseOrderId::new(agg);
        let supplier_id = SupplierId::new(AggregateId::new());

        pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                agg,
                "purchasing.order",
                PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                    order_id,
                    order_number: "PO-1001".to_string(),
                    supplier_id,
                    expected_delivery: None,
                    tax_cents: 0,
                    shipping_cents: 0,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();
        pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                agg,
                "purchasing.order",
                PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                    order_id,
                    item_id,
                    quantity_ordered: 20,
                    unit_cost_cents: 1_200,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();
        pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                agg,
                "purchasing.order",
                PurchaseOrderCommand::MarkOrdered(MarkOrdered {
                    order_id,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();

        let received = receive_order(&pipeline, order_id, item_id, 12);
        assert_eq!(received.status_after, PurchaseOrderStatus::PartiallyReceived);
        wait_for_processing();

        let rm = pipeline.purchase_orders.get(&order_id).unwrap();
        assert_eq!(rm.status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(rm.lines[0].quantity_received, 12);
        assert_eq!(pipeline.stock_levels.get(&item_id).unwrap().current_stock, 12);

        let received = receive_order(&pipeline, order_id, item_id, 8);
        assert_eq!(received.status_after, PurchaseOrderStatus::Received);
        wait_for_processing();

        let rm = pipeline.purchase_orders.get(&order_id).unwrap();
        assert_eq!(rm.status, PurchaseOrderStatus::Received);
        assert_eq!(rm.lines[0].quantity_received, 20);
        assert_eq!(pipeline.stock_levels.get(&item_id).unwrap().current_stock, 20);

        let movements = pipeline.movement_log.list_for_item(item_id);
        let po_movements: Vec<_> = movements
            .iter()
            .filter(|m| m.reference.is_some_and(|r| r.id == order_id.0))
            .collect();
        assert_eq!(po_movements.len(), 2);
    }

    #[test]
    fn resubmitted_receipt_double_applies_by_design() {
        // The receiving path is an append-only ledger, not a replay-safe
        // command log: the same receipt submitted twice is recorded twice.
        let pipeline = setup();
        let item_id = create_item(&pipeline, 0, 5);

        let agg = AggregateId::new();
        let order_id = PurchaseOrderId::new(agg);

        pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                agg,
                "purchasing.order",
                PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                    order_id,
                    order_number: "PO-1002".to_string(),
                    supplier_id: SupplierId::new(AggregateId::new()),
                    expected_delivery: None,
                    tax_cents: 0,
                    shipping_cents: 0,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();
        pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                agg,
                "purchasing.order",
                PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                    order_id,
                    item_id,
                    quantity_ordered: 20,
                    unit_cost_cents: 1_200,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();
        pipeline
            .dispatcher
            .dispatch::<PurchaseOrder>(
                agg,
                "purchasing.order",
                PurchaseOrderCommand::MarkOrdered(MarkOrdered {
                    order_id,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();

        receive_order(&pipeline, order_id, item_id, 12);
        let received = receive_order(&pipeline, order_id, item_id, 12);
        wait_for_processing();

        assert!(received.receipts[0].over_receipt);
        assert_eq!(received.receipts[0].cumulative_received, 24);
        // Both deliveries landed in the ledger: that is the expected (if
        // dangerous) behavior, not something to silently dedupe.
        assert_eq!(pipeline.stock_levels.get(&item_id).unwrap().current_stock, 24);
        assert_eq!(
            pipeline
                .movement_log
                .list_for_item(item_id)
                .iter()
                .filter(|m| m.reason == MovementReason::Received)
                .count(),
            2
        );
    }

    #[test]
    fn stocktake_corrections_use_the_frozen_snapshot() {
        let pipeline = setup();
        let item_id = create_item(&pipeline, 50, 5);
        wait_for_processing();

        // Snapshot the registry at stocktake start: expected = 50.
        let rm = pipeline.stock_levels.get(&item_id).unwrap();
        let agg = AggregateId::new();
        let stocktake_id = StocktakeId::new(agg);
        let (performed_by, performed_by_name) = staff();

        pipeline
            .dispatcher
            .dispatch::<Stocktake>(
                agg,
                "stocktake.session",
                StocktakeCommand::StartStocktake(StartStocktake {
                    stocktake_id,
                    name: "Evening count".to_string(),
                    lines: vec![SnapshotLine {
                        item_id,
                        expected_quantity: rm.current_stock,
                        unit_cost_cents: rm.cost_price_cents,
                    }],
                    performed_by,
                    performed_by_name,
                    occurred_at: Utc::now(),
                }),
                |id| Stocktake::empty(StocktakeId::new(id)),
            )
            .unwrap();

        // A sale lands while the count is under way: 50 → 45.
        adjust(&pipeline, item_id, -5, MovementReason::Sold, None).unwrap();

        let (performed_by, performed_by_name) = staff();
        pipeline
            .dispatcher
            .dispatch::<Stocktake>(
                agg,
                "stocktake.session",
                StocktakeCommand::RecordCount(RecordCount {
                    stocktake_id,
                    item_id,
                    counted_quantity: 48,
                    performed_by,
                    performed_by_name,
                    occurred_at: Utc::now(),
                }),
                |id| Stocktake::empty(StocktakeId::new(id)),
            )
            .unwrap();

        let (performed_by, performed_by_name) = staff();
        let committed = pipeline
            .dispatcher
            .dispatch::<Stocktake>(
                agg,
                "stocktake.session",
                StocktakeCommand::CompleteStocktake(CompleteStocktake {
                    stocktake_id,
                    performed_by,
                    performed_by_name,
                    occurred_at: Utc::now(),
                }),
                |id| Stocktake::empty(StocktakeId::new(id)),
            )
            .unwrap();

        let completed: StocktakeEvent =
            serde_json::from_value(committed[0].payload.clone()).unwrap();
        let completed = match completed {
            StocktakeEvent::StocktakeCompleted(e) => e,
            other => panic!("Expected StocktakeCompleted, got {other:?}"),
        };

        // Discrepancy is against the snapshot (48 - 50 = -2), not the live 45.
        assert_eq!(completed.corrections.len(), 1);
        assert_eq!(completed.corrections[0].discrepancy, -2);

        for correction in &completed.corrections {
            adjust(
                &pipeline,
                correction.item_id,
                correction.discrepancy,
                MovementReason::StocktakeAdjustment,
                Some(MovementReference::stocktake(stocktake_id.0)),
            )
            .unwrap();
        }
        wait_for_processing();

        // 45 - 2 = 43.
        assert_eq!(pipeline.stock_levels.get(&item_id).unwrap().current_stock, 43);
    }
}
