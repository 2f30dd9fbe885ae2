use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use glowdesk_core::{AggregateId, DomainError, StaffId};
use glowdesk_events::{EventBus, EventEnvelope, InMemoryEventBus};
use glowdesk_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{
        EventFilter, EventQuery, EventQueryResult, EventStoreError, InMemoryEventStore,
        Pagination, StoredEvent,
    },
    projections::{
        low_stock::{LowStockAlert, LowStockProjection},
        movement_log::{MovementLogProjection, StockMovementRecord},
        purchase_orders::{PurchaseOrderReadModel, PurchaseOrdersProjection},
        stock_levels::{ItemReadModel, StockLevelsProjection},
        stocktakes::{StocktakeReadModel, StocktakesProjection},
        suppliers::{SupplierDirectoryProjection, SupplierReadModel},
    },
    read_model::InMemoryReadStore,
};
use glowdesk_inventory::{
    AdjustStock, CreateItem, InventoryCommand, InventoryItem, ItemId, ItemStatus, MovementReason,
    MovementReference,
};
use glowdesk_purchasing::{
    CreatePurchaseOrder, GoodsReceived, LineReceipt, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderId, ReceiptLine, ReceiveGoods,
};
use glowdesk_stocktake::{
    CompleteStocktake, SnapshotLine, StartStocktake, Stocktake, StocktakeCommand, StocktakeEvent,
    StocktakeId,
};
use glowdesk_suppliers::{DeleteSupplier, Supplier, SupplierCommand, SupplierId, SupplierStatus};

/// Realtime message broadcasted via SSE so UI layers can refresh.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

type Bus = InMemoryEventBus<EventEnvelope<serde_json::Value>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;
type StockLevels = StockLevelsProjection<Arc<InMemoryReadStore<ItemId, ItemReadModel>>>;
type Suppliers = SupplierDirectoryProjection<Arc<InMemoryReadStore<SupplierId, SupplierReadModel>>>;
type PurchaseOrders =
    PurchaseOrdersProjection<Arc<InMemoryReadStore<PurchaseOrderId, PurchaseOrderReadModel>>>;
type Stocktakes = StocktakesProjection<Arc<InMemoryReadStore<StocktakeId, StocktakeReadModel>>>;

/// Application services: infrastructure wiring plus the cross-aggregate
/// orchestration the HTTP handlers call into.
pub struct AppServices {
    dispatcher: Dispatcher,
    event_store: Arc<InMemoryEventStore>,
    stock_levels: Arc<StockLevels>,
    movement_log: Arc<MovementLogProjection>,
    low_stock: Arc<LowStockProjection>,
    suppliers: Arc<Suppliers>,
    purchase_orders: Arc<PurchaseOrders>,
    stocktakes: Arc<Stocktakes>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    po_sequence: AtomicU64,
}

/// In-memory infra wiring: store + bus + projections + subscriber loop.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());

    let stock_levels: Arc<StockLevels> = Arc::new(StockLevelsProjection::new(Arc::new(
        InMemoryReadStore::new(),
    )));
    let movement_log = Arc::new(MovementLogProjection::new());
    let low_stock = Arc::new(LowStockProjection::new());
    let suppliers: Arc<Suppliers> = Arc::new(SupplierDirectoryProjection::new(Arc::new(
        InMemoryReadStore::new(),
    )));
    let purchase_orders: Arc<PurchaseOrders> = Arc::new(PurchaseOrdersProjection::new(Arc::new(
        InMemoryReadStore::new(),
    )));
    let stocktakes: Arc<Stocktakes> = Arc::new(StocktakesProjection::new(Arc::new(
        InMemoryReadStore::new(),
    )));

    // Realtime channel (SSE): lossy broadcast, consumers refresh on notify.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> projections -> realtime notifications.
    {
        let sub = bus.subscribe();
        let stock_levels = stock_levels.clone();
        let movement_log = movement_log.clone();
        let low_stock = low_stock.clone();
        let suppliers = suppliers.clone();
        let purchase_orders = purchase_orders.clone();
        let stocktakes = stocktakes.clone();
        let realtime_tx = realtime_tx.clone();
        std::thread::spawn(move || {
            while let Ok(env) = sub.recv() {
                let at = env.aggregate_type().to_string();

                // Apply to the relevant projection(s) only.
                let apply_ok = match at.as_str() {
                    "inventory.item" => stock_levels
                        .apply_envelope(&env)
                        .and_then(|_| movement_log.apply_envelope(&env))
                        .and_then(|_| low_stock.apply_envelope(&env))
                        .map_err(|e| e.to_string()),
                    "suppliers.supplier" => {
                        suppliers.apply_envelope(&env).map_err(|e| e.to_string())
                    }
                    "purchasing.order" => purchase_orders
                        .apply_envelope(&env)
                        .map_err(|e| e.to_string()),
                    "stocktake.session" => {
                        stocktakes.apply_envelope(&env).map_err(|e| e.to_string())
                    }
                    _ => Ok(()),
                };

                if let Err(e) = apply_ok {
                    tracing::warn!("projection apply failed: {e}");
                    continue;
                }

                // Broadcast projection update (lossy; no backpressure on core).
                let _ = realtime_tx.send(RealtimeMessage {
                    topic: format!("{at}.projection_updated"),
                    payload: serde_json::json!({
                        "kind": "projection_update",
                        "aggregate_type": at,
                        "aggregate_id": env.aggregate_id().to_string(),
                        "sequence_number": env.sequence_number(),
                    }),
                });
            }
        });
    }

    let dispatcher = CommandDispatcher::new(store.clone(), bus);
    AppServices {
        dispatcher,
        event_store: store,
        stock_levels,
        movement_log,
        low_stock,
        suppliers,
        purchase_orders,
        stocktakes,
        realtime_tx,
        po_sequence: AtomicU64::new(1_000),
    }
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: glowdesk_core::Aggregate<Error = DomainError>,
        A::Event: glowdesk_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
    }

    // -------------------------
    // Inventory
    // -------------------------

    pub fn item_get(&self, item_id: &ItemId) -> Option<ItemReadModel> {
        self.stock_levels.get(item_id)
    }

    pub fn item_list(&self) -> Vec<ItemReadModel> {
        self.stock_levels.list()
    }

    pub fn movements(&self, item_id: Option<ItemId>) -> Vec<StockMovementRecord> {
        match item_id {
            Some(id) => self.movement_log.list_for_item(id),
            None => self.movement_log.list(),
        }
    }

    /// Create an item after catalog-level pre-checks (SKU uniqueness,
    /// supplier existence) the aggregate cannot see.
    pub fn create_item(&self, cmd: CreateItem) -> Result<Vec<StoredEvent>, DispatchError> {
        if self.stock_levels.sku_in_use(&cmd.sku) {
            return Err(DomainError::conflict(format!("sku {} is already in use", cmd.sku)).into());
        }
        if let Some(supplier_id) = cmd.supplier_id {
            if self.suppliers.get(&supplier_id).is_none() {
                return Err(DispatchError::Validation("unknown supplier".to_string()));
            }
        }

        let aggregate_id = cmd.item_id.0;
        self.dispatch::<InventoryItem>(
            aggregate_id,
            "inventory.item",
            InventoryCommand::CreateItem(cmd),
            |id| InventoryItem::empty(ItemId::new(id)),
        )
    }

    pub fn ledger_adjust(&self, cmd: AdjustStock) -> Result<Vec<StoredEvent>, DispatchError> {
        let aggregate_id = cmd.item_id.0;
        self.dispatch::<InventoryItem>(
            aggregate_id,
            "inventory.item",
            InventoryCommand::AdjustStock(cmd),
            |id| InventoryItem::empty(ItemId::new(id)),
        )
    }

    // -------------------------
    // Low-stock alerts
    // -------------------------

    pub fn active_alerts(&self) -> Vec<LowStockAlert> {
        self.low_stock.active_alerts()
    }

    pub fn acknowledge_alert(
        &self,
        item_id: ItemId,
        acknowledged_by: StaffId,
        acknowledged_by_name: String,
    ) -> Result<LowStockAlert, DomainError> {
        self.low_stock
            .acknowledge(item_id, acknowledged_by, acknowledged_by_name, Utc::now())
    }

    // -------------------------
    // Suppliers
    // -------------------------

    pub fn supplier_get(&self, supplier_id: &SupplierId) -> Option<SupplierReadModel> {
        self.suppliers.get(supplier_id)
    }

    pub fn supplier_list(&self) -> Vec<SupplierReadModel> {
        self.suppliers.list()
    }

    pub fn dispatch_supplier(
        &self,
        supplier_id: SupplierId,
        command: SupplierCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatch::<Supplier>(supplier_id.0, "suppliers.supplier", command, |id| {
            Supplier::empty(SupplierId::new(id))
        })
    }

    /// Delete a supplier, unless any item still references it.
    pub fn delete_supplier(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let referencing = self.stock_levels.items_for_supplier(supplier_id);
        if !referencing.is_empty() {
            return Err(DomainError::conflict(format!(
                "supplier is referenced by {} item(s)",
                referencing.len()
            ))
            .into());
        }

        self.dispatch_supplier(
            supplier_id,
            SupplierCommand::DeleteSupplier(DeleteSupplier {
                supplier_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    // -------------------------
    // Purchasing
    // -------------------------

    pub fn order_get(&self, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.purchase_orders.get(order_id)
    }

    pub fn order_list(&self) -> Vec<PurchaseOrderReadModel> {
        self.purchase_orders.list()
    }

    pub fn dispatch_order(
        &self,
        order_id: PurchaseOrderId,
        command: PurchaseOrderCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatch::<PurchaseOrder>(order_id.0, "purchasing.order", command, |id| {
            PurchaseOrder::empty(PurchaseOrderId::new(id))
        })
    }

    /// Create a purchase order with a generated order number, after checking
    /// the supplier exists and can still supply.
    pub fn create_order(
        &self,
        order_id: PurchaseOrderId,
        supplier_id: SupplierId,
        expected_delivery: Option<chrono::NaiveDate>,
        tax_cents: i64,
        shipping_cents: i64,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let supplier = self
            .suppliers
            .get(&supplier_id)
            .ok_or_else(|| DispatchError::Validation("unknown supplier".to_string()))?;
        if supplier.status != SupplierStatus::Active {
            return Err(DomainError::invariant("supplier is inactive").into());
        }

        self.dispatch_order(
            order_id,
            PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                order_id,
                order_number: self.next_order_number(),
                supplier_id,
                expected_delivery,
                tax_cents,
                shipping_cents,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn next_order_number(&self) -> String {
        // Sequential within the process; the projection guards against
        // collisions if the counter ever resets.
        loop {
            let n = self.po_sequence.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("PO-{n}");
            if !self.purchase_orders.order_number_in_use(&candidate) {
                return candidate;
            }
        }
    }

    /// Ensure an item exists in the registry before it lands on an order.
    pub fn ensure_item_exists(&self, item_id: ItemId) -> Result<(), DispatchError> {
        if self.stock_levels.get(&item_id).is_none() {
            return Err(DispatchError::Validation("unknown item".to_string()));
        }
        Ok(())
    }

    /// Receive a delivery: record it on the order, then reflect every receipt
    /// line in the stock ledger (reason `received`, referencing the order).
    ///
    /// Not idempotent across calls — resubmitting the same receipt records
    /// the delivery twice. Deduplication is the operator's responsibility.
    pub fn receive_order(
        &self,
        order_id: PurchaseOrderId,
        receipts: Vec<LineReceipt>,
        performed_by: StaffId,
        performed_by_name: String,
    ) -> Result<GoodsReceived, DispatchError> {
        for receipt in &receipts {
            self.ensure_item_exists(receipt.item_id)?;
        }

        let committed = self.dispatch_order(
            order_id,
            PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id,
                receipts,
                performed_by,
                performed_by_name: performed_by_name.clone(),
                occurred_at: Utc::now(),
            }),
        )?;

        let received = extract_goods_received(&committed)?;

        for line in &received.receipts {
            let adjust = AdjustStock {
                item_id: line.item_id,
                quantity: line.quantity,
                reason: MovementReason::Received,
                notes: receipt_notes(line),
                reference: Some(MovementReference::purchase_order(order_id.0)),
                performed_by,
                performed_by_name: performed_by_name.clone(),
                occurred_at: Utc::now(),
            };
            if let Err(e) = self.ledger_adjust(adjust) {
                // The receipt is already on the order; surface the gap loudly
                // rather than unwinding an append-only history.
                tracing::error!(
                    item_id = %line.item_id,
                    order_id = %order_id,
                    "failed to reflect receipt line in stock ledger: {e:?}"
                );
            }
        }

        Ok(received)
    }

    // -------------------------
    // Stocktakes
    // -------------------------

    pub fn stocktake_get(&self, stocktake_id: &StocktakeId) -> Option<StocktakeReadModel> {
        self.stocktakes.get(stocktake_id)
    }

    pub fn stocktake_list(&self) -> Vec<StocktakeReadModel> {
        self.stocktakes.list()
    }

    pub fn dispatch_stocktake(
        &self,
        stocktake_id: StocktakeId,
        command: StocktakeCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatch::<Stocktake>(stocktake_id.0, "stocktake.session", command, |id| {
            Stocktake::empty(StocktakeId::new(id))
        })
    }

    /// Start a stocktake, snapshotting expected quantities from the registry
    /// at this instant. With no explicit scope, every active item is counted.
    pub fn start_stocktake(
        &self,
        stocktake_id: StocktakeId,
        name: String,
        item_scope: Option<Vec<ItemId>>,
        performed_by: StaffId,
        performed_by_name: String,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let lines = match item_scope {
            Some(ids) => {
                let mut lines = Vec::with_capacity(ids.len());
                for id in ids {
                    let rm = self
                        .stock_levels
                        .get(&id)
                        .ok_or_else(|| DispatchError::Validation("unknown item".to_string()))?;
                    lines.push(SnapshotLine {
                        item_id: rm.item_id,
                        expected_quantity: rm.current_stock,
                        unit_cost_cents: rm.cost_price_cents,
                    });
                }
                lines
            }
            None => self
                .stock_levels
                .list()
                .into_iter()
                .filter(|rm| rm.status == ItemStatus::Active)
                .map(|rm| SnapshotLine {
                    item_id: rm.item_id,
                    expected_quantity: rm.current_stock,
                    unit_cost_cents: rm.cost_price_cents,
                })
                .collect(),
        };

        self.dispatch_stocktake(
            stocktake_id,
            StocktakeCommand::StartStocktake(StartStocktake {
                stocktake_id,
                name,
                lines,
                performed_by,
                performed_by_name,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Complete a stocktake and apply its corrective adjustments to the
    /// ledger. A correction the ledger rejects (e.g. it would overdraw an
    /// item that disallows negative stock) is logged and skipped; the
    /// stocktake still completes.
    pub fn complete_stocktake(
        &self,
        stocktake_id: StocktakeId,
        performed_by: StaffId,
        performed_by_name: String,
    ) -> Result<StocktakeCompletedOutcome, DispatchError> {
        let committed = self.dispatch_stocktake(
            stocktake_id,
            StocktakeCommand::CompleteStocktake(CompleteStocktake {
                stocktake_id,
                performed_by,
                performed_by_name: performed_by_name.clone(),
                occurred_at: Utc::now(),
            }),
        )?;

        let completed = extract_stocktake_completed(&committed)?;

        let mut applied = 0usize;
        let mut skipped = 0usize;
        for correction in &completed.corrections {
            let adjust = AdjustStock {
                item_id: correction.item_id,
                quantity: correction.discrepancy,
                reason: MovementReason::StocktakeAdjustment,
                notes: None,
                reference: Some(MovementReference::stocktake(stocktake_id.0)),
                performed_by,
                performed_by_name: performed_by_name.clone(),
                occurred_at: Utc::now(),
            };
            match self.ledger_adjust(adjust) {
                Ok(_) => applied += 1,
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        item_id = %correction.item_id,
                        stocktake_id = %stocktake_id,
                        "skipping stocktake correction: {e:?}"
                    );
                }
            }
        }

        Ok(StocktakeCompletedOutcome {
            corrections: completed.corrections.len(),
            applied,
            skipped,
        })
    }

    // -------------------------
    // Audit
    // -------------------------

    pub async fn query_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        self.event_store.query_events(filter, pagination).await
    }
}

/// Summary of a completed stocktake's ledger effect.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StocktakeCompletedOutcome {
    pub corrections: usize,
    pub applied: usize,
    pub skipped: usize,
}

fn receipt_notes(line: &ReceiptLine) -> Option<String> {
    let warning = line.over_receipt.then(|| {
        format!(
            "over-receipt: {} received of {} ordered",
            line.cumulative_received, line.quantity_ordered
        )
    });

    match (&line.notes, warning) {
        (Some(notes), Some(warning)) => Some(format!("{notes}; {warning}")),
        (Some(notes), None) => Some(notes.clone()),
        (None, warning) => warning,
    }
}

fn extract_goods_received(committed: &[StoredEvent]) -> Result<GoodsReceived, DispatchError> {
    for stored in committed {
        let event: PurchaseOrderEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        if let PurchaseOrderEvent::GoodsReceived(e) = event {
            return Ok(e);
        }
    }
    Err(DispatchError::Deserialize(
        "expected a goods_received event".to_string(),
    ))
}

fn extract_stocktake_completed(
    committed: &[StoredEvent],
) -> Result<glowdesk_stocktake::StocktakeCompleted, DispatchError> {
    for stored in committed {
        let event: StocktakeEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        if let StocktakeEvent::StocktakeCompleted(e) = event {
            return Ok(e);
        }
    }
    Err(DispatchError::Deserialize(
        "expected a completed event".to_string(),
    ))
}

/// Server-sent events stream of realtime projection updates.
pub fn sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(msg) => {
            let data = serde_json::to_string(&msg).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(msg.topic).data(data)))
        }
        // Lagged receivers just skip ahead.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
