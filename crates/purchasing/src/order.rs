use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use glowdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, StaffId};
use glowdesk_events::Event;
use glowdesk_inventory::ItemId;
use glowdesk_suppliers::SupplierId;

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// `draft → pending → ordered → partially_received → received`, with
/// cancellation possible until the first receipt. Receipt status is always
/// derived from the lines, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Pending,
    Ordered,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// Purchase order line item. `quantity_received` accumulates across receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
    pub unit_cost_cents: i64,
}

impl OrderLine {
    /// A line counts as complete once it has received at least what was
    /// ordered; over-receipt does not un-complete it.
    pub fn is_fully_received(&self) -> bool {
        self.quantity_received >= self.quantity_ordered
    }
}

/// Derive the receipt-progress status from the lines, or `None` when no
/// receipt has been recorded yet.
fn derive_receipt_status(lines: &[OrderLine]) -> Option<PurchaseOrderStatus> {
    if lines.is_empty() || lines.iter().all(|l| l.quantity_received == 0) {
        return None;
    }
    if lines.iter().all(OrderLine::is_fully_received) {
        Some(PurchaseOrderStatus::Received)
    } else {
        Some(PurchaseOrderStatus::PartiallyReceived)
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    order_number: String,
    supplier_id: Option<SupplierId>,
    status: PurchaseOrderStatus,
    lines: Vec<OrderLine>,
    order_date: Option<DateTime<Utc>>,
    expected_delivery: Option<NaiveDate>,
    tax_cents: i64,
    shipping_cents: i64,
    deleted: bool,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            supplier_id: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            order_date: None,
            expected_delivery: None,
            tax_cents: 0,
            shipping_cents: 0,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn order_date(&self) -> Option<DateTime<Utc>> {
        self.order_date
    }

    pub fn expected_delivery(&self) -> Option<NaiveDate> {
        self.expected_delivery
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn subtotal_cents(&self) -> i64 {
        self.lines
            .iter()
            .map(|l| l.quantity_ordered * l.unit_cost_cents)
            .sum()
    }

    pub fn tax_cents(&self) -> i64 {
        self.tax_cents
    }

    pub fn shipping_cents(&self) -> i64 {
        self.shipping_cents
    }

    pub fn total_cents(&self) -> i64 {
        self.subtotal_cents() + self.tax_cents + self.shipping_cents
    }

    /// Whether any receipt has been recorded. Once true, the order can no
    /// longer be edited, cancelled, or deleted.
    pub fn has_receipts(&self) -> bool {
        self.lines.iter().any(|l| l.quantity_received > 0)
    }

    fn is_editable(&self) -> bool {
        matches!(
            self.status,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Pending
        )
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub expected_delivery: Option<NaiveDate>,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddOrderLine (draft/pending only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOrderLine {
    pub order_id: PurchaseOrderId,
    pub item_id: ItemId,
    pub quantity_ordered: i64,
    pub unit_cost_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveOrderLine (draft/pending only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOrderLine {
    pub order_id: PurchaseOrderId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateOrderDetails (draft/pending only; `None` keeps the value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderDetails {
    pub order_id: PurchaseOrderId,
    pub supplier_id: Option<SupplierId>,
    pub expected_delivery: Option<NaiveDate>,
    pub tax_cents: Option<i64>,
    pub shipping_cents: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitOrder (draft → pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkOrdered (draft/pending → ordered). No stock effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOrdered {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// One line of a receipt request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceipt {
    pub item_id: ItemId,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Command: ReceiveGoods.
///
/// Not idempotent across calls: submitting the same receipt twice records the
/// delivery twice. That is the nature of an append-only ledger; deduplication
/// is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub order_id: PurchaseOrderId,
    pub receipts: Vec<LineReceipt>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (draft/pending/ordered only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteOrder (draft/pending only; receipt history must be preserved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddOrderLine(AddOrderLine),
    RemoveOrderLine(RemoveOrderLine),
    UpdateOrderDetails(UpdateOrderDetails),
    SubmitOrder(SubmitOrder),
    MarkOrdered(MarkOrdered),
    ReceiveGoods(ReceiveGoods),
    CancelOrder(CancelOrder),
    DeleteOrder(DeleteOrder),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub expected_delivery: Option<NaiveDate>,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineAdded {
    pub order_id: PurchaseOrderId,
    pub item_id: ItemId,
    pub quantity_ordered: i64,
    pub unit_cost_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderLineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRemoved {
    pub order_id: PurchaseOrderId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDetailsUpdated (carries the resolved, post-update values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetailsUpdated {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub expected_delivery: Option<NaiveDate>,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderMarkedOrdered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMarkedOrdered {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// One applied receipt line, with the cumulative total after this receipt.
///
/// `over_receipt` flags a cumulative total beyond what was ordered. It is a
/// warning for the operator, not an error: the goods are physically there and
/// the stock-in must be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_id: ItemId,
    pub quantity: i64,
    pub cumulative_received: i64,
    pub quantity_ordered: i64,
    pub over_receipt: bool,
    pub notes: Option<String>,
}

/// Event: GoodsReceived.
///
/// Carries the item/quantity facts a downstream handler needs to reflect the
/// delivery in the stock ledger (one adjustment per line, referencing this
/// order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub receipts: Vec<ReceiptLine>,
    pub status_after: PurchaseOrderStatus,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeleted {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    OrderLineAdded(OrderLineAdded),
    OrderLineRemoved(OrderLineRemoved),
    OrderDetailsUpdated(OrderDetailsUpdated),
    OrderSubmitted(OrderSubmitted),
    OrderMarkedOrdered(OrderMarkedOrdered),
    GoodsReceived(GoodsReceived),
    OrderCancelled(OrderCancelled),
    OrderDeleted(OrderDeleted),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::OrderLineAdded(_) => "purchasing.order.line_added",
            PurchaseOrderEvent::OrderLineRemoved(_) => "purchasing.order.line_removed",
            PurchaseOrderEvent::OrderDetailsUpdated(_) => "purchasing.order.details_updated",
            PurchaseOrderEvent::OrderSubmitted(_) => "purchasing.order.submitted",
            PurchaseOrderEvent::OrderMarkedOrdered(_) => "purchasing.order.marked_ordered",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::OrderCancelled(_) => "purchasing.order.cancelled",
            PurchaseOrderEvent::OrderDeleted(_) => "purchasing.order.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::OrderLineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::OrderLineRemoved(e) => e.occurred_at,
            PurchaseOrderEvent::OrderDetailsUpdated(e) => e.occurred_at,
            PurchaseOrderEvent::OrderSubmitted(e) => e.occurred_at,
            PurchaseOrderEvent::OrderMarkedOrdered(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::OrderCancelled(e) => e.occurred_at,
            PurchaseOrderEvent::OrderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.status = PurchaseOrderStatus::Draft;
                self.lines.clear();
                self.order_date = Some(e.occurred_at);
                self.expected_delivery = e.expected_delivery;
                self.tax_cents = e.tax_cents;
                self.shipping_cents = e.shipping_cents;
                self.deleted = false;
                self.created = true;
            }
            PurchaseOrderEvent::OrderLineAdded(e) => {
                self.lines.push(OrderLine {
                    item_id: e.item_id,
                    quantity_ordered: e.quantity_ordered,
                    quantity_received: 0,
                    unit_cost_cents: e.unit_cost_cents,
                });
            }
            PurchaseOrderEvent::OrderLineRemoved(e) => {
                self.lines.retain(|l| l.item_id != e.item_id);
            }
            PurchaseOrderEvent::OrderDetailsUpdated(e) => {
                self.supplier_id = Some(e.supplier_id);
                self.expected_delivery = e.expected_delivery;
                self.tax_cents = e.tax_cents;
                self.shipping_cents = e.shipping_cents;
            }
            PurchaseOrderEvent::OrderSubmitted(_) => {
                self.status = PurchaseOrderStatus::Pending;
            }
            PurchaseOrderEvent::OrderMarkedOrdered(_) => {
                self.status = PurchaseOrderStatus::Ordered;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                for receipt in &e.receipts {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == receipt.item_id)
                    {
                        line.quantity_received = receipt.cumulative_received;
                    }
                }
                // Status stays a pure function of line completeness.
                if let Some(status) = derive_receipt_status(&self.lines) {
                    self.status = status;
                }
            }
            PurchaseOrderEvent::OrderCancelled(_) => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
            PurchaseOrderEvent::OrderDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddOrderLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::RemoveOrderLine(cmd) => self.handle_remove_line(cmd),
            PurchaseOrderCommand::UpdateOrderDetails(cmd) => self.handle_update_details(cmd),
            PurchaseOrderCommand::SubmitOrder(cmd) => self.handle_submit(cmd),
            PurchaseOrderCommand::MarkOrdered(cmd) => self.handle_mark_ordered(cmd),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            PurchaseOrderCommand::DeleteOrder(cmd) => self.handle_delete(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), DomainError> {
        if !self.is_editable() {
            return Err(DomainError::invariant(
                "purchase order can only be edited while draft or pending",
            ));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if cmd.tax_cents < 0 || cmd.shipping_cents < 0 {
            return Err(DomainError::validation(
                "tax and shipping cannot be negative",
            ));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                order_id: cmd.order_id,
                order_number: cmd.order_number.clone(),
                supplier_id: cmd.supplier_id,
                expected_delivery: cmd.expected_delivery,
                tax_cents: cmd.tax_cents,
                shipping_cents: cmd.shipping_cents,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_add_line(&self, cmd: &AddOrderLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_editable()?;

        if cmd.quantity_ordered <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_cost_cents < 0 {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        if self.lines.iter().any(|l| l.item_id == cmd.item_id) {
            return Err(DomainError::conflict("item is already on this order"));
        }

        Ok(vec![PurchaseOrderEvent::OrderLineAdded(OrderLineAdded {
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            quantity_ordered: cmd.quantity_ordered,
            unit_cost_cents: cmd.unit_cost_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(
        &self,
        cmd: &RemoveOrderLine,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_editable()?;

        if !self.lines.iter().any(|l| l.item_id == cmd.item_id) {
            return Err(DomainError::validation("item is not on this order"));
        }

        Ok(vec![PurchaseOrderEvent::OrderLineRemoved(OrderLineRemoved {
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(
        &self,
        cmd: &UpdateOrderDetails,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_editable()?;

        let supplier_id = cmd
            .supplier_id
            .or(self.supplier_id)
            .ok_or_else(|| DomainError::invariant("supplier must be set"))?;
        let tax_cents = cmd.tax_cents.unwrap_or(self.tax_cents);
        let shipping_cents = cmd.shipping_cents.unwrap_or(self.shipping_cents);
        if tax_cents < 0 || shipping_cents < 0 {
            return Err(DomainError::validation(
                "tax and shipping cannot be negative",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderDetailsUpdated(
            OrderDetailsUpdated {
                order_id: cmd.order_id,
                supplier_id,
                expected_delivery: cmd.expected_delivery.or(self.expected_delivery),
                tax_cents,
                shipping_cents,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(&self, cmd: &SubmitOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "only draft purchase orders can be submitted",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit purchase order without lines",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderSubmitted(OrderSubmitted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_ordered(
        &self,
        cmd: &MarkOrdered,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;

        if !matches!(
            self.status,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Pending
        ) {
            return Err(DomainError::invariant(
                "only draft or pending purchase orders can be marked ordered",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot place purchase order without lines",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderMarkedOrdered(
            OrderMarkedOrdered {
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(&self, cmd: &ReceiveGoods) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;

        if !matches!(
            self.status,
            PurchaseOrderStatus::Ordered | PurchaseOrderStatus::PartiallyReceived
        ) {
            return Err(DomainError::invariant(
                "cannot receive goods before the purchase order is placed",
            ));
        }
        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::invariant("supplier must be set"))?;
        if cmd.receipts.is_empty() {
            return Err(DomainError::validation("receipt has no lines"));
        }

        let mut receipts = Vec::with_capacity(cmd.receipts.len());
        let mut projected = self.lines.clone();
        for receipt in &cmd.receipts {
            if receipt.quantity <= 0 {
                return Err(DomainError::validation(
                    "received quantity must be positive",
                ));
            }
            if receipts
                .iter()
                .any(|r: &ReceiptLine| r.item_id == receipt.item_id)
            {
                return Err(DomainError::validation(
                    "duplicate item in receipt; combine the quantities",
                ));
            }

            let line = projected
                .iter_mut()
                .find(|l| l.item_id == receipt.item_id)
                .ok_or_else(|| DomainError::validation("item is not on this order"))?;
            line.quantity_received += receipt.quantity;

            receipts.push(ReceiptLine {
                item_id: receipt.item_id,
                quantity: receipt.quantity,
                cumulative_received: line.quantity_received,
                quantity_ordered: line.quantity_ordered,
                over_receipt: line.quantity_received > line.quantity_ordered,
                notes: receipt.notes.clone(),
            });
        }

        let status_after =
            derive_receipt_status(&projected).unwrap_or(PurchaseOrderStatus::PartiallyReceived);

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: cmd.order_id,
            supplier_id,
            receipts,
            status_after,
            performed_by: cmd.performed_by,
            performed_by_name: cmd.performed_by_name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;

        if !matches!(
            self.status,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Pending | PurchaseOrderStatus::Ordered
        ) {
            return Err(DomainError::invariant(
                "cannot cancel a purchase order once goods have been received",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_order_id(cmd.order_id)?;

        if !self.is_editable() {
            return Err(DomainError::invariant(
                "only draft or pending purchase orders can be deleted",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderDeleted(OrderDeleted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glowdesk_core::AggregateId;

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn test_item_id() -> ItemId {
        ItemId::new(AggregateId::new())
    }

    fn test_staff() -> (StaffId, String) {
        (StaffId::new(), "Priya".to_string())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn apply_all(order: &mut PurchaseOrder, events: &[PurchaseOrderEvent]) {
        for e in events {
            order.apply(e);
        }
    }

    fn order_with_line(quantity_ordered: i64) -> (PurchaseOrder, ItemId) {
        let order_id = test_order_id();
        let item_id = test_item_id();
        let mut order = PurchaseOrder::empty(order_id);

        let events = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(
                CreatePurchaseOrder {
                    order_id,
                    order_number: "PO-1042".to_string(),
                    supplier_id: test_supplier_id(),
                    expected_delivery: None,
                    tax_cents: 0,
                    shipping_cents: 0,
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        apply_all(&mut order, &events);

        let events = order
            .handle(&PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                order_id,
                item_id,
                quantity_ordered,
                unit_cost_cents: 850,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);

        (order, item_id)
    }

    fn placed_order(quantity_ordered: i64) -> (PurchaseOrder, ItemId) {
        let (mut order, item_id) = order_with_line(quantity_ordered);
        let events = order
            .handle(&PurchaseOrderCommand::MarkOrdered(MarkOrdered {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        (order, item_id)
    }

    fn receive(order: &mut PurchaseOrder, item_id: ItemId, quantity: i64) -> GoodsReceived {
        let (performed_by, performed_by_name) = test_staff();
        let events = order
            .handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id: order.id_typed(),
                receipts: vec![LineReceipt {
                    item_id,
                    quantity,
                    notes: None,
                }],
                performed_by,
                performed_by_name,
                occurred_at: test_time(),
            }))
            .unwrap();
        let received = match &events[0] {
            PurchaseOrderEvent::GoodsReceived(e) => e.clone(),
            _ => panic!("Expected GoodsReceived event"),
        };
        apply_all(order, &events);
        received
    }

    #[test]
    fn create_starts_in_draft() {
        let (order, _) = order_with_line(10);
        assert_eq!(order.status(), PurchaseOrderStatus::Draft);
        assert_eq!(order.order_number(), "PO-1042");
        assert_eq!(order.subtotal_cents(), 8_500);
    }

    #[test]
    fn submit_then_mark_ordered_walks_the_state_machine() {
        let (mut order, _) = order_with_line(10);

        let events = order
            .handle(&PurchaseOrderCommand::SubmitOrder(SubmitOrder {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        assert_eq!(order.status(), PurchaseOrderStatus::Pending);

        let events = order
            .handle(&PurchaseOrderCommand::MarkOrdered(MarkOrdered {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);
        assert_eq!(order.status(), PurchaseOrderStatus::Ordered);
    }

    #[test]
    fn cannot_receive_before_order_is_placed() {
        let (order, item_id) = order_with_line(10);
        let (performed_by, performed_by_name) = test_staff();

        let err = order
            .handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id: order.id_typed(),
                receipts: vec![LineReceipt {
                    item_id,
                    quantity: 5,
                    notes: None,
                }],
                performed_by,
                performed_by_name,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn partial_then_complete_receipt_drives_status() {
        let (mut order, item_id) = placed_order(20);

        let received = receive(&mut order, item_id, 12);
        assert_eq!(received.status_after, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(received.receipts[0].cumulative_received, 12);
        assert!(!received.receipts[0].over_receipt);
        assert_eq!(order.status(), PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(order.lines()[0].quantity_received, 12);

        let received = receive(&mut order, item_id, 8);
        assert_eq!(received.status_after, PurchaseOrderStatus::Received);
        assert_eq!(received.receipts[0].cumulative_received, 20);
        assert_eq!(order.status(), PurchaseOrderStatus::Received);
    }

    #[test]
    fn repeated_identical_receipts_accumulate() {
        // The receipt path is append-only, not replay-safe: the same receipt
        // submitted twice is recorded twice. Deduplication is the caller's job.
        let (mut order, item_id) = placed_order(20);

        receive(&mut order, item_id, 12);
        let received = receive(&mut order, item_id, 12);

        assert_eq!(received.receipts[0].cumulative_received, 24);
        assert!(received.receipts[0].over_receipt);
        assert_eq!(order.status(), PurchaseOrderStatus::Received);
        assert_eq!(order.lines()[0].quantity_received, 24);
    }

    #[test]
    fn over_receipt_is_flagged_not_blocked() {
        let (mut order, item_id) = placed_order(10);

        let received = receive(&mut order, item_id, 13);
        assert!(received.receipts[0].over_receipt);
        assert_eq!(received.status_after, PurchaseOrderStatus::Received);
    }

    #[test]
    fn receipt_for_unknown_item_is_rejected() {
        let (order, _) = placed_order(10);
        let (performed_by, performed_by_name) = test_staff();

        let err = order
            .handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id: order.id_typed(),
                receipts: vec![LineReceipt {
                    item_id: test_item_id(),
                    quantity: 5,
                    notes: None,
                }],
                performed_by,
                performed_by_name,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancel_is_blocked_after_first_receipt() {
        let (mut order, item_id) = placed_order(10);
        receive(&mut order, item_id, 4);

        let err = order
            .handle(&PurchaseOrderCommand::CancelOrder(CancelOrder {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn cancel_from_ordered_has_no_stock_effect() {
        let (mut order, _) = placed_order(10);
        let events = order
            .handle(&PurchaseOrderCommand::CancelOrder(CancelOrder {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        apply_all(&mut order, &events);
        assert_eq!(order.status(), PurchaseOrderStatus::Cancelled);
        assert!(!order.has_receipts());
    }

    #[test]
    fn delete_is_blocked_once_placed() {
        let (order, _) = placed_order(10);
        let err = order
            .handle(&PurchaseOrderCommand::DeleteOrder(DeleteOrder {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn editing_is_blocked_once_placed() {
        let (order, _) = placed_order(10);
        let err = order
            .handle(&PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                order_id: order.id_typed(),
                item_id: test_item_id(),
                quantity_ordered: 5,
                unit_cost_cents: 100,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn totals_include_tax_and_shipping() {
        let order_id = test_order_id();
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(
                CreatePurchaseOrder {
                    order_id,
                    order_number: "PO-7".to_string(),
                    supplier_id: test_supplier_id(),
                    expected_delivery: None,
                    tax_cents: 230,
                    shipping_cents: 1_000,
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        apply_all(&mut order, &events);

        let events = order
            .handle(&PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                order_id,
                item_id: test_item_id(),
                quantity_ordered: 3,
                unit_cost_cents: 500,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut order, &events);

        assert_eq!(order.subtotal_cents(), 1_500);
        assert_eq!(order.total_cents(), 2_730);
    }
}
