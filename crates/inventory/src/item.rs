use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use glowdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, StaffId};
use glowdesk_events::Event;
use glowdesk_suppliers::SupplierId;

use crate::movement::{MovementDirection, MovementReason, MovementReference};

/// Inventory item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub AggregateId);

impl ItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Item lifecycle status. Items are retired by status transition, never
/// physically removed — their movement history must stay resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Inactive,
    Discontinued,
}

/// Aggregate root: InventoryItem — the stock ledger for one product.
///
/// `current_stock` is only ever assigned from `StockAdjusted` events, so the
/// counter equals the sum of signed movement quantities by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: ItemId,
    sku: String,
    name: String,
    supplier_id: Option<SupplierId>,
    cost_price_cents: i64,
    retail_price_cents: Option<i64>,
    current_stock: i64,
    low_stock_threshold: i64,
    reorder_quantity: i64,
    unit_of_measure: String,
    status: ItemStatus,
    expires_on: Option<NaiveDate>,
    allow_negative_stock: bool,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            sku: String::new(),
            name: String::new(),
            supplier_id: None,
            cost_price_cents: 0,
            retail_price_cents: None,
            current_stock: 0,
            low_stock_threshold: 0,
            reorder_quantity: 0,
            unit_of_measure: String::new(),
            status: ItemStatus::Active,
            expires_on: None,
            allow_negative_stock: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn current_stock(&self) -> i64 {
        self.current_stock
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn allow_negative_stock(&self) -> bool {
        self.allow_negative_stock
    }
}

impl AggregateRoot for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem.
///
/// `opening_stock > 0` additionally records one `initial_stock` movement so
/// even the opening balance is visible in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub supplier_id: Option<SupplierId>,
    pub cost_price_cents: i64,
    pub retail_price_cents: Option<i64>,
    pub opening_stock: i64,
    pub low_stock_threshold: i64,
    pub reorder_quantity: i64,
    pub unit_of_measure: String,
    pub expires_on: Option<NaiveDate>,
    pub allow_negative_stock: bool,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItemDetails (fields left as `None` keep their value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemDetails {
    pub item_id: ItemId,
    pub name: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub cost_price_cents: Option<i64>,
    pub retail_price_cents: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub unit_of_measure: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub allow_negative_stock: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeItemStatus (soft retirement path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItemStatus {
    pub item_id: ItemId,
    pub status: ItemStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
///
/// `quantity` is signed: positive for stock-in, negative for stock-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: ItemId,
    pub quantity: i64,
    pub reason: MovementReason,
    pub notes: Option<String>,
    pub reference: Option<MovementReference>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    CreateItem(CreateItem),
    UpdateItemDetails(UpdateItemDetails),
    ChangeItemStatus(ChangeItemStatus),
    AdjustStock(AdjustStock),
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub supplier_id: Option<SupplierId>,
    pub cost_price_cents: i64,
    pub retail_price_cents: Option<i64>,
    pub low_stock_threshold: i64,
    pub reorder_quantity: i64,
    pub unit_of_measure: String,
    pub expires_on: Option<NaiveDate>,
    pub allow_negative_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDetailsUpdated (carries the resolved, post-update values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsUpdated {
    pub item_id: ItemId,
    pub name: String,
    pub supplier_id: Option<SupplierId>,
    pub cost_price_cents: i64,
    pub retail_price_cents: Option<i64>,
    pub low_stock_threshold: i64,
    pub reorder_quantity: i64,
    pub unit_of_measure: String,
    pub expires_on: Option<NaiveDate>,
    pub allow_negative_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatusChanged {
    pub item_id: ItemId,
    pub status: ItemStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted — one immutable ledger entry.
///
/// `previous_stock` and `new_stock` are captured at decision time so each
/// movement is auditable on its own, without replaying the whole stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub item_id: ItemId,
    pub direction: MovementDirection,
    /// Positive magnitude; the sign lives in `direction`.
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: MovementReason,
    pub notes: Option<String>,
    pub reference: Option<MovementReference>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

impl StockAdjusted {
    /// The signed quantity this movement applied to the counter.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            MovementDirection::In => self.quantity,
            MovementDirection::Out => -self.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    ItemDetailsUpdated(ItemDetailsUpdated),
    ItemStatusChanged(ItemStatusChanged),
    StockAdjusted(StockAdjusted),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::ItemDetailsUpdated(_) => "inventory.item.details_updated",
            InventoryEvent::ItemStatusChanged(_) => "inventory.item.status_changed",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::ItemDetailsUpdated(e) => e.occurred_at,
            InventoryEvent::ItemStatusChanged(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.supplier_id = e.supplier_id;
                self.cost_price_cents = e.cost_price_cents;
                self.retail_price_cents = e.retail_price_cents;
                self.current_stock = 0;
                self.low_stock_threshold = e.low_stock_threshold;
                self.reorder_quantity = e.reorder_quantity;
                self.unit_of_measure = e.unit_of_measure.clone();
                self.status = ItemStatus::Active;
                self.expires_on = e.expires_on;
                self.allow_negative_stock = e.allow_negative_stock;
                self.created = true;
            }
            InventoryEvent::ItemDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.supplier_id = e.supplier_id;
                self.cost_price_cents = e.cost_price_cents;
                self.retail_price_cents = e.retail_price_cents;
                self.low_stock_threshold = e.low_stock_threshold;
                self.reorder_quantity = e.reorder_quantity;
                self.unit_of_measure = e.unit_of_measure.clone();
                self.expires_on = e.expires_on;
                self.allow_negative_stock = e.allow_negative_stock;
            }
            InventoryEvent::ItemStatusChanged(e) => {
                self.status = e.status;
            }
            InventoryEvent::StockAdjusted(e) => {
                // The counter is the fold of the ledger: assignment, not arithmetic.
                self.current_stock = e.new_stock;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::CreateItem(cmd) => self.handle_create(cmd),
            InventoryCommand::UpdateItemDetails(cmd) => self.handle_update(cmd),
            InventoryCommand::ChangeItemStatus(cmd) => self.handle_status(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_item_id(&self, item_id: ItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.unit_of_measure.trim().is_empty() {
            return Err(DomainError::validation("unit of measure cannot be empty"));
        }
        if cmd.cost_price_cents < 0 {
            return Err(DomainError::validation("cost price cannot be negative"));
        }
        if cmd.retail_price_cents.is_some_and(|p| p < 0) {
            return Err(DomainError::validation("retail price cannot be negative"));
        }
        if cmd.low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        if cmd.reorder_quantity < 0 {
            return Err(DomainError::validation("reorder quantity cannot be negative"));
        }
        if cmd.opening_stock < 0 {
            return Err(DomainError::validation("opening stock cannot be negative"));
        }

        let mut events = vec![InventoryEvent::ItemCreated(ItemCreated {
            item_id: cmd.item_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            supplier_id: cmd.supplier_id,
            cost_price_cents: cmd.cost_price_cents,
            retail_price_cents: cmd.retail_price_cents,
            low_stock_threshold: cmd.low_stock_threshold,
            reorder_quantity: cmd.reorder_quantity,
            unit_of_measure: cmd.unit_of_measure.clone(),
            expires_on: cmd.expires_on,
            allow_negative_stock: cmd.allow_negative_stock,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.opening_stock > 0 {
            events.push(InventoryEvent::StockAdjusted(StockAdjusted {
                item_id: cmd.item_id,
                direction: MovementDirection::In,
                quantity: cmd.opening_stock,
                previous_stock: 0,
                new_stock: cmd.opening_stock,
                reason: MovementReason::InitialStock,
                notes: None,
                reference: None,
                performed_by: cmd.performed_by,
                performed_by_name: cmd.performed_by_name.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_update(&self, cmd: &UpdateItemDetails) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_item_id(cmd.item_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let unit_of_measure = cmd
            .unit_of_measure
            .clone()
            .unwrap_or_else(|| self.unit_of_measure.clone());
        if unit_of_measure.trim().is_empty() {
            return Err(DomainError::validation("unit of measure cannot be empty"));
        }
        let cost_price_cents = cmd.cost_price_cents.unwrap_or(self.cost_price_cents);
        if cost_price_cents < 0 {
            return Err(DomainError::validation("cost price cannot be negative"));
        }
        let retail_price_cents = cmd.retail_price_cents.or(self.retail_price_cents);
        if retail_price_cents.is_some_and(|p| p < 0) {
            return Err(DomainError::validation("retail price cannot be negative"));
        }
        let low_stock_threshold = cmd.low_stock_threshold.unwrap_or(self.low_stock_threshold);
        if low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        let reorder_quantity = cmd.reorder_quantity.unwrap_or(self.reorder_quantity);
        if reorder_quantity < 0 {
            return Err(DomainError::validation("reorder quantity cannot be negative"));
        }

        Ok(vec![InventoryEvent::ItemDetailsUpdated(ItemDetailsUpdated {
            item_id: cmd.item_id,
            name,
            supplier_id: cmd.supplier_id.or(self.supplier_id),
            cost_price_cents,
            retail_price_cents,
            low_stock_threshold,
            reorder_quantity,
            unit_of_measure,
            expires_on: cmd.expires_on.or(self.expires_on),
            allow_negative_stock: cmd.allow_negative_stock.unwrap_or(self.allow_negative_stock),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_status(&self, cmd: &ChangeItemStatus) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_item_id(cmd.item_id)?;

        if cmd.status == self.status {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ItemStatusChanged(ItemStatusChanged {
            item_id: cmd.item_id,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_item_id(cmd.item_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity cannot be zero"));
        }

        let direction = if cmd.quantity > 0 {
            MovementDirection::In
        } else {
            MovementDirection::Out
        };
        if !cmd.reason.allows(direction) {
            return Err(DomainError::validation(format!(
                "reason {:?} is not valid for a stock-{} movement",
                cmd.reason,
                match direction {
                    MovementDirection::In => "in",
                    MovementDirection::Out => "out",
                }
            )));
        }

        let new_stock = self.current_stock + cmd.quantity;
        if new_stock < 0 && !self.allow_negative_stock {
            return Err(DomainError::invariant(format!(
                "insufficient stock: {} on hand, {} requested",
                self.current_stock,
                cmd.quantity.abs()
            )));
        }

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            item_id: cmd.item_id,
            direction,
            quantity: cmd.quantity.abs(),
            previous_stock: self.current_stock,
            new_stock,
            reason: cmd.reason,
            notes: cmd.notes.clone(),
            reference: cmd.reference.clone(),
            performed_by: cmd.performed_by,
            performed_by_name: cmd.performed_by_name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glowdesk_core::AggregateId;
    use proptest::prelude::*;

    fn test_item_id() -> ItemId {
        ItemId::new(AggregateId::new())
    }

    fn test_staff() -> (StaffId, String) {
        (StaffId::new(), "Dana".to_string())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(item_id: ItemId, opening_stock: i64) -> CreateItem {
        let (performed_by, performed_by_name) = test_staff();
        CreateItem {
            item_id,
            sku: "SHMP-500".to_string(),
            name: "Argan Shampoo 500ml".to_string(),
            supplier_id: None,
            cost_price_cents: 850,
            retail_price_cents: Some(2400),
            opening_stock,
            low_stock_threshold: 5,
            reorder_quantity: 12,
            unit_of_measure: "bottle".to_string(),
            expires_on: None,
            allow_negative_stock: false,
            performed_by,
            performed_by_name,
            occurred_at: test_time(),
        }
    }

    fn created_item(opening_stock: i64) -> InventoryItem {
        let item_id = test_item_id();
        let mut item = InventoryItem::empty(item_id);
        let events = item
            .handle(&InventoryCommand::CreateItem(create_cmd(item_id, opening_stock)))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
        item
    }

    fn adjust_cmd(item_id: ItemId, quantity: i64, reason: MovementReason) -> AdjustStock {
        let (performed_by, performed_by_name) = test_staff();
        AdjustStock {
            item_id,
            quantity,
            reason,
            notes: None,
            reference: None,
            performed_by,
            performed_by_name,
            occurred_at: test_time(),
        }
    }

    #[test]
    fn create_item_emits_item_created() {
        let item_id = test_item_id();
        let item = InventoryItem::empty(item_id);

        let events = item
            .handle(&InventoryCommand::CreateItem(create_cmd(item_id, 0)))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            InventoryEvent::ItemCreated(e) => {
                assert_eq!(e.item_id, item_id);
                assert_eq!(e.sku, "SHMP-500");
                assert_eq!(e.low_stock_threshold, 5);
            }
            _ => panic!("Expected ItemCreated event"),
        }
    }

    #[test]
    fn opening_stock_is_recorded_as_initial_movement() {
        let item_id = test_item_id();
        let item = InventoryItem::empty(item_id);

        let events = item
            .handle(&InventoryCommand::CreateItem(create_cmd(item_id, 24)))
            .unwrap();
        assert_eq!(events.len(), 2);

        match &events[1] {
            InventoryEvent::StockAdjusted(e) => {
                assert_eq!(e.reason, MovementReason::InitialStock);
                assert_eq!(e.direction, MovementDirection::In);
                assert_eq!(e.previous_stock, 0);
                assert_eq!(e.new_stock, 24);
            }
            _ => panic!("Expected StockAdjusted event"),
        }
    }

    #[test]
    fn adjust_captures_previous_and_new_stock() {
        let item = created_item(10);

        let events = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                -8,
                MovementReason::Sold,
            )))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            InventoryEvent::StockAdjusted(e) => {
                assert_eq!(e.direction, MovementDirection::Out);
                assert_eq!(e.quantity, 8);
                assert_eq!(e.previous_stock, 10);
                assert_eq!(e.new_stock, 2);
                assert_eq!(e.signed_quantity(), -8);
            }
            _ => panic!("Expected StockAdjusted event"),
        }
    }

    #[test]
    fn overdraw_is_rejected_when_negatives_disallowed() {
        let mut item = created_item(10);

        // Drain to zero, then try one more.
        let events = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                -10,
                MovementReason::Sold,
            )))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
        assert_eq!(item.current_stock(), 0);

        let err = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                -1,
                MovementReason::Sold,
            )))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("insufficient stock") => {}
            other => panic!("Expected invariant violation, got {other:?}"),
        }
        assert_eq!(item.current_stock(), 0);
    }

    #[test]
    fn overdraw_is_allowed_when_item_opts_in() {
        let item_id = test_item_id();
        let mut item = InventoryItem::empty(item_id);
        let mut cmd = create_cmd(item_id, 2);
        cmd.allow_negative_stock = true;
        let events = item.handle(&InventoryCommand::CreateItem(cmd)).unwrap();
        for e in &events {
            item.apply(e);
        }

        let events = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item_id,
                -5,
                MovementReason::UsedInService,
            )))
            .unwrap();
        match &events[0] {
            InventoryEvent::StockAdjusted(e) => assert_eq!(e.new_stock, -3),
            _ => panic!("Expected StockAdjusted event"),
        }
    }

    #[test]
    fn reason_direction_mismatch_is_rejected() {
        let item = created_item(10);

        let err = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                5,
                MovementReason::Sold,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                -5,
                MovementReason::Received,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let item = created_item(10);
        let err = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                0,
                MovementReason::Other,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn adjust_before_creation_is_not_found() {
        let item = InventoryItem::empty(test_item_id());
        let err = item
            .handle(&InventoryCommand::AdjustStock(adjust_cmd(
                item.id_typed(),
                5,
                MovementReason::Received,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn status_change_is_idempotent_noop() {
        let mut item = created_item(0);
        let events = item
            .handle(&InventoryCommand::ChangeItemStatus(ChangeItemStatus {
                item_id: item.id_typed(),
                status: ItemStatus::Discontinued,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            item.apply(e);
        }

        let events = item
            .handle(&InventoryCommand::ChangeItemStatus(ChangeItemStatus {
                item_id: item.id_typed(),
                status: ItemStatus::Discontinued,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn update_keeps_unspecified_fields() {
        let mut item = created_item(0);
        let events = item
            .handle(&InventoryCommand::UpdateItemDetails(UpdateItemDetails {
                item_id: item.id_typed(),
                name: None,
                supplier_id: None,
                cost_price_cents: Some(900),
                retail_price_cents: None,
                low_stock_threshold: Some(8),
                reorder_quantity: None,
                unit_of_measure: None,
                expires_on: None,
                allow_negative_stock: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }

        assert_eq!(item.name(), "Argan Shampoo 500ml");
        assert_eq!(item.low_stock_threshold(), 8);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of adjustments, the counter equals the
        /// sum of signed quantities of the applied movements, and with
        /// negatives disallowed it never drops below zero.
        #[test]
        fn counter_is_sum_of_applied_movements(
            deltas in prop::collection::vec(-30i64..40i64, 1..25)
        ) {
            let mut item = created_item(0);
            let mut ledger_sum = 0i64;

            for delta in deltas {
                if delta == 0 {
                    continue;
                }
                let reason = if delta > 0 {
                    MovementReason::Received
                } else {
                    MovementReason::UsedInService
                };
                let result = item.handle(&InventoryCommand::AdjustStock(adjust_cmd(
                    item.id_typed(),
                    delta,
                    reason,
                )));
                match result {
                    Ok(events) => {
                        for e in &events {
                            if let InventoryEvent::StockAdjusted(m) = e {
                                ledger_sum += m.signed_quantity();
                            }
                            item.apply(e);
                        }
                    }
                    Err(_) => {
                        // A rejected adjustment must not have moved the counter.
                        prop_assert_eq!(item.current_stock(), ledger_sum);
                    }
                }

                prop_assert_eq!(item.current_stock(), ledger_sum);
                prop_assert!(item.current_stock() >= 0);
            }
        }
    }
}
