use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use glowdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, StaffId};
use glowdesk_events::Event;
use glowdesk_inventory::ItemId;

/// Stocktake session identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StocktakeId(pub AggregateId);

impl StocktakeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StocktakeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Stocktake status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StocktakeStatus {
    InProgress,
    Completed,
    Cancelled,
}

/// A line frozen into the session at start time.
///
/// `expected_quantity` and `unit_cost_cents` are snapshots; they are never
/// re-synced, so a discrepancy measures drift since the session began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub item_id: ItemId,
    pub expected_quantity: i64,
    pub unit_cost_cents: i64,
}

/// Session state for one item: the frozen snapshot plus the latest count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeLine {
    pub item_id: ItemId,
    pub expected_quantity: i64,
    pub unit_cost_cents: i64,
    pub counted_quantity: Option<i64>,
}

impl StocktakeLine {
    /// `counted - expected`, or `None` while the item is uncounted.
    pub fn discrepancy(&self) -> Option<i64> {
        self.counted_quantity.map(|c| c - self.expected_quantity)
    }

    pub fn discrepancy_value_cents(&self) -> Option<i64> {
        self.discrepancy().map(|d| d * self.unit_cost_cents)
    }
}

/// Aggregate root: Stocktake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stocktake {
    id: StocktakeId,
    name: String,
    status: StocktakeStatus,
    lines: Vec<StocktakeLine>,
    started_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Stocktake {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: StocktakeId) -> Self {
        Self {
            id,
            name: String::new(),
            status: StocktakeStatus::InProgress,
            lines: Vec::new(),
            started_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StocktakeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StocktakeStatus {
        self.status
    }

    pub fn lines(&self) -> &[StocktakeLine] {
        &self.lines
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// The corrective adjustments completion would apply right now: one per
    /// counted line with a nonzero discrepancy.
    pub fn pending_corrections(&self) -> Vec<StockCorrection> {
        self.lines
            .iter()
            .filter_map(|line| {
                let discrepancy = line.discrepancy()?;
                if discrepancy == 0 {
                    return None;
                }
                Some(StockCorrection {
                    item_id: line.item_id,
                    discrepancy,
                    discrepancy_value_cents: discrepancy * line.unit_cost_cents,
                })
            })
            .collect()
    }
}

impl AggregateRoot for Stocktake {
    type Id = StocktakeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StartStocktake. The caller snapshots expected quantities from the
/// stock read model at this instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStocktake {
    pub stocktake_id: StocktakeId,
    pub name: String,
    pub lines: Vec<SnapshotLine>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCount. Last write wins while the session is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub stocktake_id: StocktakeId,
    pub item_id: ItemId,
    pub counted_quantity: i64,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteStocktake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteStocktake {
    pub stocktake_id: StocktakeId,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelStocktake. Recorded counts are discarded unapplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelStocktake {
    pub stocktake_id: StocktakeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StocktakeCommand {
    StartStocktake(StartStocktake),
    RecordCount(RecordCount),
    CompleteStocktake(CompleteStocktake),
    CancelStocktake(CancelStocktake),
}

/// Event: StocktakeStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeStarted {
    pub stocktake_id: StocktakeId,
    pub name: String,
    pub lines: Vec<SnapshotLine>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecorded {
    pub stocktake_id: StocktakeId,
    pub item_id: ItemId,
    pub counted_quantity: i64,
    /// Against the frozen snapshot, for the audit trail.
    pub discrepancy: i64,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// One corrective adjustment the ledger should apply on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCorrection {
    pub item_id: ItemId,
    pub discrepancy: i64,
    pub discrepancy_value_cents: i64,
}

/// Event: StocktakeCompleted.
///
/// Carries exactly one correction per counted line with nonzero discrepancy;
/// uncounted lines produce none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeCompleted {
    pub stocktake_id: StocktakeId,
    pub corrections: Vec<StockCorrection>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StocktakeCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeCancelled {
    pub stocktake_id: StocktakeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StocktakeEvent {
    StocktakeStarted(StocktakeStarted),
    CountRecorded(CountRecorded),
    StocktakeCompleted(StocktakeCompleted),
    StocktakeCancelled(StocktakeCancelled),
}

impl Event for StocktakeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StocktakeEvent::StocktakeStarted(_) => "stocktake.session.started",
            StocktakeEvent::CountRecorded(_) => "stocktake.session.count_recorded",
            StocktakeEvent::StocktakeCompleted(_) => "stocktake.session.completed",
            StocktakeEvent::StocktakeCancelled(_) => "stocktake.session.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StocktakeEvent::StocktakeStarted(e) => e.occurred_at,
            StocktakeEvent::CountRecorded(e) => e.occurred_at,
            StocktakeEvent::StocktakeCompleted(e) => e.occurred_at,
            StocktakeEvent::StocktakeCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Stocktake {
    type Command = StocktakeCommand;
    type Event = StocktakeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StocktakeEvent::StocktakeStarted(e) => {
                self.id = e.stocktake_id;
                self.name = e.name.clone();
                self.status = StocktakeStatus::InProgress;
                self.lines = e
                    .lines
                    .iter()
                    .map(|s| StocktakeLine {
                        item_id: s.item_id,
                        expected_quantity: s.expected_quantity,
                        unit_cost_cents: s.unit_cost_cents,
                        counted_quantity: None,
                    })
                    .collect();
                self.started_at = Some(e.occurred_at);
                self.created = true;
            }
            StocktakeEvent::CountRecorded(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == e.item_id) {
                    line.counted_quantity = Some(e.counted_quantity);
                }
            }
            StocktakeEvent::StocktakeCompleted(_) => {
                self.status = StocktakeStatus::Completed;
            }
            StocktakeEvent::StocktakeCancelled(_) => {
                self.status = StocktakeStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StocktakeCommand::StartStocktake(cmd) => self.handle_start(cmd),
            StocktakeCommand::RecordCount(cmd) => self.handle_count(cmd),
            StocktakeCommand::CompleteStocktake(cmd) => self.handle_complete(cmd),
            StocktakeCommand::CancelStocktake(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Stocktake {
    fn ensure_stocktake_id(&self, stocktake_id: StocktakeId) -> Result<(), DomainError> {
        if self.id != stocktake_id {
            return Err(DomainError::invariant("stocktake_id mismatch"));
        }
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.status != StocktakeStatus::InProgress {
            return Err(DomainError::invariant("stocktake is no longer in progress"));
        }
        Ok(())
    }

    fn handle_start(&self, cmd: &StartStocktake) -> Result<Vec<StocktakeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stocktake already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("stocktake has no items in scope"));
        }
        for (idx, line) in cmd.lines.iter().enumerate() {
            if cmd.lines[..idx].iter().any(|l| l.item_id == line.item_id) {
                return Err(DomainError::validation("duplicate item in stocktake scope"));
            }
        }

        Ok(vec![StocktakeEvent::StocktakeStarted(StocktakeStarted {
            stocktake_id: cmd.stocktake_id,
            name: cmd.name.clone(),
            lines: cmd.lines.clone(),
            performed_by: cmd.performed_by,
            performed_by_name: cmd.performed_by_name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_count(&self, cmd: &RecordCount) -> Result<Vec<StocktakeEvent>, DomainError> {
        self.ensure_in_progress()?;
        self.ensure_stocktake_id(cmd.stocktake_id)?;

        if cmd.counted_quantity < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        let line = self
            .lines
            .iter()
            .find(|l| l.item_id == cmd.item_id)
            .ok_or_else(|| DomainError::validation("item is not in this stocktake's scope"))?;

        Ok(vec![StocktakeEvent::CountRecorded(CountRecorded {
            stocktake_id: cmd.stocktake_id,
            item_id: cmd.item_id,
            counted_quantity: cmd.counted_quantity,
            discrepancy: cmd.counted_quantity - line.expected_quantity,
            performed_by: cmd.performed_by,
            performed_by_name: cmd.performed_by_name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteStocktake) -> Result<Vec<StocktakeEvent>, DomainError> {
        self.ensure_in_progress()?;
        self.ensure_stocktake_id(cmd.stocktake_id)?;

        Ok(vec![StocktakeEvent::StocktakeCompleted(StocktakeCompleted {
            stocktake_id: cmd.stocktake_id,
            corrections: self.pending_corrections(),
            performed_by: cmd.performed_by,
            performed_by_name: cmd.performed_by_name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelStocktake) -> Result<Vec<StocktakeEvent>, DomainError> {
        self.ensure_in_progress()?;
        self.ensure_stocktake_id(cmd.stocktake_id)?;

        Ok(vec![StocktakeEvent::StocktakeCancelled(StocktakeCancelled {
            stocktake_id: cmd.stocktake_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
