use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use glowdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use glowdesk_events::Event;

/// Supplier identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierStatus {
    Active,
    Inactive,
}

/// Contact information for a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    contact: ContactInfo,
    payment_terms: Option<String>,
    lead_time_days: Option<u32>,
    status: SupplierStatus,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Supplier {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactInfo::default(),
            payment_terms: None,
            lead_time_days: None,
            status: SupplierStatus::Active,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn payment_terms(&self) -> Option<&str> {
        self.payment_terms.as_deref()
    }

    pub fn lead_time_days(&self) -> Option<u32> {
        self.lead_time_days
    }

    pub fn status(&self) -> SupplierStatus {
        self.status
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Invariant helper: whether new purchase orders may reference this supplier.
    pub fn can_supply(&self) -> bool {
        self.status == SupplierStatus::Active && !self.deleted
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSupplier (fields left as `None` keep their value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSupplier {
    pub supplier_id: SupplierId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetSupplierStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSupplierStatus {
    pub supplier_id: SupplierId,
    pub status: SupplierStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteSupplier.
///
/// The aggregate only records the deletion; the application layer must first
/// verify no item still references the supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSupplier {
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    RegisterSupplier(RegisterSupplier),
    UpdateSupplier(UpdateSupplier),
    SetSupplierStatus(SetSupplierStatus),
    DeleteSupplier(DeleteSupplier),
}

/// Event: SupplierRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistered {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierUpdated (carries the resolved, post-update values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierUpdated {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierStatusChanged {
    pub supplier_id: SupplierId,
    pub status: SupplierStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDeleted {
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierRegistered(SupplierRegistered),
    SupplierUpdated(SupplierUpdated),
    SupplierStatusChanged(SupplierStatusChanged),
    SupplierDeleted(SupplierDeleted),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierRegistered(_) => "suppliers.supplier.registered",
            SupplierEvent::SupplierUpdated(_) => "suppliers.supplier.updated",
            SupplierEvent::SupplierStatusChanged(_) => "suppliers.supplier.status_changed",
            SupplierEvent::SupplierDeleted(_) => "suppliers.supplier.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierRegistered(e) => e.occurred_at,
            SupplierEvent::SupplierUpdated(e) => e.occurred_at,
            SupplierEvent::SupplierStatusChanged(e) => e.occurred_at,
            SupplierEvent::SupplierDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.id = e.supplier_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.payment_terms = e.payment_terms.clone();
                self.lead_time_days = e.lead_time_days;
                self.status = SupplierStatus::Active;
                self.deleted = false;
                self.created = true;
            }
            SupplierEvent::SupplierUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.payment_terms = e.payment_terms.clone();
                self.lead_time_days = e.lead_time_days;
            }
            SupplierEvent::SupplierStatusChanged(e) => {
                self.status = e.status;
            }
            SupplierEvent::SupplierDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::RegisterSupplier(cmd) => self.handle_register(cmd),
            SupplierCommand::UpdateSupplier(cmd) => self.handle_update(cmd),
            SupplierCommand::SetSupplierStatus(cmd) => self.handle_status(cmd),
            SupplierCommand::DeleteSupplier(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Supplier {
    fn ensure_supplier_id(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if self.id != supplier_id {
            return Err(DomainError::invariant("supplier_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![SupplierEvent::SupplierRegistered(SupplierRegistered {
            supplier_id: cmd.supplier_id,
            name: cmd.name.clone(),
            contact: cmd.contact.clone().unwrap_or_default(),
            payment_terms: cmd.payment_terms.clone(),
            lead_time_days: cmd.lead_time_days,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_supplier_id(cmd.supplier_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![SupplierEvent::SupplierUpdated(SupplierUpdated {
            supplier_id: cmd.supplier_id,
            name,
            contact: cmd.contact.clone().unwrap_or_else(|| self.contact.clone()),
            payment_terms: cmd.payment_terms.clone().or_else(|| self.payment_terms.clone()),
            lead_time_days: cmd.lead_time_days.or(self.lead_time_days),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_status(&self, cmd: &SetSupplierStatus) -> Result<Vec<SupplierEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_supplier_id(cmd.supplier_id)?;

        if cmd.status == self.status {
            return Ok(vec![]);
        }

        Ok(vec![SupplierEvent::SupplierStatusChanged(SupplierStatusChanged {
            supplier_id: cmd.supplier_id,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_supplier_id(cmd.supplier_id)?;

        Ok(vec![SupplierEvent::SupplierDeleted(SupplierDeleted {
            supplier_id: cmd.supplier_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
