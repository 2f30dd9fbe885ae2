//! Supplier directory read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use glowdesk_events::EventEnvelope;
use glowdesk_suppliers::{ContactInfo, SupplierEvent, SupplierId, SupplierStatus};

use crate::projections::cursor::CursorCheck;
use crate::projections::{ProjectionError, StreamCursors};
use crate::read_model::ReadStore;

/// Queryable supplier read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierReadModel {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
    pub status: SupplierStatus,
    pub updated_at: DateTime<Utc>,
}

/// Supplier directory projection. Deleted suppliers drop out of the
/// directory; their event history remains in the store.
#[derive(Debug)]
pub struct SupplierDirectoryProjection<S>
where
    S: ReadStore<SupplierId, SupplierReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SupplierDirectoryProjection<S>
where
    S: ReadStore<SupplierId, SupplierReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, supplier_id: &SupplierId) -> Option<SupplierReadModel> {
        self.store.get(supplier_id)
    }

    pub fn list(&self) -> Vec<SupplierReadModel> {
        self.store.list()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        if self.cursors.check(aggregate_id, envelope.sequence_number())? == CursorCheck::Replay {
            return Ok(());
        }

        let event: SupplierEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let supplier_id = match &event {
            SupplierEvent::SupplierRegistered(e) => e.supplier_id,
            SupplierEvent::SupplierUpdated(e) => e.supplier_id,
            SupplierEvent::SupplierStatusChanged(e) => e.supplier_id,
            SupplierEvent::SupplierDeleted(e) => e.supplier_id,
        };
        if supplier_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event supplier_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.store.upsert(
                    e.supplier_id,
                    SupplierReadModel {
                        supplier_id: e.supplier_id,
                        name: e.name,
                        contact: e.contact,
                        payment_terms: e.payment_terms,
                        lead_time_days: e.lead_time_days,
                        status: SupplierStatus::Active,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SupplierEvent::SupplierUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.supplier_id) {
                    rm.name = e.name;
                    rm.contact = e.contact;
                    rm.payment_terms = e.payment_terms;
                    rm.lead_time_days = e.lead_time_days;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.supplier_id, rm);
                }
            }
            SupplierEvent::SupplierStatusChanged(e) => {
                if let Some(mut rm) = self.store.get(&e.supplier_id) {
                    rm.status = e.status;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.supplier_id, rm);
                }
            }
            SupplierEvent::SupplierDeleted(e) => {
                self.store.remove(&e.supplier_id);
            }
        }

        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }
}
