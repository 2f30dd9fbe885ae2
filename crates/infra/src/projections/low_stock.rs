//! Low-stock alert state.
//!
//! Alerts are a view over item state, not a persisted entity: this projection
//! tracks each item's stock and threshold, derives severity with
//! [`glowdesk_inventory::severity_for`], and keeps acknowledgments in a side
//! table keyed per episode. A new episode begins every time an item crosses
//! from quiet to at-or-below threshold, so a stale acknowledgment can never
//! suppress a fresh low-stock condition.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use glowdesk_core::{DomainError, StaffId};
use glowdesk_events::EventEnvelope;
use glowdesk_inventory::{AlertSeverity, InventoryEvent, ItemId, severity_for};

use crate::projections::cursor::CursorCheck;
use crate::projections::{ProjectionError, StreamCursors};

/// Acknowledgment of one alert episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub acknowledged_by: StaffId,
    pub acknowledged_by_name: String,
    pub acknowledged_at: DateTime<Utc>,
}

/// An active low-stock alert, as exposed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub severity: AlertSeverity,
    /// Distinct low-stock episodes seen for this item, 1-based.
    pub episode: u64,
    pub acknowledgment: Option<Acknowledgment>,
}

#[derive(Debug, Clone)]
struct ItemAlertState {
    item_id: ItemId,
    sku: String,
    name: String,
    current_stock: i64,
    low_stock_threshold: i64,
    episode: u64,
    acknowledgment: Option<Acknowledgment>,
}

/// Low-stock monitor projection.
#[derive(Debug, Default)]
pub struct LowStockProjection {
    items: RwLock<HashMap<ItemId, ItemAlertState>>,
    cursors: StreamCursors,
}

impl LowStockProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// All items currently at or below their threshold, worst first.
    pub fn active_alerts(&self) -> Vec<LowStockAlert> {
        let items = match self.items.read() {
            Ok(i) => i,
            Err(_) => return vec![],
        };

        let mut alerts: Vec<LowStockAlert> = items
            .values()
            .filter_map(|state| {
                let severity = severity_for(state.current_stock, state.low_stock_threshold)?;
                Some(LowStockAlert {
                    item_id: state.item_id,
                    sku: state.sku.clone(),
                    name: state.name.clone(),
                    current_stock: state.current_stock,
                    low_stock_threshold: state.low_stock_threshold,
                    severity,
                    episode: state.episode,
                    acknowledgment: state.acknowledgment.clone(),
                })
            })
            .collect();

        alerts.sort_by(|a, b| {
            let rank = |s: AlertSeverity| match s {
                AlertSeverity::Critical => 0,
                AlertSeverity::Warning => 1,
            };
            rank(a.severity)
                .cmp(&rank(b.severity))
                .then(a.current_stock.cmp(&b.current_stock))
        });
        alerts
    }

    /// The active alert for one item, if any.
    pub fn alert_for(&self, item_id: ItemId) -> Option<LowStockAlert> {
        self.active_alerts()
            .into_iter()
            .find(|a| a.item_id == item_id)
    }

    /// Acknowledge the item's current alert episode. Does not change stock,
    /// and a later episode starts unacknowledged again.
    pub fn acknowledge(
        &self,
        item_id: ItemId,
        acknowledged_by: StaffId,
        acknowledged_by_name: String,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<LowStockAlert, DomainError> {
        let mut items = self
            .items
            .write()
            .map_err(|_| DomainError::invariant("alert state lock poisoned"))?;

        let state = items.get_mut(&item_id).ok_or(DomainError::NotFound)?;
        let severity = severity_for(state.current_stock, state.low_stock_threshold)
            .ok_or(DomainError::NotFound)?;

        state.acknowledgment = Some(Acknowledgment {
            acknowledged_by,
            acknowledged_by_name,
            acknowledged_at,
        });

        Ok(LowStockAlert {
            item_id: state.item_id,
            sku: state.sku.clone(),
            name: state.name.clone(),
            current_stock: state.current_stock,
            low_stock_threshold: state.low_stock_threshold,
            severity,
            episode: state.episode,
            acknowledgment: state.acknowledgment.clone(),
        })
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

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let mut items = self
            .items
            .write()
            .map_err(|_| ProjectionError::Deserialize("alert state lock poisoned".to_string()))?;

        match event {
            InventoryEvent::ItemCreated(e) => {
                items.insert(
                    e.item_id,
                    ItemAlertState {
                        item_id: e.item_id,
                        sku: e.sku,
                        name: e.name,
                        current_stock: 0,
                        low_stock_threshold: e.low_stock_threshold,
                        // Zero stock at creation is already an episode.
                        episode: 1,
                        acknowledgment: None,
                    },
                );
            }
            InventoryEvent::ItemDetailsUpdated(e) => {
                if let Some(state) = items.get_mut(&e.item_id) {
                    let was_alerting =
                        severity_for(state.current_stock, state.low_stock_threshold).is_some();
                    state.name = e.name;
                    state.low_stock_threshold = e.low_stock_threshold;
                    Self::roll_episode(state, was_alerting);
                }
            }
            InventoryEvent::ItemStatusChanged(_) => {}
            InventoryEvent::StockAdjusted(e) => {
                if let Some(state) = items.get_mut(&e.item_id) {
                    let was_alerting =
                        severity_for(state.current_stock, state.low_stock_threshold).is_some();
                    state.current_stock = e.new_stock;
                    Self::roll_episode(state, was_alerting);
                }
            }
        }

        drop(items);
        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }

    /// Start a fresh, unacknowledged episode when an item crosses from quiet
    /// to alerting; clear any stale acknowledgment when it recovers.
    fn roll_episode(state: &mut ItemAlertState, was_alerting: bool) {
        let is_alerting = severity_for(state.current_stock, state.low_stock_threshold).is_some();
        if !was_alerting && is_alerting {
            state.episode += 1;
            state.acknowledgment = None;
        } else if was_alerting && !is_alerting {
            state.acknowledgment = None;
        }
    }
}
