//! Movement vocabulary: directions, reasons, and references back to the
//! operation that caused a stock change.

use serde::{Deserialize, Serialize};

use glowdesk_core::AggregateId;

/// Direction of a stock movement, derived from the sign of the adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    In,
    Out,
}

/// Why a movement happened. Closed set; each reason is valid for one
/// direction only, except the correction reasons which go either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    // Stock-in only.
    Received,
    Returned,
    TransferIn,
    InitialStock,
    // Stock-out only.
    Sold,
    Damaged,
    Expired,
    Lost,
    Stolen,
    UsedInService,
    TransferOut,
    // Either direction.
    StocktakeAdjustment,
    Other,
}

impl MovementReason {
    /// The direction this reason is restricted to, or `None` when it is
    /// valid for both.
    pub fn fixed_direction(self) -> Option<MovementDirection> {
        match self {
            MovementReason::Received
            | MovementReason::Returned
            | MovementReason::TransferIn
            | MovementReason::InitialStock => Some(MovementDirection::In),
            MovementReason::Sold
            | MovementReason::Damaged
            | MovementReason::Expired
            | MovementReason::Lost
            | MovementReason::Stolen
            | MovementReason::UsedInService
            | MovementReason::TransferOut => Some(MovementDirection::Out),
            MovementReason::StocktakeAdjustment | MovementReason::Other => None,
        }
    }

    /// Whether this reason may be recorded with the given direction.
    pub fn allows(self, direction: MovementDirection) -> bool {
        match self.fixed_direction() {
            Some(fixed) => fixed == direction,
            None => true,
        }
    }
}

/// Kind of operation a movement links back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    PurchaseOrder,
    Stocktake,
    Sale,
}

/// Link from a movement to the operation that produced it.
///
/// Kept id-based (not typed per aggregate) so the inventory crate stays a
/// leaf: purchasing and stocktake both depend on it, not the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    pub kind: ReferenceKind,
    pub id: AggregateId,
}

impl MovementReference {
    pub fn purchase_order(id: AggregateId) -> Self {
        Self {
            kind: ReferenceKind::PurchaseOrder,
            id,
        }
    }

    pub fn stocktake(id: AggregateId) -> Self {
        Self {
            kind: ReferenceKind::Stocktake,
            id,
        }
    }

    pub fn sale(id: AggregateId) -> Self {
        Self {
            kind: ReferenceKind::Sale,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_in_reasons_reject_outbound_use() {
        for reason in [
            MovementReason::Received,
            MovementReason::Returned,
            MovementReason::TransferIn,
            MovementReason::InitialStock,
        ] {
            assert!(reason.allows(MovementDirection::In));
            assert!(!reason.allows(MovementDirection::Out));
        }
    }

    #[test]
    fn stock_out_reasons_reject_inbound_use() {
        for reason in [
            MovementReason::Sold,
            MovementReason::Damaged,
            MovementReason::Expired,
            MovementReason::Lost,
            MovementReason::Stolen,
            MovementReason::UsedInService,
            MovementReason::TransferOut,
        ] {
            assert!(reason.allows(MovementDirection::Out));
            assert!(!reason.allows(MovementDirection::In));
        }
    }

    #[test]
    fn correction_reasons_allow_both_directions() {
        for reason in [MovementReason::StocktakeAdjustment, MovementReason::Other] {
            assert!(reason.allows(MovementDirection::In));
            assert!(reason.allows(MovementDirection::Out));
        }
    }
}
