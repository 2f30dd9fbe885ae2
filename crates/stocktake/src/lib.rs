//! Stocktake domain module (event-sourced).
//!
//! A stocktake is a physical-count reconciliation session: expected
//! quantities are frozen at the start, counts are recorded per item, and
//! completion yields the corrective adjustments the stock ledger should apply.

pub mod session;

pub use session::{
    CancelStocktake, CompleteStocktake, CountRecorded, RecordCount, SnapshotLine, StartStocktake,
    StockCorrection, Stocktake, StocktakeCancelled, StocktakeCommand, StocktakeCompleted,
    StocktakeEvent, StocktakeId, StocktakeLine, StocktakeStarted, StocktakeStatus,
};
