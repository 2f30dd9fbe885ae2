//! Low-stock evaluation.
//!
//! Alert state is derived, never stored: this module is the pure evaluation
//! core, and the read-model layer composes it with an acknowledgment side
//! table keyed per low-stock episode.

use serde::{Deserialize, Serialize};

/// Severity of a low-stock condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Stock is positive but at or below the threshold.
    Warning,
    /// Stock is exhausted (zero, or negative where negatives are allowed).
    Critical,
}

/// Evaluate the low-stock condition for one item.
///
/// Returns `None` when stock is comfortably above the threshold.
pub fn severity_for(current_stock: i64, low_stock_threshold: i64) -> Option<AlertSeverity> {
    if current_stock <= 0 {
        Some(AlertSeverity::Critical)
    } else if current_stock <= low_stock_threshold {
        Some(AlertSeverity::Warning)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_threshold_is_quiet() {
        assert_eq!(severity_for(10, 5), None);
        assert_eq!(severity_for(6, 5), None);
    }

    #[test]
    fn at_or_below_threshold_warns() {
        assert_eq!(severity_for(5, 5), Some(AlertSeverity::Warning));
        assert_eq!(severity_for(2, 5), Some(AlertSeverity::Warning));
        assert_eq!(severity_for(1, 5), Some(AlertSeverity::Warning));
    }

    #[test]
    fn exhausted_stock_is_critical() {
        assert_eq!(severity_for(0, 5), Some(AlertSeverity::Critical));
        assert_eq!(severity_for(-3, 5), Some(AlertSeverity::Critical));
    }

    #[test]
    fn zero_threshold_still_flags_empty_stock() {
        assert_eq!(severity_for(1, 0), None);
        assert_eq!(severity_for(0, 0), Some(AlertSeverity::Critical));
    }
}
