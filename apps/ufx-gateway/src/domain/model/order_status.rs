//! Order status in the lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical order status.
///
/// Ordered by terminality: `Submitting` precedes the live states, which
/// precede the terminal states. Venue status codes map onto this domain in
/// the venue adapter; unrecognized codes map to `Submitting` so an unknown
/// code never drops an order from view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Sent to the venue, not yet acknowledged into its book.
    Submitting,
    /// Acknowledged, no fills yet.
    NotTraded,
    /// Partially filled.
    PartTraded,
    /// Completely filled.
    AllTraded,
    /// Cancelled at the venue.
    Cancelled,
    /// Rejected by the venue.
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::AllTraded | Self::Cancelled | Self::Rejected)
    }

    /// Returns true if the order is still live at the venue.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Terminality rank: 0 submitting, 1 live, 2 terminal.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Submitting => 0,
            Self::NotTraded | Self::PartTraded => 1,
            Self::AllTraded | Self::Cancelled | Self::Rejected => 2,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitting => write!(f, "SUBMITTING"),
            Self::NotTraded => write!(f, "NOT_TRADED"),
            Self::PartTraded => write!(f, "PART_TRADED"),
            Self::AllTraded => write!(f, "ALL_TRADED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_is_terminal() {
        assert!(!OrderStatus::Submitting.is_terminal());
        assert!(!OrderStatus::NotTraded.is_terminal());
        assert!(!OrderStatus::PartTraded.is_terminal());
        assert!(OrderStatus::AllTraded.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn order_status_is_active() {
        assert!(OrderStatus::Submitting.is_active());
        assert!(OrderStatus::NotTraded.is_active());
        assert!(OrderStatus::PartTraded.is_active());
        assert!(!OrderStatus::Cancelled.is_active());
    }

    #[test]
    fn order_status_rank_is_ordered_by_terminality() {
        assert!(OrderStatus::Submitting.rank() < OrderStatus::NotTraded.rank());
        assert!(OrderStatus::NotTraded.rank() < OrderStatus::Cancelled.rank());
        assert_eq!(OrderStatus::NotTraded.rank(), OrderStatus::PartTraded.rank());
        assert_eq!(OrderStatus::AllTraded.rank(), OrderStatus::Rejected.rank());
    }

    #[test]
    fn order_status_display() {
        assert_eq!(format!("{}", OrderStatus::PartTraded), "PART_TRADED");
        assert_eq!(format!("{}", OrderStatus::AllTraded), "ALL_TRADED");
        assert_eq!(format!("{}", OrderStatus::Submitting), "SUBMITTING");
    }

    #[test]
    fn order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::PartTraded).unwrap();
        assert_eq!(json, "\"PART_TRADED\"");

        let parsed: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }
}
