//! Payment status state machine.

use serde::{Deserialize, Serialize};

/// The status of a payment attempt.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──► Completed ──► Refunded
///    │            │
///    │            ├──► Failed
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
    ];

    /// Returns the statuses reachable from this one in a single step.
    pub fn allowed_transitions(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[PaymentStatus::Processing, PaymentStatus::Cancelled],
            PaymentStatus::Processing => &[
                PaymentStatus::Completed,
                PaymentStatus::Failed,
                PaymentStatus::Cancelled,
            ],
            PaymentStatus::Completed => &[PaymentStatus::Refunded],
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Returns true if the amount may still change.
    pub fn can_update_amount(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if entering this status stamps the processed-at time.
    pub fn stamps_processed_at(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Returns true once the gateway outcome is known.
    ///
    /// Completed counts as final even though it can still be refunded.
    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown payment status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown payment status: {0}")]
pub struct ParsePaymentStatusError(pub String);

impl std::str::FromStr for PaymentStatus {
    type Err = ParsePaymentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePaymentStatusError(s.to_string()))
    }
}
