//! # Order & Payment Status
//!
//! Closed vocabularies for the only two mutable fields of an order, and the
//! transitions allowed between their values.
//!
//! ## Order Status
//! ```text
//!   processing ──► shipped ──► delivered
//!        │            │
//!        └────────────┴──────► cancelled
//! ```
//!
//! ## Payment Status
//! ```text
//!   pending ──► paid ──► refunded
//!      │
//!      └──────► failed
//! ```
//!
//! `failed` and `refunded` are final.
//!
//! Setting a field to its current value is accepted and changes nothing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::ValidationResult;

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet handed to a carrier.
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        self == next
            || matches!(
                (self, next),
                (Processing, Shipped)
                    | (Processing, Cancelled)
                    | (Shipped, Delivered)
                    | (Shipped, Cancelled)
            )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Processing
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| not_allowed("order_status", OrderStatus::ALL.map(OrderStatus::as_str)))
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Settlement state of an order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// No transition leaves a terminal state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        self == next
            || matches!(
                (self, next),
                (Pending, Paid) | (Pending, Failed) | (Paid, Refunded)
            )
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| {
                not_allowed("payment_status", PaymentStatus::ALL.map(PaymentStatus::as_str))
            })
    }
}

fn not_allowed(field: &str, allowed: [&str; 4]) -> ValidationError {
    ValidationError::NotAllowed {
        field: field.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// Status Update
// =============================================================================

/// An administrative status change. At least one field is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdate {
    /// Builds an update from raw request values.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::status::{OrderStatus, StatusUpdate};
    ///
    /// let update = StatusUpdate::parse(Some("shipped"), None).unwrap();
    /// assert_eq!(update.order_status, Some(OrderStatus::Shipped));
    ///
    /// assert!(StatusUpdate::parse(None, None).is_err());
    /// assert!(StatusUpdate::parse(Some("lost"), None).is_err());
    /// ```
    pub fn parse(order_status: Option<&str>, payment_status: Option<&str>) -> ValidationResult<Self> {
        let order_status = order_status
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<OrderStatus>)
            .transpose()?;
        let payment_status = payment_status
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<PaymentStatus>)
            .transpose()?;

        let update = StatusUpdate {
            order_status,
            payment_status,
        };
        update.ensure_non_empty()?;
        Ok(update)
    }

    pub fn ensure_non_empty(&self) -> ValidationResult<()> {
        if self.order_status.is_none() && self.payment_status.is_none() {
            return Err(ValidationError::Required {
                field: "order_status or payment_status".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the new pair of statuses, rejecting disallowed transitions.
    pub fn apply_to(
        &self,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> CoreResult<(OrderStatus, PaymentStatus)> {
        self.ensure_non_empty()?;

        let next_order = self.order_status.unwrap_or(order_status);
        if !order_status.can_transition_to(next_order) {
            return Err(CoreError::InvalidTransition {
                field: "order_status",
                from: order_status.to_string(),
                to: next_order.to_string(),
            });
        }

        let next_payment = self.payment_status.unwrap_or(payment_status);
        if !payment_status.can_transition_to(next_payment) {
            return Err(CoreError::InvalidTransition {
                field: "payment_status",
                from: payment_status.to_string(),
                to: next_payment.to_string(),
            });
        }

        Ok((next_order, next_payment))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
