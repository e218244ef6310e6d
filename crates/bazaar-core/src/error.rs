//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Store failures, wraps CoreError                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorKind → caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is a rule the engine refused to break. None of them leave
/// partial writes behind: the database layer rolls back its scope before
/// surfacing one.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist, or is not owned by the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Not enough stock in one inventory cell.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (line: product 7, Red, M, qty 2)
    ///      │
    ///      ▼
    /// Ledger cell (7, Red, M): available = 1
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: 7, color_id, size_id, available: 1, requested: 2 }
    ///      │
    ///      ▼
    /// Whole order rolled back, cart untouched
    /// ```
    #[error(
        "Insufficient stock for product {product_id} (color {color_id}, size {size_id}): \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: i64,
        color_id: i64,
        size_id: i64,
        available: i64,
        requested: i64,
    },

    /// Checkout was attempted with no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The shipping address does not exist or belongs to someone else.
    #[error("Invalid shipping address: {address_id}")]
    InvalidAddress { address_id: i64 },

    /// A status update would move an order backwards or out of a final state.
    #[error("Cannot change {field} from {from} to {to}")]
    InvalidTransition {
        field: &'static str,
        from: String,
        to: String,
    },

    /// The request collides with existing state (duplicate name, row in use).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// A computed amount (line total, subtotal, tax) does not fit in Money.
    #[error("{field} is too large")]
    TooLarge { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., color hex that is not #RRGGBB).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: 7,
            color_id: 2,
            size_id: 3,
            available: 1,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 7 (color 2, size 3): available 1, requested 2"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "street".to_string(),
        };
        assert_eq!(err.to_string(), "street is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 999");
    }

    #[test]
    fn test_too_large_message() {
        let err = ValidationError::TooLarge {
            field: "subtotal".to_string(),
        };
        assert_eq!(err.to_string(), "subtotal is too large");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "payment_method".to_string(),
        };
        let core_err: CoreError = validation_err.into();

        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(
            core_err.to_string(),
            "Validation error: payment_method is required"
        );
    }

    #[test]
    fn test_not_found_helper() {
        let err = CoreError::not_found("Address", 42);
        assert_eq!(err.to_string(), "Address not found: 42");
    }
}
