//! # Validation Module
//!
//! Input checks that run before any transaction is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Required fields, lengths, ranges                                  │
//! │  └── Fails fast with ValidationError, nothing written                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Write scope (bazaar-db)                                      │
//! │  ├── Ownership, existence, stock                                       │
//! │  └── Rolled back on failure                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── partial UNIQUE index (one default / one primary)                  │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::AddressFields;
use crate::{MAX_ITEM_QUANTITY, MAX_PAYMENT_METHOD_LEN, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_text;
///
/// assert!(validate_text("city", "Lisbon", 100).is_ok());
/// assert!(validate_text("city", "   ", 100).is_err());
/// ```
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a shipping address. Every field is required.
pub fn validate_address_fields(fields: &AddressFields) -> ValidationResult<()> {
    validate_text("name", &fields.name, 100)?;
    validate_text("street", &fields.street, 200)?;
    validate_text("city", &fields.city, 100)?;
    validate_text("state", &fields.state, 100)?;
    validate_text("postal_code", &fields.postal_code, 20)?;
    validate_text("country", &fields.country, 100)?;
    validate_text("phone", &fields.phone, 30)?;
    Ok(())
}

/// Validates the payment method token chosen at checkout.
///
/// Payment itself happens elsewhere; the engine only records the token.
pub fn validate_payment_method(method: &str) -> ValidationResult<()> {
    validate_text("payment_method", method, MAX_PAYMENT_METHOD_LEN)
}

/// Validates an image URL. Only presence and length are checked here.
pub fn validate_image_url(url: &str) -> ValidationResult<()> {
    validate_text("image_url", url, 2048)
}

/// Validates an optional `#RRGGBB` color code.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_color_hex;
///
/// assert!(validate_color_hex(Some("#1A2b3C")).is_ok());
/// assert!(validate_color_hex(None).is_ok());
/// assert!(validate_color_hex(Some("red")).is_err());
/// ```
pub fn validate_color_hex(hex: Option<&str>) -> ValidationResult<()> {
    let Some(hex) = hex else {
        return Ok(());
    };

    let digits = hex.strip_prefix('#').unwrap_or("");
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field: "color_hex".to_string(),
            reason: "expected #RRGGBB".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    validate_reservation_quantity(qty)?;

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a quantity taken from or returned to the ledger.
///
/// Only positivity is checked; whether stock covers it is the ledger's call.
pub fn validate_reservation_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates an absolute stock level set by a restock. Zero is allowed.
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// The ceiling keeps every cart line and total far inside `Money`'s range.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "base_price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a discount in basis points (0% to 100%).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates a row id supplied by a caller.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressFields {
        AddressFields {
            name: "Home".to_string(),
            street: "1 Rua Augusta".to_string(),
            city: "Lisbon".to_string(),
            state: "Lisboa".to_string(),
            postal_code: "1100-053".to_string(),
            country: "PT".to_string(),
            phone: "+351 210 000 000".to_string(),
        }
    }

    #[test]
    fn test_validate_address_fields() {
        assert!(validate_address_fields(&address()).is_ok());

        let mut missing_phone = address();
        missing_phone.phone = " ".to_string();
        let err = validate_address_fields(&missing_phone).unwrap_err();
        assert_eq!(err.to_string(), "phone is required");

        let mut long_postal = address();
        long_postal.postal_code = "9".repeat(21);
        assert!(validate_address_fields(&long_postal).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_reservation_quantity_has_no_cart_ceiling() {
        assert!(validate_reservation_quantity(1).is_ok());
        assert!(validate_reservation_quantity(5_000).is_ok());
        assert!(validate_reservation_quantity(0).is_err());
        assert!(validate_reservation_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX / 100).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0).is_ok());
        assert!(validate_stock_level(50_000).is_ok());
        assert!(validate_stock_level(-1).is_err());
    }

    #[test]
    fn test_validate_payment_method() {
        assert!(validate_payment_method("card").is_ok());
        assert!(validate_payment_method("").is_err());
        assert!(validate_payment_method(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_rates() {
        assert!(validate_discount_bps(0).is_ok());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(10_001).is_err());
        assert!(validate_tax_rate_bps(1_000).is_ok());
        assert!(validate_tax_rate_bps(20_000).is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("address_id", 1).is_ok());
        assert!(validate_id("address_id", 0).is_err());
    }
}
