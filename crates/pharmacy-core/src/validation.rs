//! # Validation Module
//!
//! Input validation applied before anything is written.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront / admin screens                                   │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (Rust)                                              │
//! │  ├── Closed-set parsing of status / method strings (FromStr)           │
//! │  └── THIS MODULE: field rules, named by field                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK / NOT NULL / UNIQUE constraints                             │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharmacy_core::validation::{validate_code, validate_quantity};
//!
//! validate_code("product_code", "PARA-500").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a business code (product, branch, campaign, voucher, order).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use pharmacy_core::validation::validate_code;
///
/// assert!(validate_code("branch_code", "CN01").is_ok());
/// assert!(validate_code("branch_code", "").is_err());
/// assert!(validate_code("branch_code", "CN 01").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required(field));
    }

    if code.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a free-text name (recipient, campaign).
///
/// Must not be blank; at most 200 characters.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a Vietnamese phone number.
///
/// ## Rules
/// - 10 digits starting with `0`, or `+84` followed by 9 digits
/// - Spaces and dots are ignored
///
/// ## Example
/// ```rust
/// use pharmacy_core::validation::validate_phone;
///
/// assert!(validate_phone("0901 234 567").is_ok());
/// assert!(validate_phone("+84901234567").is_ok());
/// assert!(validate_phone("12345").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let compact: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();

    if compact.is_empty() {
        return Err(ValidationError::required("recipient_phone"));
    }

    let digits = match compact.strip_prefix("+84") {
        Some(rest) => format!("0{}", rest),
        None => compact,
    };

    if digits.len() != 10 || !digits.starts_with('0') || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ValidationError::InvalidFormat {
            field: "recipient_phone".to_string(),
            reason: "expected 10 digits starting with 0".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a campaign or voucher percentage: 1 to 100.
pub fn validate_discount_percent(field: &str, pct: u8) -> ValidationResult<()> {
    if !(1..=100).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: 100,
        });
    }
    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates that `end` is strictly after `start`.
pub fn validate_date_range(field: &str, start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if end <= start {
        return Err(ValidationError::InvalidDateRange {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
