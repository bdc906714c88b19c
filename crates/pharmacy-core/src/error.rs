//! # Error Types
//!
//! Domain-specific error types for pharmacy-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharmacy-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule refusals                         │
//! │  └── ValidationError  - Malformed or missing input fields              │
//! │                                                                         │
//! │  pharmacy-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures (+ refusals raised in a tx)  │
//! │                                                                         │
//! │  pharmacy-commerce errors                                              │
//! │  └── ApiError         - What the storefront / staff screens see        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Screen       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery by Category
//! | Variant              | Recovered by                                       |
//! |----------------------|----------------------------------------------------|
//! | `Validation`         | refusing before any write, naming the field        |
//! | `InsufficientStock`  | clamping (cart) or failing only that line (order)  |
//! | `InvalidTransition`  | nothing; the single request fails                  |
//! | `AlreadyDecided`     | a benign "already processed" notice                |
//! | `UpstreamFailure`    | retry; no half-created aggregate is left behind    |

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An entity referenced by code or id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Requested quantity exceeds the branch's stock on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart asks for 3 × Panadol at branch CN01
    ///      │
    ///      ▼
    /// BranchStock[CN01, Panadol] = 2
    ///      │
    ///      ├── cart context:     clamp line to 2, show low-stock notice
    ///      └── checkout context: fail only this order line
    /// ```
    #[error(
        "Insufficient stock for {product_code} at branch {branch_code}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_code: String,
        branch_code: String,
        available: i64,
        requested: i64,
    },

    /// The requested status change is not an edge of the lifecycle table.
    #[error("{entity} {code} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: String,
        code: String,
        from: String,
        to: String,
    },

    /// A stock receipt already carries a terminal decision.
    #[error("Receipt {receipt_code} was already processed ({status})")]
    AlreadyDecided { receipt_code: String, status: String },

    /// The acting role may not perform the action.
    #[error("Role {role} is not allowed to {action}")]
    Forbidden { action: String, role: String },

    /// Checkout attempted from an anonymous cart.
    #[error("Sign in to check out")]
    CheckoutUnavailable,

    /// Voucher missing, expired or used up.
    #[error("Voucher {code} cannot be used: {reason}")]
    VoucherUnavailable { code: String, reason: String },

    /// A collaborator (catalog, voucher store, payment gateway) failed.
    #[error("{collaborator} failed: {message}")]
    UpstreamFailure {
        collaborator: String,
        message: String,
    },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Forbidden error.
    pub fn forbidden(action: impl Into<String>, role: impl std::fmt::Display) -> Self {
        CoreError::Forbidden {
            action: action.into(),
            role: role.to_string(),
        }
    }

    /// Creates an UpstreamFailure error.
    pub fn upstream(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::UpstreamFailure {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write happens; each variant names the field so the
/// screen can highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid phone number, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A start/end pair is out of order.
    #[error("{field}: end date must be after start date")]
    InvalidDateRange { field: String },

    /// Duplicate value (e.g., the same product twice on one receipt).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Creates a Required error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
