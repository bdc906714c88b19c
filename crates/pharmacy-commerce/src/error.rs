//! # API Error Type
//!
//! Unified error type for every service operation.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Pharmacy Commerce                      │
//! │                                                                         │
//! │  Service call                                                           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │  Database Error? ─── DbError::QueryFailed("...") ──┐  (logged,   │  │
//! │  │         │                                          │   hidden)   │  │
//! │  │  Domain refusal? ─── CoreError::InsufficientStock ─┼── ApiError ─►│  │
//! │  │         │                                          │             │  │
//! │  │  Decision race? ──── CoreError::AlreadyDecided ────┘  (benign)   │  │
//! │  │         │                                                        │  │
//! │  │  Success ───────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for PARA-500 at branch CN01: ..." }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages are meant for the person at the screen. Database internals
//! are logged and replaced with a generic message.

use serde::Serialize;
use tracing::error;
use ts_rs::TS;

use pharmacy_core::CoreError;
use pharmacy_db::DbError;

/// Result type for service operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned from service operations.
///
/// ```json
/// {
///   "code": "ALREADY_PROCESSED",
///   "message": "Receipt NH20260610-1A2B3C4D was already processed (Approved)"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Requested quantity exceeds branch stock
    InsufficientStock,

    /// Status change not allowed from the current status
    InvalidTransition,

    /// Receipt decided by someone else first; show as a notice
    AlreadyProcessed,

    /// Role may not perform the action (403)
    Forbidden,

    /// Anonymous cart at checkout
    SignInRequired,

    /// Voucher expired, used up or unknown
    VoucherUnavailable,

    /// Payment gateway or another collaborator failed
    UpstreamFailure,

    /// Cart limits exceeded
    CartError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// True for outcomes the screen shows as a notice rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self.code, ErrorCode::AlreadyProcessed)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Unknown branch or product")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed, please retry")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, please retry")
            }
            DbError::CorruptValue { column, value } => {
                error!(column = %column, value = %value, "Corrupt value in database");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match err {
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CoreError::AlreadyDecided { .. } => ErrorCode::AlreadyProcessed,
            CoreError::Forbidden { .. } => ErrorCode::Forbidden,
            CoreError::CheckoutUnavailable => ErrorCode::SignInRequired,
            CoreError::VoucherUnavailable { .. } => ErrorCode::VoucherUnavailable,
            CoreError::UpstreamFailure { .. } => ErrorCode::UpstreamFailure,
            CoreError::CartTooLarge { .. } => ErrorCode::CartError,
            CoreError::QuantityTooLarge { .. } => ErrorCode::ValidationError,
            CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
