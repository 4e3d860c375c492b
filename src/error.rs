//! Ledger error taxonomy.

use tonic::Status;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
///
/// Every variant maps to a terse, stable reason code (see [`LedgerError::code`]).
/// A duplicate sale is not an error: ingestion reports it through
/// `SaleReceipt::already_processed`.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stored record could not be decoded: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// SQLite result codes for lock contention (BUSY, LOCKED and their extended forms).
const SQLITE_CONTENTION_CODES: &[&str] = &["5", "6", "261", "262", "517"];

impl LedgerError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Stable reason code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Decode(_) | Self::Config(_) | Self::Database(_) => "internal",
        }
    }

    /// Whether the failed operation may succeed if retried unchanged.
    ///
    /// Only lock contention on the store qualifies; business failures never do.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConcurrencyConflict(_) => true,
            Self::Database(sqlx::Error::Database(db)) => db
                .code()
                .map(|code| SQLITE_CONTENTION_CODES.contains(&code.as_ref()))
                .unwrap_or(false),
            Self::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    /// Collapse a transient store error into a `ConcurrencyConflict` once
    /// retries are exhausted.
    pub fn into_conflict(self) -> Self {
        match self {
            e @ Self::Database(_) if e.is_transient() => Self::ConcurrencyConflict(e.to_string()),
            other => other,
        }
    }
}

impl From<LedgerError> for Status {
    fn from(err: LedgerError) -> Self {
        let code = err.code();
        match err {
            LedgerError::NotFound { .. } => Status::not_found(format!("{code}: {err}")),
            LedgerError::InvariantViolation(_) | LedgerError::InvalidTransition { .. } => {
                Status::failed_precondition(format!("{code}: {err}"))
            }
            LedgerError::ConcurrencyConflict(_) => {
                Status::aborted(format!("{code}: concurrent update, retry the request"))
            }
            LedgerError::InvalidArgument(_) => Status::invalid_argument(format!("{code}: {err}")),
            LedgerError::Decode(_) | LedgerError::Config(_) | LedgerError::Database(_) => {
                Status::internal(format!("{code}: internal ledger error"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_reason_codes() {
        assert_eq!(LedgerError::not_found("affiliate", "x").code(), "not_found");
        assert_eq!(
            LedgerError::InvariantViolation("x".into()).code(),
            "invariant_violation"
        );
        assert_eq!(
            LedgerError::ConcurrencyConflict("x".into()).code(),
            "concurrency_conflict"
        );
    }

    #[test]
    fn test_status_mapping() {
        let status: Status = LedgerError::not_found("product", "plan_x").into();
        assert_eq!(status.code(), Code::NotFound);

        let status: Status = LedgerError::InvalidTransition {
            entity: "payout",
            from: "completed",
            to: "completed",
        }
        .into();
        assert_eq!(status.code(), Code::FailedPrecondition);

        let status: Status = LedgerError::ConcurrencyConflict("busy".into()).into();
        assert_eq!(status.code(), Code::Aborted);
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let status: Status = LedgerError::Decode("bad uuid in sales.id".into()).into();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("sales.id"));
    }

    #[test]
    fn test_business_errors_are_not_transient() {
        assert!(!LedgerError::InvariantViolation("x".into()).is_transient());
        assert!(!LedgerError::not_found("affiliate", "x").is_transient());
        assert!(LedgerError::ConcurrencyConflict("x".into()).is_transient());
        assert!(LedgerError::Database(sqlx::Error::PoolTimedOut).is_transient());
    }
}
