//! Engine error taxonomy.

use crate::config::ConfigError;
use crate::ports::{QueueError, StoreError};
use ledger_types::{Amount, AmountError, CurrencyError, StatusError};
use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the ledger engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad amount, bad currency, self-transfer. No state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist. No state change.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requester does not own the referenced account or transaction.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Sender's available balance cannot cover the transfer.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// `balance - locked` at submission.
        available: Amount,
        /// Requested transfer amount.
        requested: Amount,
    },

    /// A ledger invariant failed where it should have been impossible.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// Persistence-layer failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Queue-layer failure.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Unusable configuration; fatal at boot.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Failures attributable to the caller: surface them, change nothing.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::NotFound(_)
                | Self::Forbidden(_)
                | Self::InsufficientFunds { .. }
        )
    }

    /// Failures a later cycle may clear without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Transient(_)) | Self::Queue(_))
    }
}

impl From<AmountError> for EngineError {
    fn from(err: AmountError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<CurrencyError> for EngineError {
    fn from(err: CurrencyError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<StatusError> for EngineError {
    fn from(err: StatusError) -> Self {
        Self::InvariantViolation(err.to_string())
    }
}
