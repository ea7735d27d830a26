use crate::domain::ids::TransactionId;
use thiserror::Error;

/// Every failure the ledger reports to its callers.
///
/// None of these cross the library boundary as panics: the surrounding
/// application receives them as values and shows [`LedgerError::reason`].
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("transaction {0} was already processed")]
    AlreadyProcessed(TransactionId),
    #[error("validation failed: {0}")]
    ValidationError(String),
    #[error("access denied")]
    AccessDenied,
    #[error("concurrent update conflict")]
    Conflict,
    #[error("persistence failure: {0}")]
    PersistenceError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Short human-readable reason for the admin UI.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Lost races on an already-settled transaction are expected, not faults.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadyProcessed(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        Self::PersistenceError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
