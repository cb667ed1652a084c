//! Reconciler Error Types

use thiserror::Error;

use crate::core_types::{Sats, TransferId};

/// Errors reported by a ledger collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Reconciler operation failures
///
/// All variants are recoverable. An operation that returns one of these
/// has left the manager state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("No wallet is bound")]
    NotBound,

    #[error("Transfer already tracked: {0}")]
    DuplicateTransfer(TransferId),

    #[error("Transfer does not affect this wallet: {0}")]
    ZeroAmountTransfer(TransferId),

    #[error("Ledger amount out of range for {0}: {1}")]
    AmountOutOfRange(TransferId, Sats),

    #[error("Balance overflow")]
    Overflow,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Malformed chain event: {0}")]
    Decode(String),
}

impl ReconcileError {
    /// Stable error code for logs and callers
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::NotBound => "NOT_BOUND",
            ReconcileError::DuplicateTransfer(_) => "DUPLICATE_TRANSFER",
            ReconcileError::ZeroAmountTransfer(_) => "ZERO_AMOUNT_TRANSFER",
            ReconcileError::AmountOutOfRange(..) => "AMOUNT_OUT_OF_RANGE",
            ReconcileError::Overflow => "OVERFLOW",
            ReconcileError::Ledger(_) => "LEDGER_ERROR",
            ReconcileError::Decode(_) => "DECODE_ERROR",
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(e: serde_json::Error) -> Self {
        ReconcileError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ReconcileError::NotBound.code(), "NOT_BOUND");
        assert_eq!(
            ReconcileError::DuplicateTransfer("aa".into()).code(),
            "DUPLICATE_TRANSFER"
        );
        assert_eq!(
            ReconcileError::ZeroAmountTransfer("aa".into()).code(),
            "ZERO_AMOUNT_TRANSFER"
        );
        assert_eq!(ReconcileError::Overflow.code(), "OVERFLOW");
        assert_eq!(
            ReconcileError::AmountOutOfRange("aa".into(), -1).code(),
            "AMOUNT_OUT_OF_RANGE"
        );
    }

    #[test]
    fn test_ledger_error_converts() {
        let err: ReconcileError = LedgerError::Unavailable("timeout".into()).into();
        assert_eq!(err.code(), "LEDGER_ERROR");
        assert_eq!(err.to_string(), "Ledger error: Ledger unavailable: timeout");
    }
}
