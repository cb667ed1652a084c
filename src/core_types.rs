//! Core types used throughout the system
//!
//! Fundamental aliases and identifiers shared by the reconciler, the ledger
//! seam and the event dispatcher.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Signed amount in the smallest currency unit (satoshis).
///
/// # Sign convention:
/// - **Positive**: value flows into the wallet
/// - **Negative**: value leaves the wallet
/// - **Zero**: the transfer does not touch this wallet
pub type Sats = i64;

/// Largest magnitude any single ledger amount may have (total coin supply).
pub const MAX_MONEY: Sats = 2_100_000_000_000_000;

/// Transfer identifier - opaque handle correlating both finality signals.
///
/// No ordering semantics; only equality and hashing are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TransferId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The wallet the reconciler is currently bound to.
///
/// Ledger queries are always scoped to a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletBinding {
    pub wallet_id: String,
}

impl WalletBinding {
    pub fn new(wallet_id: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
        }
    }
}

impl fmt::Display for WalletBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wallet_id)
    }
}
