//! Finality State Definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core_types::Sats;

/// Finality state of a tracked transfer
///
/// ```text
/// AwaitingFinality ──pre-consensus──▶ Finalized
/// ```
///
/// The transition happens at most once. `Finalized` entries only live in the
/// gap between the pre-consensus and post-consensus signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalityState {
    /// Seen but not settled - contributes to the transitional balance
    AwaitingFinality,
    /// Folded into the available balance by the fast path
    Finalized,
}

impl FinalityState {
    /// Whether the amount still counts toward the transitional balance
    #[inline]
    pub fn is_transitional(&self) -> bool {
        matches!(self, FinalityState::AwaitingFinality)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalityState::AwaitingFinality => "AWAITING_FINALITY",
            FinalityState::Finalized => "FINALIZED",
        }
    }
}

impl fmt::Display for FinalityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transfer whose value has not been authoritatively settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransfer {
    /// Net delta for the wallet, never zero
    pub amount: Sats,
    pub state: FinalityState,
}

impl PendingTransfer {
    pub fn awaiting(amount: Sats) -> Self {
        Self {
            amount,
            state: FinalityState::AwaitingFinality,
        }
    }

    pub fn finalized(amount: Sats) -> Self {
        Self {
            amount,
            state: FinalityState::Finalized,
        }
    }
}

/// Result of an authoritative (post-consensus) finality notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostConsensusOutcome {
    /// The transfer was never tracked; its value is assumed reflected by sync
    NotPending,
    /// The fast path already folded the amount; entry dropped without refold
    AlreadyFinalized,
    /// The amount was folded by this notice
    NewlyFinalized,
}

/// Result of a fast (pre-consensus) finality notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreConsensusOutcome {
    /// The amount was folded into the available balance
    Folded(Sats),
    /// A previous fast notice already folded the amount
    AlreadyFinalized,
}

/// Balance snapshot handed to the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceChange {
    pub from_available: Sats,
    pub to_available: Sats,
    pub transitional: Sats,
}

impl BalanceChange {
    /// True when the available balance actually moved
    #[inline]
    pub fn available_changed(&self) -> bool {
        self.from_available != self.to_available
    }
}

/// What to do with a provisional credit when its transfer is invalidated
/// after the pre-consensus signal already folded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Keep the folded amount; pre-consensus finality is treated as final
    #[default]
    RetainProvisional,
    /// Reverse the folded amount
    ClawBack,
}
