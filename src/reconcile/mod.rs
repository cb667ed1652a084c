//! Wallet Balance Reconciliation
//!
//! Keeps one wallet's available and transitional balance consistent while
//! two finality signals arrive for each transfer:
//! - **Pre-consensus**: fast and provisional, trusted for UI responsiveness
//! - **Post-consensus**: slower and authoritative
//!
//! # Safety Invariants
//!
//! 1. **Derived transitional**: always the sum of transfers awaiting finality
//! 2. **Exactly-once fold**: no transfer reaches `available` twice
//! 3. **Exact amounts**: `available` moves only by ledger-reported deltas
//! 4. **Order independence**: duplicated or reordered signals converge

pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod listener;
pub mod manager;
pub mod state;

// Re-exports for convenience
pub use dispatch::{ChainEvent, DispatchOutcome, EventDispatcher};
pub use error::{LedgerError, ReconcileError};
pub use ledger::{InMemoryLedger, LedgerAccessor, ValueFragment};
pub use listener::{BalanceListener, LoggingListener, RecordingListener};
pub use manager::BalanceReconciler;
pub use state::{
    BalanceChange, FinalityState, InvalidationPolicy, PendingTransfer, PostConsensusOutcome,
    PreConsensusOutcome,
};
