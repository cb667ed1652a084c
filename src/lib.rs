//! Wallet Reconciler - finality-aware wallet balance tracking
//!
//! # Modules
//!
//! - [`core_types`] - Shared identifiers (TransferId, WalletBinding, Sats)
//! - [`reconcile`] - Balance reconciler, ledger seam and event dispatcher
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup
//! - [`fixture`] - Replay fixtures for the command-line driver

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod fixture;
pub mod logging;
pub mod reconcile;

// Convenient re-exports at crate root
pub use config::{AppConfig, ReconcilerConfig};
pub use core_types::{Sats, TransferId, WalletBinding};
pub use reconcile::{
    BalanceChange, BalanceListener, BalanceReconciler, ChainEvent, DispatchOutcome,
    EventDispatcher, FinalityState, InMemoryLedger, InvalidationPolicy, LedgerAccessor,
    PendingTransfer, PostConsensusOutcome, PreConsensusOutcome, ReconcileError, ValueFragment,
};
