//! Replay Fixtures
//!
//! A fixture describes a wallet's ledger state and a recorded stream of
//! chain events. Replaying it drives a dispatcher exactly as a live
//! subscription would.
//!
//! ```yaml
//! wallet: alice
//! fragments:
//!   - { transfer_id: "00", amount: 1000000, is_final: true }
//! deltas:
//!   tx1: 50000
//! finals: []
//! events:
//!   - { msgType: TX_ADDED_TO_MEMPOOL, txid: tx1 }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::config::ConfigError;
use crate::core_types::{Sats, WalletBinding};
use crate::reconcile::{ChainEvent, DispatchOutcome, EventDispatcher, InMemoryLedger, ValueFragment};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFixture {
    pub wallet: Option<String>,
    #[serde(default)]
    pub fragments: Vec<ValueFragment>,
    /// Net delta per transfer id for the fixture wallet
    #[serde(default)]
    pub deltas: BTreeMap<String, Sats>,
    /// Transfers the network already reports as final
    #[serde(default)]
    pub finals: Vec<String>,
    #[serde(default)]
    pub events: Vec<ChainEvent>,
}

impl ReplayFixture {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn wallet_binding(&self) -> Option<WalletBinding> {
        self.wallet.as_deref().map(WalletBinding::new)
    }

    /// Build the in-memory ledger the events are replayed against
    pub fn ledger(&self) -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new();
        if let Some(wallet) = self.wallet.as_deref() {
            for fragment in &self.fragments {
                ledger = ledger.with_fragment(wallet, fragment.clone());
            }
            for (txid, amount) in &self.deltas {
                ledger = ledger.with_delta(wallet, txid, *amount);
            }
        }
        for txid in &self.finals {
            ledger = ledger.with_final(txid);
        }
        ledger
    }
}

/// Tally of a replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub feedback: usize,
    pub resynced: usize,
    pub ignored: usize,
    pub failed: usize,
    pub available: Sats,
    pub transitional: Sats,
    pub pending: usize,
}

/// Feed every fixture event through the dispatcher, in order
///
/// A failing event is logged and counted; replay continues.
pub async fn replay(events: &[ChainEvent], dispatcher: &mut EventDispatcher) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for event in events {
        match dispatcher.dispatch(event.clone()).await {
            Ok(DispatchOutcome::Applied) => summary.applied += 1,
            Ok(DispatchOutcome::FinalityFeedback) => summary.feedback += 1,
            Ok(DispatchOutcome::Resynced) => summary.resynced += 1,
            Ok(DispatchOutcome::Ignored) => summary.ignored += 1,
            Err(e) => {
                error!(kind = event.kind(), code = e.code(), "Failed processing chain event: {}", e);
                summary.failed += 1;
            }
        }
    }

    let reconciler = dispatcher.reconciler();
    summary.available = reconciler.available_balance();
    summary.transitional = reconciler.transitional_balance();
    summary.pending = reconciler.pending_count();

    info!(
        events = events.len(),
        failed = summary.failed,
        available = summary.available,
        transitional = summary.transitional,
        "Replay complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ReconcilerConfig;
    use crate::reconcile::{BalanceReconciler, RecordingListener};

    const FIXTURE: &str = r#"
wallet: alice
fragments:
  - { transfer_id: "00", amount: 1000000, is_final: true }
  - { transfer_id: "p1", amount: 5000, is_final: false }
deltas:
  tx1: 50000
  tx2: 40000
  p1: 5000
finals: []
events:
  - { msgType: TX_ADDED_TO_MEMPOOL, txid: tx1 }
  - { msgType: TX_ADDED_TO_MEMPOOL, txid: tx2 }
  - { msgType: TX_FINALIZED, txid: tx2, finalizationReasonType: TX_FINALIZATION_REASON_PRE_CONSENSUS }
  - { msgType: TX_FINALIZED, txid: tx2, finalizationReasonType: TX_FINALIZATION_REASON_POST_CONSENSUS }
  - { msgType: TX_FINALIZED, txid: tx1, finalizationReasonType: TX_FINALIZATION_REASON_POST_CONSENSUS }
  - { msgType: TX_ADDED_TO_MEMPOOL, txid: ghost }
"#;

    #[tokio::test]
    async fn test_replay_fixture() {
        let fixture: ReplayFixture = serde_yaml::from_str(FIXTURE).unwrap();
        assert_eq!(fixture.events.len(), 6);

        let reconciler = BalanceReconciler::new(
            fixture.wallet_binding(),
            Arc::new(fixture.ledger()),
            Arc::new(RecordingListener::new()),
            ReconcilerConfig::default(),
        )
        .await;
        assert_eq!(reconciler.transitional_balance(), 5_000);

        let mut dispatcher = EventDispatcher::new(reconciler);
        let summary = replay(&fixture.events, &mut dispatcher).await;

        assert_eq!(summary.applied, 3);
        assert_eq!(summary.feedback, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.available, 1_090_000);
        assert_eq!(summary.transitional, 5_000);
        assert_eq!(summary.pending, 1);
    }

    #[test]
    fn test_fixture_without_wallet_builds_empty_ledger() {
        let fixture: ReplayFixture = serde_yaml::from_str("wallet: null\n").unwrap();
        assert!(fixture.wallet_binding().is_none());
        assert!(fixture.events.is_empty());
    }
}
