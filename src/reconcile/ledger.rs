//! Ledger Seam
//!
//! The reconciler never inspects transactions itself. Everything it knows
//! about value comes through [`LedgerAccessor`].

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::error::LedgerError;
use crate::core_types::{Sats, TransferId, WalletBinding};

/// An unspent value fragment owned by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFragment {
    /// Transfer that created the fragment
    pub transfer_id: TransferId,
    pub amount: Sats,
    pub is_final: bool,
}

impl ValueFragment {
    pub fn new(transfer_id: impl Into<TransferId>, amount: Sats, is_final: bool) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            amount,
            is_final,
        }
    }
}

/// Wallet ledger interface
///
/// Implementations own network access, retries and persistence.
#[async_trait]
pub trait LedgerAccessor: Send + Sync {
    /// Net value a transfer moves in or out of the wallet
    ///
    /// Returns 0 when the transfer does not touch the wallet.
    async fn net_value_delta(
        &self,
        wallet: &WalletBinding,
        transfer_id: &TransferId,
    ) -> Result<Sats, LedgerError>;

    /// All currently known unspent fragments of the wallet
    async fn spendable_fragments(
        &self,
        wallet: &WalletBinding,
    ) -> Result<Vec<ValueFragment>, LedgerError>;

    /// Whether the network already reports the transfer as final
    async fn is_final(&self, transfer_id: &TransferId) -> Result<bool, LedgerError>;

    /// Re-pull wallet state from the network
    async fn refresh(&self, wallet: &WalletBinding) -> Result<(), LedgerError>;
}

#[derive(Debug, Default)]
struct LedgerTables {
    fragments: FxHashMap<String, Vec<ValueFragment>>,
    deltas: FxHashMap<(String, TransferId), Sats>,
    finals: FxHashSet<TransferId>,
    /// While set, every query fails with `Unavailable`
    outage: Option<String>,
}

impl LedgerTables {
    fn check_available(&self) -> Result<(), LedgerError> {
        match &self.outage {
            Some(reason) => Err(LedgerError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory ledger
///
/// Backs the replay binary and the tests. Build it with the `with_*`
/// methods, then mutate through the async setters while it is shared.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    tables: RwLock<LedgerTables>,
    refresh_count: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(mut self, wallet_id: &str, fragment: ValueFragment) -> Self {
        self.tables
            .get_mut()
            .fragments
            .entry(wallet_id.to_string())
            .or_default()
            .push(fragment);
        self
    }

    pub fn with_delta(mut self, wallet_id: &str, transfer_id: &str, amount: Sats) -> Self {
        self.tables
            .get_mut()
            .deltas
            .insert((wallet_id.to_string(), TransferId::from(transfer_id)), amount);
        self
    }

    pub fn with_final(mut self, transfer_id: &str) -> Self {
        self.tables.get_mut().finals.insert(TransferId::from(transfer_id));
        self
    }

    /// Replace the fragment set of a wallet
    pub async fn set_fragments(&self, wallet_id: &str, fragments: Vec<ValueFragment>) {
        self.tables
            .write()
            .await
            .fragments
            .insert(wallet_id.to_string(), fragments);
    }

    pub async fn mark_final(&self, transfer_id: &str) {
        self.tables
            .write()
            .await
            .finals
            .insert(TransferId::from(transfer_id));
    }

    /// Simulate a network outage (`Some`) or recover from one (`None`)
    pub async fn set_unavailable(&self, reason: Option<&str>) {
        self.tables.write().await.outage = reason.map(str::to_string);
    }

    /// Number of `refresh` calls served
    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerAccessor for InMemoryLedger {
    async fn net_value_delta(
        &self,
        wallet: &WalletBinding,
        transfer_id: &TransferId,
    ) -> Result<Sats, LedgerError> {
        let tables = self.tables.read().await;
        tables.check_available()?;
        tables
            .deltas
            .get(&(wallet.wallet_id.clone(), transfer_id.clone()))
            .copied()
            .ok_or_else(|| LedgerError::TransferNotFound(transfer_id.clone()))
    }

    async fn spendable_fragments(
        &self,
        wallet: &WalletBinding,
    ) -> Result<Vec<ValueFragment>, LedgerError> {
        let tables = self.tables.read().await;
        tables.check_available()?;
        Ok(tables
            .fragments
            .get(&wallet.wallet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_final(&self, transfer_id: &TransferId) -> Result<bool, LedgerError> {
        let tables = self.tables.read().await;
        tables.check_available()?;
        Ok(tables.finals.contains(transfer_id))
    }

    async fn refresh(&self, _wallet: &WalletBinding) -> Result<(), LedgerError> {
        self.tables.read().await.check_available()?;
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delta_is_scoped_to_wallet() {
        let ledger = InMemoryLedger::new().with_delta("alice", "tx1", 500);
        let alice = WalletBinding::new("alice");
        let bob = WalletBinding::new("bob");

        assert_eq!(
            ledger.net_value_delta(&alice, &"tx1".into()).await,
            Ok(500)
        );
        assert_eq!(
            ledger.net_value_delta(&bob, &"tx1".into()).await,
            Err(LedgerError::TransferNotFound("tx1".into()))
        );
    }

    #[tokio::test]
    async fn test_unknown_wallet_has_no_fragments() {
        let ledger = InMemoryLedger::new();
        let frags = ledger
            .spendable_fragments(&WalletBinding::new("nobody"))
            .await
            .unwrap();
        assert!(frags.is_empty());
    }

    #[tokio::test]
    async fn test_setters_visible_through_trait() {
        let ledger = InMemoryLedger::new();
        ledger
            .set_fragments("alice", vec![ValueFragment::new("aa", 10, true)])
            .await;
        ledger.mark_final("aa").await;

        let frags = ledger
            .spendable_fragments(&WalletBinding::new("alice"))
            .await
            .unwrap();
        assert_eq!(frags.len(), 1);
        assert!(ledger.is_final(&"aa".into()).await.unwrap());

        ledger.refresh(&WalletBinding::new("alice")).await.unwrap();
        assert_eq!(ledger.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_outage_fails_every_query_until_cleared() {
        let ledger = InMemoryLedger::new()
            .with_delta("alice", "tx1", 500)
            .with_final("tx1");
        let alice = WalletBinding::new("alice");
        ledger.set_unavailable(Some("connection reset")).await;

        let down = LedgerError::Unavailable("connection reset".into());
        assert_eq!(
            ledger.net_value_delta(&alice, &"tx1".into()).await,
            Err(down.clone())
        );
        assert_eq!(ledger.is_final(&"tx1".into()).await, Err(down));
        assert!(ledger.spendable_fragments(&alice).await.is_err());
        assert!(ledger.refresh(&alice).await.is_err());
        assert_eq!(ledger.refresh_count(), 0);

        ledger.set_unavailable(None).await;
        assert_eq!(ledger.net_value_delta(&alice, &"tx1".into()).await, Ok(500));
        assert_eq!(ledger.is_final(&"tx1".into()).await, Ok(true));
    }
}
