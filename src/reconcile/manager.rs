//! Balance Reconciler
//!
//! Tracks the available and transitional balance of one wallet while two
//! independent finality signals arrive for the same transfers.
//!
//! # Transfer lifecycle
//!
//! ```text
//! (unseen) ──add_non_final──────▶ AwaitingFinality
//! (unseen) ──pre_consensus──────▶ Finalized         (amount folded)
//! AwaitingFinality ──pre────────▶ Finalized         (amount folded)
//! AwaitingFinality ──post───────▶ [removed]         (amount folded)
//! Finalized ──post──────────────▶ [removed]         (NOT folded again)
//! (any) ──invalidate────────────▶ [removed]
//! ```
//!
//! # Invariants
//!
//! 1. **Derived transitional**: `transitional` is recomputed from the pending
//!    map after every mutation, never accumulated
//! 2. **Exactly-once fold**: a transfer moves `available` at most once, no
//!    matter how many finality signals arrive
//! 3. **Exact amounts**: `available` only moves by a transfer's ledger delta
//!
//! Mutating operations take `&mut self`, so operations on one reconciler
//! never interleave between the duplicate check and the map update.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, info, warn};

use super::error::ReconcileError;
use super::ledger::LedgerAccessor;
use super::listener::BalanceListener;
use super::state::{
    BalanceChange, FinalityState, InvalidationPolicy, PendingTransfer, PostConsensusOutcome,
    PreConsensusOutcome,
};
use crate::config::ReconcilerConfig;
use crate::core_types::{MAX_MONEY, Sats, TransferId, WalletBinding};

/// Balance reconciliation manager for a single wallet binding
pub struct BalanceReconciler {
    wallet: Option<WalletBinding>,
    ledger: Arc<dyn LedgerAccessor>,
    listener: Arc<dyn BalanceListener>,
    config: ReconcilerConfig,
    pending: FxHashMap<TransferId, PendingTransfer>,
    available: Sats,
    transitional: Sats,
}

impl BalanceReconciler {
    /// Create a reconciler and run the initial sync
    ///
    /// A failing initial sync is logged and leaves both balances at zero;
    /// call [`sync`](Self::sync) again once the ledger recovers.
    pub async fn new(
        wallet: Option<WalletBinding>,
        ledger: Arc<dyn LedgerAccessor>,
        listener: Arc<dyn BalanceListener>,
        config: ReconcilerConfig,
    ) -> Self {
        let mut reconciler = Self {
            wallet,
            ledger,
            listener,
            config,
            pending: FxHashMap::default(),
            available: 0,
            transitional: 0,
        };

        if let Err(e) = reconciler.sync().await {
            warn!(code = e.code(), "Initial sync failed: {}", e);
        }

        reconciler
    }

    /// Re-derive balances from the ledger
    ///
    /// `available` becomes the sum of final fragments plus fast-path credits
    /// the ledger does not report as final yet. Non-final fragments are
    /// registered as pending when not already tracked. The listener is not
    /// invoked. Nothing changes unless every fragment is accepted.
    pub async fn sync(&mut self) -> Result<(), ReconcileError> {
        let Some(wallet) = self.wallet.clone() else {
            debug!("Sync skipped: no wallet bound");
            return Ok(());
        };

        let fragments = self.ledger.spendable_fragments(&wallet).await?;

        let mut confirmed: Sats = 0;
        let mut final_ids = FxHashSet::default();
        let mut unsettled: FxHashMap<TransferId, Sats> = FxHashMap::default();
        for fragment in fragments {
            let amount = in_money_range(&fragment.transfer_id, fragment.amount)?;
            if fragment.is_final {
                confirmed = checked_sum(&fragment.transfer_id, confirmed, amount)?;
                final_ids.insert(fragment.transfer_id);
            } else {
                let slot = unsettled.entry(fragment.transfer_id.clone()).or_default();
                *slot = checked_sum(&fragment.transfer_id, *slot, amount)?;
            }
        }

        let mut available = confirmed;
        for (id, entry) in &self.pending {
            if entry.state == FinalityState::Finalized && !final_ids.contains(id) {
                available = checked_sum(id, available, entry.amount)?;
            }
        }

        let mut registrations = Vec::new();
        for (id, amount) in unsettled {
            if amount == 0 || self.pending.contains_key(&id) {
                continue;
            }
            in_money_range(&id, amount)?;
            registrations.push((id, PendingTransfer::awaiting(amount)));
        }

        let registered = registrations.len();
        self.available = available;
        self.pending.extend(registrations);
        self.recompute_transitional();

        info!(
            wallet = %wallet,
            available = self.available,
            transitional = self.transitional,
            registered,
            "Wallet synced"
        );
        Ok(())
    }

    /// Bind to another wallet (or none) and resync
    ///
    /// Pending entries of the previous binding are kept.
    pub async fn update_wallet_binding(
        &mut self,
        wallet: Option<WalletBinding>,
    ) -> Result<(), ReconcileError> {
        info!(
            from = ?self.wallet.as_ref().map(|w| w.wallet_id.as_str()),
            to = ?wallet.as_ref().map(|w| w.wallet_id.as_str()),
            pending = self.pending.len(),
            "Rebinding wallet"
        );
        self.wallet = wallet;
        self.sync().await
    }

    pub fn is_pending_transfer(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Track a transfer that has been seen but not finalized
    pub async fn add_non_final_transfer(
        &mut self,
        id: &str,
    ) -> Result<PendingTransfer, ReconcileError> {
        let wallet = self.bound_wallet()?;

        if self.pending.contains_key(id) {
            debug!(txid = %id, "Transfer already tracked");
            return Err(ReconcileError::DuplicateTransfer(id.into()));
        }

        let transfer_id = TransferId::from(id);
        let amount = self.fetch_delta(&wallet, &transfer_id).await?;

        let entry = PendingTransfer::awaiting(amount);
        self.pending.insert(transfer_id, entry);
        self.recompute_transitional();

        info!(txid = %id, amount, transitional = self.transitional, "Pending transfer added");
        self.notify(self.available).await;
        Ok(entry)
    }

    /// Fast-path finality: fold the amount into `available` now
    pub async fn finalize_pre_consensus(
        &mut self,
        id: &str,
    ) -> Result<PreConsensusOutcome, ReconcileError> {
        let entry = match self.pending.get(id).copied() {
            Some(entry) if entry.state == FinalityState::Finalized => {
                debug!(txid = %id, "Pre-consensus already applied");
                return Ok(PreConsensusOutcome::AlreadyFinalized);
            }
            Some(entry) => entry,
            None => {
                let wallet = self.bound_wallet()?;
                let amount = self.fetch_delta(&wallet, &id.into()).await?;
                PendingTransfer::finalized(amount)
            }
        };

        let from = self.available;
        let to = self.credited(id, entry.amount)?;
        self.pending
            .insert(id.into(), PendingTransfer::finalized(entry.amount));
        self.available = to;
        self.recompute_transitional();

        info!(txid = %id, amount = entry.amount, available = self.available, "Pre-consensus finalized");
        self.notify(from).await;
        Ok(PreConsensusOutcome::Folded(entry.amount))
    }

    /// Authoritative finality: settle and stop tracking the transfer
    pub async fn finalize_post_consensus(
        &mut self,
        id: &str,
    ) -> Result<PostConsensusOutcome, ReconcileError> {
        let Some(entry) = self.pending.get(id).copied() else {
            debug!(txid = %id, "Post-consensus for untracked transfer");
            return Ok(PostConsensusOutcome::NotPending);
        };

        match entry.state {
            FinalityState::Finalized => {
                self.pending.remove(id);
                self.recompute_transitional();
                debug!(txid = %id, "Post-consensus after pre-consensus, nothing to fold");
                Ok(PostConsensusOutcome::AlreadyFinalized)
            }
            FinalityState::AwaitingFinality => {
                let from = self.available;
                self.available = self.credited(id, entry.amount)?;
                self.pending.remove(id);
                self.recompute_transitional();

                info!(
                    txid = %id,
                    amount = entry.amount,
                    available = self.available,
                    "Post-consensus finalized"
                );
                self.notify(from).await;
                Ok(PostConsensusOutcome::NewlyFinalized)
            }
        }
    }

    /// Drop a transfer that will never settle
    ///
    /// Notifies even when `id` was not tracked. Returns the removed entry,
    /// if any.
    pub async fn invalidate_transfer(
        &mut self,
        id: &str,
    ) -> Result<Option<PendingTransfer>, ReconcileError> {
        let from = self.available;
        let tracked = self.pending.get(id).copied();

        if let Some(entry) = tracked {
            if entry.state == FinalityState::Finalized
                && self.config.invalidation_policy == InvalidationPolicy::ClawBack
            {
                let reversed = entry.amount.checked_neg().ok_or(ReconcileError::Overflow)?;
                self.available = self.credited(id, reversed)?;
                warn!(txid = %id, amount = entry.amount, "Provisional credit reversed");
            }
            self.pending.remove(id);
            info!(txid = %id, state = %entry.state, "Transfer invalidated");
        } else {
            debug!(txid = %id, "Invalidated untracked transfer");
        }

        self.recompute_transitional();
        self.notify(from).await;
        Ok(tracked)
    }

    pub fn available_balance(&self) -> Sats {
        self.available
    }

    pub fn transitional_balance(&self) -> Sats {
        self.transitional
    }

    pub fn wallet(&self) -> Option<&WalletBinding> {
        self.wallet.as_ref()
    }

    pub fn pending_transfer(&self, id: &str) -> Option<&PendingTransfer> {
        self.pending.get(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerAccessor> {
        &self.ledger
    }

    fn bound_wallet(&self) -> Result<WalletBinding, ReconcileError> {
        self.wallet.clone().ok_or_else(|| {
            warn!("Operation requires a bound wallet");
            ReconcileError::NotBound
        })
    }

    /// Ask the ledger for a non-zero, in-range delta
    async fn fetch_delta(
        &self,
        wallet: &WalletBinding,
        transfer_id: &TransferId,
    ) -> Result<Sats, ReconcileError> {
        let amount = self.ledger.net_value_delta(wallet, transfer_id).await?;
        if amount == 0 {
            debug!(txid = %transfer_id, "Transfer does not touch the wallet");
            return Err(ReconcileError::ZeroAmountTransfer(transfer_id.clone()));
        }
        in_money_range(transfer_id, amount)
    }

    fn credited(&self, id: &str, amount: Sats) -> Result<Sats, ReconcileError> {
        self.available.checked_add(amount).ok_or_else(|| {
            error!(txid = %id, amount, available = self.available, "Available balance overflow");
            ReconcileError::Overflow
        })
    }

    // Tracked amounts are bounded by MAX_MONEY; overflowing the sum would
    // take more than 4,000 maximum-size entries.
    fn recompute_transitional(&mut self) {
        self.transitional = self
            .pending
            .values()
            .filter(|p| p.state.is_transitional())
            .map(|p| p.amount)
            .sum();
    }

    async fn notify(&self, from_available: Sats) {
        self.listener
            .on_balance_change(BalanceChange {
                from_available,
                to_available: self.available,
                transitional: self.transitional,
            })
            .await;
    }
}

fn in_money_range(id: &TransferId, amount: Sats) -> Result<Sats, ReconcileError> {
    if (-MAX_MONEY..=MAX_MONEY).contains(&amount) {
        Ok(amount)
    } else {
        warn!(txid = %id, amount, "Ledger amount out of range");
        Err(ReconcileError::AmountOutOfRange(id.clone(), amount))
    }
}

fn checked_sum(id: &TransferId, acc: Sats, amount: Sats) -> Result<Sats, ReconcileError> {
    acc.checked_add(amount).ok_or_else(|| {
        error!(txid = %id, acc, amount, "Balance overflow during sync");
        ReconcileError::Overflow
    })
}
