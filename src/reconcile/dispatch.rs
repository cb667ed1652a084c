//! Chain Event Dispatcher
//!
//! Routes address-subscription notifications to the reconciler.
//!
//! | Message                              | Action                            |
//! |--------------------------------------|-----------------------------------|
//! | `TX_ADDED_TO_MEMPOOL`                | track as pending                  |
//! | `TX_CONFIRMED`                       | track if untracked and not final  |
//! | `TX_FINALIZED` (pre-consensus)       | fast fold, finality feedback      |
//! | `TX_FINALIZED` (post-consensus)      | settle, feedback or resync        |
//! | `TX_REMOVED_FROM_MEMPOOL`            | invalidate                        |
//! | `TX_INVALIDATED`                     | invalidate                        |

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::error::ReconcileError;
use super::manager::BalanceReconciler;
use super::state::PostConsensusOutcome;
use crate::core_types::TransferId;

pub const REASON_PRE_CONSENSUS: &str = "TX_FINALIZATION_REASON_PRE_CONSENSUS";
pub const REASON_POST_CONSENSUS: &str = "TX_FINALIZATION_REASON_POST_CONSENSUS";

/// A subscription message for one transfer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "msgType")]
pub enum ChainEvent {
    #[serde(rename = "TX_ADDED_TO_MEMPOOL")]
    AddedToMempool { txid: TransferId },

    #[serde(rename = "TX_CONFIRMED")]
    Confirmed { txid: TransferId },

    #[serde(rename = "TX_FINALIZED")]
    Finalized {
        txid: TransferId,
        #[serde(default, rename = "finalizationReasonType")]
        reason: Option<String>,
    },

    #[serde(rename = "TX_REMOVED_FROM_MEMPOOL")]
    RemovedFromMempool { txid: TransferId },

    #[serde(rename = "TX_INVALIDATED")]
    Invalidated { txid: TransferId },

    /// Any message type the wallet does not act on
    #[serde(other)]
    Unknown,
}

impl ChainEvent {
    pub fn txid(&self) -> Option<&TransferId> {
        match self {
            ChainEvent::AddedToMempool { txid }
            | ChainEvent::Confirmed { txid }
            | ChainEvent::Finalized { txid, .. }
            | ChainEvent::RemovedFromMempool { txid }
            | ChainEvent::Invalidated { txid } => Some(txid),
            ChainEvent::Unknown => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChainEvent::AddedToMempool { .. } => "TX_ADDED_TO_MEMPOOL",
            ChainEvent::Confirmed { .. } => "TX_CONFIRMED",
            ChainEvent::Finalized { .. } => "TX_FINALIZED",
            ChainEvent::RemovedFromMempool { .. } => "TX_REMOVED_FROM_MEMPOOL",
            ChainEvent::Invalidated { .. } => "TX_INVALIDATED",
            ChainEvent::Unknown => "UNKNOWN",
        }
    }
}

/// What the dispatcher did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Reconciler state was updated
    Applied,
    /// A transfer reached finality; the UI should give feedback
    FinalityFeedback,
    /// The reconciler lost track and the wallet was resynced
    Resynced,
    /// Nothing to do
    Ignored,
}

/// Owns a reconciler and feeds it chain events
pub struct EventDispatcher {
    reconciler: BalanceReconciler,
}

impl EventDispatcher {
    pub fn new(reconciler: BalanceReconciler) -> Self {
        Self { reconciler }
    }

    pub fn reconciler(&self) -> &BalanceReconciler {
        &self.reconciler
    }

    /// Decode a raw JSON message and dispatch it
    pub async fn dispatch_json(&mut self, raw: &str) -> Result<DispatchOutcome, ReconcileError> {
        let event: ChainEvent = serde_json::from_str(raw).inspect_err(|e| {
            error!("Skipping undecodable chain event: {}", e);
        })?;
        self.dispatch(event).await
    }

    /// Apply one event to the reconciler
    ///
    /// Rejections from the reconciler (duplicate, zero amount, out of range)
    /// are logged and reported as `Ignored`. Ledger failures and balance
    /// overflow are returned.
    pub async fn dispatch(&mut self, event: ChainEvent) -> Result<DispatchOutcome, ReconcileError> {
        let Some(txid) = event.txid().filter(|id| !id.is_empty()).cloned() else {
            warn!(kind = event.kind(), "Skipping chain event without txid");
            return Ok(DispatchOutcome::Ignored);
        };

        match event {
            ChainEvent::AddedToMempool { .. } => self.track(&txid, "mempool").await,
            ChainEvent::Confirmed { .. } => {
                if self.reconciler.is_pending_transfer(txid.as_str()) {
                    return Ok(DispatchOutcome::Ignored);
                }
                // A final transfer may or may not be accounted for already;
                // wait for its finalization to resync instead.
                if self.reconciler.ledger().is_final(&txid).await? {
                    debug!(txid = %txid, "Confirmed transfer already final, waiting");
                    return Ok(DispatchOutcome::Ignored);
                }
                self.track(&txid, "confirmed").await
            }
            ChainEvent::Finalized { ref reason, .. } => match reason.as_deref() {
                Some(REASON_PRE_CONSENSUS) => {
                    match self.reconciler.finalize_pre_consensus(txid.as_str()).await {
                        Ok(_) => {}
                        Err(e @ (ReconcileError::Ledger(_) | ReconcileError::Overflow)) => {
                            return Err(e);
                        }
                        Err(e) => debug!(txid = %txid, code = e.code(), "Pre-consensus not applied"),
                    }
                    Ok(DispatchOutcome::FinalityFeedback)
                }
                Some(REASON_POST_CONSENSUS) => {
                    match self.reconciler.finalize_post_consensus(txid.as_str()).await? {
                        PostConsensusOutcome::NewlyFinalized => Ok(DispatchOutcome::FinalityFeedback),
                        PostConsensusOutcome::AlreadyFinalized => Ok(DispatchOutcome::Applied),
                        PostConsensusOutcome::NotPending => {
                            info!(txid = %txid, "Finalized transfer was not pending, resyncing the wallet");
                            self.resync().await?;
                            Ok(DispatchOutcome::Resynced)
                        }
                    }
                }
                other => {
                    error!(txid = %txid, reason = ?other, "Unknown finalization reason");
                    Ok(DispatchOutcome::Ignored)
                }
            },
            ChainEvent::RemovedFromMempool { .. } | ChainEvent::Invalidated { .. } => {
                self.reconciler.invalidate_transfer(txid.as_str()).await?;
                info!(txid = %txid, reason = event.kind(), "Removed pending transfer");
                Ok(DispatchOutcome::Applied)
            }
            ChainEvent::Unknown => Ok(DispatchOutcome::Ignored),
        }
    }

    /// Refresh the ledger then re-derive balances
    pub async fn resync(&mut self) -> Result<(), ReconcileError> {
        if let Some(wallet) = self.reconciler.wallet().cloned() {
            self.reconciler.ledger().refresh(&wallet).await?;
        }
        self.reconciler.sync().await
    }

    async fn track(
        &mut self,
        txid: &TransferId,
        source: &'static str,
    ) -> Result<DispatchOutcome, ReconcileError> {
        match self.reconciler.add_non_final_transfer(txid.as_str()).await {
            Ok(entry) => {
                info!(txid = %txid, amount = entry.amount, source, "Added pending transfer");
                Ok(DispatchOutcome::Applied)
            }
            Err(ReconcileError::Ledger(e)) => Err(e.into()),
            Err(e) => {
                warn!(txid = %txid, code = e.code(), source, "Failed to add pending transfer");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }
}
