use std::sync::Arc;

use wallet_reconciler::reconcile::RecordingListener;
use wallet_reconciler::{
    BalanceChange, BalanceReconciler, InMemoryLedger, PostConsensusOutcome, ReconcileError,
    ReconcilerConfig, ValueFragment, WalletBinding,
};

const WALLET: &str = "qa-wallet";

/// Wallet holding a single confirmed 1,000,000 sat fragment
async fn fresh(ledger: InMemoryLedger) -> (BalanceReconciler, Arc<RecordingListener>) {
    let ledger = ledger.with_fragment(WALLET, ValueFragment::new("genesis", 1_000_000, true));
    let listener = Arc::new(RecordingListener::new());
    let reconciler = BalanceReconciler::new(
        Some(WalletBinding::new(WALLET)),
        Arc::new(ledger),
        listener.clone(),
        ReconcilerConfig::default(),
    )
    .await;
    (reconciler, listener)
}

#[tokio::test]
async fn qa_incoming_transfer_settles_through_post_consensus() {
    let (mut r, listener) = fresh(InMemoryLedger::new().with_delta(WALLET, "tx1", 50_000)).await;
    assert_eq!(r.available_balance(), 1_000_000);

    r.add_non_final_transfer("tx1").await.unwrap();

    assert!(r.is_pending_transfer("tx1"));
    assert_eq!(r.transitional_balance(), 50_000);
    assert_eq!(r.available_balance(), 1_000_000);
    assert_eq!(
        listener.last().await,
        Some(BalanceChange {
            from_available: 1_000_000,
            to_available: 1_000_000,
            transitional: 50_000,
        })
    );

    assert_eq!(
        r.finalize_post_consensus("tx1").await,
        Ok(PostConsensusOutcome::NewlyFinalized)
    );
    assert_eq!(r.available_balance(), 1_050_000);
    assert_eq!(r.transitional_balance(), 0);
    assert!(!r.is_pending_transfer("tx1"));
}

#[tokio::test]
async fn qa_fast_path_is_never_double_folded() {
    let (mut r, listener) = fresh(InMemoryLedger::new().with_delta(WALLET, "tx2", 40_000)).await;

    r.add_non_final_transfer("tx2").await.unwrap();
    r.finalize_pre_consensus("tx2").await.unwrap();
    assert_eq!(r.available_balance(), 1_040_000);
    assert_eq!(r.transitional_balance(), 0);
    let calls_before = listener.call_count().await;

    assert_eq!(
        r.finalize_post_consensus("tx2").await,
        Ok(PostConsensusOutcome::AlreadyFinalized)
    );
    assert_eq!(r.available_balance(), 1_040_000);
    assert_eq!(listener.call_count().await, calls_before);

    // Late duplicates change nothing either
    assert_eq!(
        r.finalize_post_consensus("tx2").await,
        Ok(PostConsensusOutcome::NotPending)
    );
    assert_eq!(r.available_balance(), 1_040_000);
}

#[tokio::test]
async fn qa_duplicate_add_counts_amount_once() {
    let (mut r, _) = fresh(InMemoryLedger::new().with_delta(WALLET, "tx3", 12_345)).await;

    r.add_non_final_transfer("tx3").await.unwrap();
    let second = r.add_non_final_transfer("tx3").await;

    assert_eq!(second, Err(ReconcileError::DuplicateTransfer("tx3".into())));
    assert_eq!(r.transitional_balance(), 12_345);
}

#[tokio::test]
async fn qa_zero_delta_transfer_is_rejected() {
    let (mut r, listener) = fresh(InMemoryLedger::new().with_delta(WALLET, "tx4", 0)).await;

    let result = r.add_non_final_transfer("tx4").await;

    assert_eq!(result, Err(ReconcileError::ZeroAmountTransfer("tx4".into())));
    assert_eq!(r.pending_count(), 0);
    assert_eq!(listener.call_count().await, 0);
}

#[tokio::test]
async fn qa_transitional_tracks_awaiting_entries_through_any_sequence() {
    let deltas = [("a", 10_000), ("b", -3_000), ("c", 7_500), ("d", 1_250)];
    let mut ledger = InMemoryLedger::new();
    for (id, amount) in deltas {
        ledger = ledger.with_delta(WALLET, id, amount);
    }
    let (mut r, _) = fresh(ledger).await;

    for (id, _) in deltas {
        r.add_non_final_transfer(id).await.unwrap();
    }
    assert_eq!(r.transitional_balance(), 15_750);

    r.finalize_pre_consensus("a").await.unwrap();
    assert_eq!(r.transitional_balance(), 5_750);

    r.invalidate_transfer("b").await.unwrap();
    assert_eq!(r.transitional_balance(), 8_750);

    r.finalize_post_consensus("c").await.unwrap();
    assert_eq!(r.transitional_balance(), 1_250);

    r.finalize_post_consensus("a").await.unwrap();
    r.invalidate_transfer("d").await.unwrap();
    assert_eq!(r.transitional_balance(), 0);

    // genesis + a (fast path) + c (post consensus)
    assert_eq!(r.available_balance(), 1_017_500);
    assert_eq!(r.pending_count(), 0);
}
