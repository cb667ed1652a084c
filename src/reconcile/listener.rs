//! Balance Change Listeners

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::state::BalanceChange;

/// Receives every externally visible balance change
///
/// The reconciler awaits the callback before the triggering operation
/// returns.
#[async_trait]
pub trait BalanceListener: Send + Sync {
    async fn on_balance_change(&self, change: BalanceChange);
}

/// Listener that only writes the change to the log
#[derive(Debug, Default)]
pub struct LoggingListener;

#[async_trait]
impl BalanceListener for LoggingListener {
    async fn on_balance_change(&self, change: BalanceChange) {
        if change.available_changed() {
            info!(
                from = change.from_available,
                to = change.to_available,
                transitional = change.transitional,
                "Available balance changed"
            );
        } else {
            debug!(
                available = change.to_available,
                transitional = change.transitional,
                "Transitional balance changed"
            );
        }
    }
}

/// Listener that keeps every change it receives, in order
#[derive(Debug, Default)]
pub struct RecordingListener {
    changes: Mutex<Vec<BalanceChange>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn changes(&self) -> Vec<BalanceChange> {
        self.changes.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.changes.lock().await.len()
    }

    pub async fn last(&self) -> Option<BalanceChange> {
        self.changes.lock().await.last().copied()
    }

    /// Forget recorded history
    pub async fn reset(&self) {
        self.changes.lock().await.clear();
    }
}

#[async_trait]
impl BalanceListener for RecordingListener {
    async fn on_balance_change(&self, change: BalanceChange) {
        self.changes.lock().await.push(change);
    }
}
