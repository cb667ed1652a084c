//! Wallet Reconciler - replay driver
//!
//! Replays a recorded stream of chain events against an in-memory ledger
//! and prints the resulting balances.
//!
//! ```text
//! ┌──────────┐    ┌────────────┐    ┌────────────┐    ┌──────────┐
//! │ Fixture  │───▶│ Dispatcher │───▶│ Reconciler │───▶│ Listener │
//! │  (YAML)  │    │ (msgType)  │    │ (balances) │    │  (log)   │
//! └──────────┘    └────────────┘    └────────────┘    └──────────┘
//! ```
//!
//! Usage: `wallet_reconciler --fixture fixtures/demo.yaml [--env dev]`

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::info;

use wallet_reconciler::config::AppConfig;
use wallet_reconciler::fixture::{ReplayFixture, replay};
use wallet_reconciler::logging::init_logging;
use wallet_reconciler::reconcile::{BalanceReconciler, EventDispatcher, LoggingListener};

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.windows(2)
        .find(|w| names.contains(&w[0].as_str()))
        .map(|w| w[1].clone())
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).unwrap_or_else(|e| {
        eprintln!("Using default config ({})", e);
        AppConfig::default()
    });
    let _guard = init_logging(&config);

    let Some(fixture_path) = get_arg(&["--fixture", "-f"]) else {
        bail!("missing --fixture <path>");
    };
    let fixture = ReplayFixture::from_file(&fixture_path)
        .with_context(|| format!("loading fixture {}", fixture_path))?;

    info!(
        env = %env,
        fixture = %fixture_path,
        events = fixture.events.len(),
        policy = ?config.reconciler.invalidation_policy,
        "Starting replay"
    );

    let reconciler = BalanceReconciler::new(
        fixture.wallet_binding(),
        Arc::new(fixture.ledger()),
        Arc::new(LoggingListener),
        config.reconciler.clone(),
    )
    .await;
    let mut dispatcher = EventDispatcher::new(reconciler);

    let summary = replay(&fixture.events, &mut dispatcher).await;

    println!("=== Replay Summary ===");
    println!("Applied:       {}", summary.applied);
    println!("Finality:      {}", summary.feedback);
    println!("Resynced:      {}", summary.resynced);
    println!("Ignored:       {}", summary.ignored);
    println!("Failed:        {}", summary.failed);
    println!("Available:     {}", summary.available);
    println!("Transitional:  {}", summary.transitional);
    println!("Pending:       {}", summary.pending);

    Ok(())
}
