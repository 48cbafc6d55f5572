//! Campus Gatekeeper
//!
//! Loads the subscription snapshot, runs the expiry sweep on a fixed
//! interval until ctrl-c, then writes the swept table back.

use anyhow::Context;
use campus_common::SystemClock;
use campus_gatekeeper::{snapshot, Gatekeeper};
use campus_subscription::{InMemorySubscriptionRepository, SubscriptionConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Snapshot location override
const ENV_SUBSCRIPTIONS_FILE: &str = "CAMPUS_SUBSCRIPTIONS_FILE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SubscriptionConfig::from_env().context("loading subscription config")?;
    let snapshot_path = PathBuf::from(
        std::env::var(ENV_SUBSCRIPTIONS_FILE).unwrap_or_else(|_| "subscriptions.json".into()),
    );
    tracing::info!(
        grace_period_days = config.grace_period_days,
        sweep_interval_secs = config.sweep_interval_secs,
        expiring_soon_days = config.expiring_soon_days,
        snapshot = %snapshot_path.display(),
        "configuration loaded"
    );

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    snapshot::load(&snapshot_path, repo.as_ref())
        .await
        .with_context(|| format!("loading {}", snapshot_path.display()))?;

    let gatekeeper = Gatekeeper::new(repo.clone(), Arc::new(SystemClock), config)
        .await
        .context("starting gatekeeper")?;
    let runs = gatekeeper
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await;

    snapshot::save(&snapshot_path, repo.as_ref())
        .await
        .with_context(|| format!("saving {}", snapshot_path.display()))?;
    tracing::info!(runs = runs, "gatekeeper stopped");
    Ok(())
}
