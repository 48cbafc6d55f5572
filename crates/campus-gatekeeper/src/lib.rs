//! Campus Gatekeeper
//!
//! Hosts the scheduled expiry sweep over a subscription repository supplied
//! by the embedding process. The `campus-gatekeeper` binary backs it with a
//! JSON snapshot file that is loaded at start and written back on shutdown.

pub mod snapshot;

use campus_common::Clock;
use campus_subscription::{
    default_catalog, ExpirySweep, PlanCatalog, SubscriptionConfig, SubscriptionLifecycle, SubscriptionRepository,
    SubscriptionResult, SweepReport,
};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

pub use snapshot::SnapshotError;

/// Sweep runner over a host-supplied repository
pub struct Gatekeeper {
    lifecycle: Arc<SubscriptionLifecycle>,
    sweep: ExpirySweep,
}

impl Gatekeeper {
    /// Build over `subscriptions` with the standard plan ladder loaded
    pub async fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        clock: Arc<dyn Clock>,
        config: SubscriptionConfig,
    ) -> SubscriptionResult<Self> {
        let plans = Arc::new(PlanCatalog::in_memory());
        for plan in default_catalog() {
            plans.upsert(plan).await?;
        }
        info!(plans = plans.list_active().await?.len(), "plan catalog seeded");

        let lifecycle = Arc::new(SubscriptionLifecycle::new(subscriptions, plans, clock, config));
        Ok(Self {
            sweep: ExpirySweep::new(lifecycle.clone()),
            lifecycle,
        })
    }

    pub fn lifecycle(&self) -> &Arc<SubscriptionLifecycle> {
        &self.lifecycle
    }

    /// One sweep across every tenant
    pub async fn sweep_once(&self) -> SubscriptionResult<SweepReport> {
        self.sweep.run_once().await
    }

    /// Sweep on the configured interval until `shutdown` resolves.
    /// Returns the number of completed sweeps.
    pub async fn run<S>(&self, shutdown: S) -> u64
    where
        S: Future<Output = ()>,
    {
        let period = self.lifecycle.config().sweep_interval();
        info!(period_secs = period.as_secs(), "gatekeeper sweeping");
        self.sweep.run_every(period, shutdown).await
    }
}
