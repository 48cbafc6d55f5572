//! Expiry Sweep
//!
//! The only transition not triggered by a caller. Each subscription's target
//! status is a pure function of `(status, expiry_date, today, grace)`, so
//! running the sweep twice, or on two instances at once, changes nothing the
//! first run did not. A renewal that commits between our load and our save
//! wins; the subscription is skipped and looked at again next run.

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::lifecycle::SubscriptionLifecycle;
use crate::model::SubscriptionStatus;
use campus_tenant::{CrossTenantAccess, TenantContext, TenantOwned};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub to_grace_period: usize,
    pub to_expired: usize,
    /// Lost to a concurrent lifecycle write
    pub skipped_conflicts: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn transitioned(&self) -> usize {
        self.to_grace_period + self.to_expired
    }
}

/// Scheduled expiry sweep
pub struct ExpirySweep {
    lifecycle: Arc<SubscriptionLifecycle>,
}

impl ExpirySweep {
    pub fn new(lifecycle: Arc<SubscriptionLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Sweep every tenant's subscriptions once.
    ///
    /// A failure on one subscription is logged and counted; it never stops
    /// the sweep for the others.
    pub async fn run_once(&self) -> SubscriptionResult<SweepReport> {
        let ctx = TenantContext::superadmin();
        let subscriptions = self
            .lifecycle
            .list_all_for(&ctx, CrossTenantAccess::ExpirySweep)
            .await?;
        let now = self.lifecycle.clock().now();

        let mut report = SweepReport::default();
        for subscription in subscriptions {
            report.examined += 1;
            let id = subscription.id();
            let tenant_id = subscription.tenant_id();

            match self.lifecycle.sweep_one(subscription, now).await {
                Ok(None) => {}
                Ok(Some((_, SubscriptionStatus::GracePeriod))) => report.to_grace_period += 1,
                Ok(Some((_, SubscriptionStatus::Expired))) => report.to_expired += 1,
                Ok(Some((from, to))) => {
                    error!(subscription_id = %id, from = %from, to = %to, "unexpected sweep transition");
                    report.failed += 1;
                }
                Err(SubscriptionError::ConcurrentModification(_)) => {
                    warn!(subscription_id = %id, tenant_id = %tenant_id, "sweep skipped, subscription changed concurrently");
                    report.skipped_conflicts += 1;
                }
                Err(e) => {
                    error!(subscription_id = %id, tenant_id = %tenant_id, error = %e, "sweep failed for subscription");
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            to_grace_period = report.to_grace_period,
            to_expired = report.to_expired,
            skipped_conflicts = report.skipped_conflicts,
            failed = report.failed,
            "expiry sweep complete"
        );
        Ok(report)
    }

    /// Sweep now and then every `period` until `shutdown` resolves.
    /// Returns the number of completed sweeps.
    pub async fn run_every<S>(&self, period: Duration, shutdown: S) -> u64
    where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut runs = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(runs = runs, "expiry sweep stopped");
                    return runs;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(_) => runs += 1,
                        Err(e) => error!(error = %e, "expiry sweep aborted"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_catalog, PlanCatalog};
    use crate::config::SubscriptionConfig;
    use crate::lifecycle::CreateSubscription;
    use crate::model::tests::date;
    use crate::plan::{BillingCycle, PlanType};
    use crate::model::Subscription;
    use crate::repository::{InMemorySubscriptionRepository, SubscriptionRepository};
    use async_trait::async_trait;
    use campus_common::{Clock, ManualClock, RepoResult, RepositoryError, SubscriptionId, TenantId};
    use chrono::Duration as Days;
    use parking_lot::Mutex;

    /// Delegates to the in-memory repository but refuses saves for one id
    #[derive(Default)]
    struct RejectingSaves {
        inner: InMemorySubscriptionRepository,
        rejected: Mutex<Option<SubscriptionId>>,
    }

    #[async_trait]
    impl SubscriptionRepository for RejectingSaves {
        async fn insert(&self, subscription: &Subscription) -> RepoResult<()> {
            self.inner.insert(subscription).await
        }

        async fn get(&self, id: SubscriptionId) -> RepoResult<Subscription> {
            self.inner.get(id).await
        }

        async fn find_current_by_tenant(&self, tenant_id: TenantId) -> RepoResult<Option<Subscription>> {
            self.inner.find_current_by_tenant(tenant_id).await
        }

        async fn list_for_tenant(&self, tenant_id: TenantId) -> RepoResult<Vec<Subscription>> {
            self.inner.list_for_tenant(tenant_id).await
        }

        async fn list_all(&self) -> RepoResult<Vec<Subscription>> {
            self.inner.list_all().await
        }

        async fn save(&self, subscription: &Subscription, expected_version: u64) -> RepoResult<()> {
            if *self.rejected.lock() == Some(subscription.id()) {
                return Err(RepositoryError::StorageError("disk full".into()));
            }
            self.inner.save(subscription, expected_version).await
        }
    }

    async fn setup() -> (Arc<SubscriptionLifecycle>, Arc<ManualClock>) {
        setup_with(Arc::new(InMemorySubscriptionRepository::new())).await
    }

    async fn setup_with(repo: Arc<dyn SubscriptionRepository>) -> (Arc<SubscriptionLifecycle>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_date(date(2024, 12, 31)));
        let plans = Arc::new(PlanCatalog::in_memory());
        for plan in default_catalog() {
            plans.upsert(plan).await.unwrap();
        }
        let basic = plans.get_by_type(PlanType::Basic).await.unwrap();
        let lifecycle = Arc::new(SubscriptionLifecycle::new(
            repo,
            plans,
            clock.clone(),
            SubscriptionConfig::default(),
        ));

        let ops = TenantContext::superadmin();
        for _ in 0..3 {
            let request = CreateSubscription::at_list_price(campus_common::TenantId::new(), &basic, BillingCycle::Monthly)
                .with_payment_captured();
            lifecycle.create(&ops, request).await.unwrap();
        }
        let pending = CreateSubscription::at_list_price(campus_common::TenantId::new(), &basic, BillingCycle::Monthly);
        lifecycle.create(&ops, pending).await.unwrap();
        (lifecycle, clock)
    }

    #[tokio::test]
    async fn test_sweep_moves_to_grace_then_expired() {
        let (lifecycle, clock) = setup().await;
        let sweep = ExpirySweep::new(lifecycle.clone());

        // expiry 2025-01-31
        clock.set_date(date(2025, 1, 31));
        assert_eq!(sweep.run_once().await.unwrap().transitioned(), 0);

        clock.set_date(date(2025, 2, 5));
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.examined, 4);
        assert_eq!(report.to_grace_period, 3);
        assert_eq!(report.to_expired, 0);

        clock.set_date(date(2025, 2, 10));
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.to_expired, 3);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (lifecycle, clock) = setup().await;
        let sweep = ExpirySweep::new(lifecycle.clone());
        clock.set_date(date(2025, 2, 20));

        let first = sweep.run_once().await.unwrap();
        assert_eq!(first.to_expired, 3);

        let second = sweep.run_once().await.unwrap();
        assert_eq!(second, SweepReport { examined: 4, ..Default::default() });
    }

    #[tokio::test]
    async fn test_renewed_subscription_not_swept() {
        let (lifecycle, clock) = setup().await;
        let ops = TenantContext::superadmin();
        let mut rx = lifecycle.subscribe();

        let target = lifecycle
            .expiring_within(&ops, 31)
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        clock.advance(Days::days(20));
        lifecycle.renew(&ops, target.id(), BillingCycle::Monthly).await.unwrap();

        clock.set_date(date(2025, 2, 3));
        let report = ExpirySweep::new(lifecycle.clone()).run_once().await.unwrap();
        assert_eq!(report.to_grace_period, 2);
        assert_eq!(
            lifecycle.get(&ops, target.id()).await.unwrap().status(),
            SubscriptionStatus::Active
        );

        let renewed = rx.recv().await.unwrap();
        assert_eq!(renewed.subscription_id, target.id());
    }

    #[tokio::test]
    async fn test_stale_sweep_loses_to_committed_renewal() {
        let (lifecycle, clock) = setup().await;
        let ops = TenantContext::superadmin();
        clock.set_date(date(2025, 2, 3));

        let target = lifecycle.expiring_within(&ops, 0).await.unwrap().remove(0);
        let stale = lifecycle.get(&ops, target.id()).await.unwrap();
        let renewed = lifecycle.renew(&ops, target.id(), BillingCycle::Monthly).await.unwrap();

        assert_eq!(
            lifecycle.sweep_one(stale, clock.now()).await,
            Err(SubscriptionError::ConcurrentModification(target.id()))
        );
        let stored = lifecycle.get(&ops, target.id()).await.unwrap();
        assert_eq!(stored.status(), SubscriptionStatus::Active);
        assert_eq!(stored.expiry_date(), renewed.expiry_date());
        assert_eq!(stored.version(), renewed.version());
    }

    #[tokio::test]
    async fn test_one_failed_save_does_not_stop_the_sweep() {
        let repo = Arc::new(RejectingSaves::default());
        let (lifecycle, clock) = setup_with(repo.clone()).await;
        let ops = TenantContext::superadmin();
        clock.set_date(date(2025, 2, 3));

        let broken = lifecycle.expiring_within(&ops, 0).await.unwrap().remove(0);
        *repo.rejected.lock() = Some(broken.id());

        let report = ExpirySweep::new(lifecycle.clone()).run_once().await.unwrap();
        assert_eq!(report.examined, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.to_grace_period, 2);
        assert_eq!(report.skipped_conflicts, 0);

        assert_eq!(
            lifecycle.get(&ops, broken.id()).await.unwrap().status(),
            SubscriptionStatus::Active
        );
        let in_grace = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.status() == SubscriptionStatus::GracePeriod)
            .count();
        assert_eq!(in_grace, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_every_until_shutdown() {
        let (lifecycle, _clock) = setup().await;
        let sweep = ExpirySweep::new(lifecycle);

        let runs = sweep
            .run_every(Duration::from_secs(60), tokio::time::sleep(Duration::from_secs(150)))
            .await;
        assert_eq!(runs, 3);
    }
}
