//! Subscription Lifecycle Engine
//!
//! Every mutation follows the same shape: load, apply the transition to the
//! loaded copy, save against the loaded version. A writer whose version moved
//! underneath it gets `ConcurrentModification` and nothing is written, so two
//! racing renewals can never both extend the expiry date.
//!
//! Lifecycle calls take an explicit `TenantContext`. Out-of-scope
//! subscriptions read as not found.

use crate::catalog::PlanCatalog;
use crate::config::SubscriptionConfig;
use crate::entitlements;
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::events::{EventBus, SubscriptionEvent};
use crate::gate::AccessGate;
use crate::model::{Operation, Subscription, SubscriptionStatus};
use crate::plan::{BillingCycle, SubscriptionPlan};
use crate::repository::SubscriptionRepository;
use campus_common::{Clock, PlanId, RepositoryError, SubscriptionId, TenantId};
use campus_tenant::{CrossTenantAccess, IsolationFilter, TenantContext, TenantOwned};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Create request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSubscription {
    pub tenant_id: TenantId,
    pub plan_id: PlanId,
    pub billing_cycle: BillingCycle,
    pub amount: Decimal,
    pub currency: String,
    /// Payment already settled; start `Active` instead of `PendingPayment`
    pub payment_captured: bool,
}

impl CreateSubscription {
    /// Request at the plan's list price for `billing_cycle`
    pub fn at_list_price(tenant_id: TenantId, plan: &SubscriptionPlan, billing_cycle: BillingCycle) -> Self {
        Self {
            tenant_id,
            plan_id: plan.id,
            billing_cycle,
            amount: plan.price_for(billing_cycle),
            currency: plan.currency.clone(),
            payment_captured: false,
        }
    }

    pub fn with_payment_captured(mut self) -> Self {
        self.payment_captured = true;
        self
    }
}

/// Subscription lifecycle engine
pub struct SubscriptionLifecycle {
    subscriptions: Arc<dyn SubscriptionRepository>,
    plans: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    config: SubscriptionConfig,
}

impl SubscriptionLifecycle {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        plans: Arc<PlanCatalog>,
        clock: Arc<dyn Clock>,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            subscriptions,
            plans,
            clock,
            events: EventBus::new(),
            config,
        }
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Receive every committed transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.events.subscribe()
    }

    /// Access gate over the same storage and clock
    pub fn gate(&self) -> AccessGate {
        AccessGate::new(self.subscriptions.clone(), self.clock.clone())
    }

    /// Create a subscription for `request.tenant_id`.
    ///
    /// Fails with `DuplicateSubscription` if the tenant already holds a
    /// non-cancelled subscription, `PlanUnavailable` if the plan is hidden.
    pub async fn create(&self, ctx: &TenantContext, request: CreateSubscription) -> SubscriptionResult<Subscription> {
        IsolationFilter::check_write(ctx, &request.tenant_id)?;

        let plan = self.plans.get(request.plan_id).await?;
        if !plan.is_active {
            return Err(SubscriptionError::PlanUnavailable(plan.id));
        }

        let subscription = Subscription::create(
            request.tenant_id,
            &plan,
            request.billing_cycle,
            request.amount,
            request.currency,
            request.payment_captured,
            self.clock.now(),
        )?;

        self.subscriptions
            .insert(&subscription)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => SubscriptionError::DuplicateSubscription(request.tenant_id),
                other => other.into(),
            })?;

        info!(
            subscription_id = %subscription.id(),
            tenant_id = %subscription.tenant_id(),
            plan = %plan.plan_type,
            cycle = %subscription.billing_cycle(),
            status = %subscription.status(),
            expiry = %subscription.expiry_date(),
            "subscription created"
        );
        self.events
            .publish(SubscriptionEvent::committed(Operation::Create, None, &subscription));
        Ok(subscription)
    }

    /// `PendingPayment | Suspended -> Active`
    pub async fn activate(&self, ctx: &TenantContext, id: SubscriptionId) -> SubscriptionResult<Subscription> {
        let mut subscription = self.load(ctx, id).await?;
        let (from, version) = (subscription.status(), subscription.version());
        subscription.activate(self.clock.now())?;
        self.commit(Operation::Activate, from, version, subscription).await
    }

    /// `Active | GracePeriod -> Suspended`
    pub async fn suspend(
        &self,
        ctx: &TenantContext,
        id: SubscriptionId,
        reason: &str,
    ) -> SubscriptionResult<Subscription> {
        let mut subscription = self.load(ctx, id).await?;
        let (from, version) = (subscription.status(), subscription.version());
        subscription.suspend(reason, self.clock.now())?;
        self.commit(Operation::Suspend, from, version, subscription).await
    }

    /// Any non-terminal status `-> Cancelled`
    pub async fn cancel(&self, ctx: &TenantContext, id: SubscriptionId) -> SubscriptionResult<Subscription> {
        let mut subscription = self.load(ctx, id).await?;
        let (from, version) = (subscription.status(), subscription.version());
        subscription.cancel(self.clock.now())?;
        self.commit(Operation::Cancel, from, version, subscription).await
    }

    /// `Active | GracePeriod | Expired -> Active`, extended by one
    /// `billing_cycle` and re-priced from the current plan record
    pub async fn renew(
        &self,
        ctx: &TenantContext,
        id: SubscriptionId,
        billing_cycle: BillingCycle,
    ) -> SubscriptionResult<Subscription> {
        let mut subscription = self.load(ctx, id).await?;
        let (from, version) = (subscription.status(), subscription.version());
        if !from.permits(Operation::Renew) {
            return Err(SubscriptionError::InvalidSubscriptionState {
                operation: Operation::Renew,
                status: from,
            });
        }
        let plan = self.plans.get(subscription.plan_id()).await?;
        subscription.renew(billing_cycle, &plan, self.clock.now())?;
        self.commit(Operation::Renew, from, version, subscription).await
    }

    /// Replace operator notes; no status change
    pub async fn annotate(
        &self,
        ctx: &TenantContext,
        id: SubscriptionId,
        notes: Option<String>,
    ) -> SubscriptionResult<Subscription> {
        let mut subscription = self.load(ctx, id).await?;
        let (from, version) = (subscription.status(), subscription.version());
        subscription.annotate(notes, self.clock.now());
        self.commit(Operation::Annotate, from, version, subscription).await
    }

    /// Get subscription by id
    pub async fn get(&self, ctx: &TenantContext, id: SubscriptionId) -> SubscriptionResult<Subscription> {
        self.load(ctx, id).await
    }

    /// The tenant's current subscription
    pub async fn current_for_tenant(
        &self,
        ctx: &TenantContext,
        tenant_id: TenantId,
    ) -> SubscriptionResult<Subscription> {
        IsolationFilter::ensure_in_scope(ctx, &tenant_id)?;
        self.subscriptions
            .find_current_by_tenant(tenant_id)
            .await?
            .ok_or_else(|| SubscriptionError::SubscriptionNotFound(format!("tenant {}", tenant_id)))
    }

    /// Every subscription the tenant ever held, oldest first
    pub async fn history(&self, ctx: &TenantContext, tenant_id: TenantId) -> SubscriptionResult<Vec<Subscription>> {
        IsolationFilter::ensure_in_scope(ctx, &tenant_id)?;
        Ok(self.subscriptions.list_for_tenant(tenant_id).await?)
    }

    /// `Active` subscriptions visible under `ctx` with at most `days` left,
    /// soonest first
    pub async fn expiring_within(&self, ctx: &TenantContext, days: u32) -> SubscriptionResult<Vec<Subscription>> {
        let now = self.clock.now();
        let all = self.subscriptions.list_all().await?;
        let mut expiring: Vec<Subscription> = IsolationFilter::apply(ctx, &all)?
            .into_iter()
            .filter(|s| s.status() == SubscriptionStatus::Active)
            .filter(|s| entitlements::days_remaining(s, now) <= days)
            .cloned()
            .collect();
        expiring.sort_by_key(|s| s.expiry_date());
        Ok(expiring)
    }

    /// `expiring_within` over the configured expiring-soon window
    pub async fn expiring_soon(&self, ctx: &TenantContext) -> SubscriptionResult<Vec<Subscription>> {
        self.expiring_within(ctx, self.config.expiring_soon_days).await
    }

    /// Every subscription of every tenant; superadmin only
    pub(crate) async fn list_all_for(
        &self,
        ctx: &TenantContext,
        access: CrossTenantAccess,
    ) -> SubscriptionResult<Vec<Subscription>> {
        IsolationFilter::authorize_cross_tenant(ctx, access)?;
        Ok(self.subscriptions.list_all().await?)
    }

    /// Apply the time-driven transition to `subscription` as loaded.
    ///
    /// `Ok(None)` when nothing is due. Loses with `ConcurrentModification`
    /// to any write committed since the load.
    pub(crate) async fn sweep_one(
        &self,
        mut subscription: Subscription,
        now: DateTime<Utc>,
    ) -> SubscriptionResult<Option<(SubscriptionStatus, SubscriptionStatus)>> {
        let version = subscription.version();
        let Some((from, to)) = subscription.sweep(now, self.config.grace_period_days) else {
            return Ok(None);
        };
        self.commit(Operation::Sweep, from, version, subscription).await?;
        Ok(Some((from, to)))
    }

    async fn load(&self, ctx: &TenantContext, id: SubscriptionId) -> SubscriptionResult<Subscription> {
        let subscription = self.subscriptions.get(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => SubscriptionError::SubscriptionNotFound(id.to_string()),
            other => other.into(),
        })?;
        if !IsolationFilter::belongs_to_current_scope(ctx, &subscription)? {
            warn!(subscription_id = %id, scope = ?ctx.scope(), "subscription outside tenant scope");
            return Err(SubscriptionError::SubscriptionNotFound(id.to_string()));
        }
        Ok(subscription)
    }

    async fn commit(
        &self,
        operation: Operation,
        from: SubscriptionStatus,
        expected_version: u64,
        subscription: Subscription,
    ) -> SubscriptionResult<Subscription> {
        let id = subscription.id();
        if let Err(e) = self.subscriptions.save(&subscription, expected_version).await {
            return Err(match e {
                RepositoryError::VersionConflict { found, .. } => {
                    warn!(
                        subscription_id = %id,
                        operation = %operation,
                        expected = expected_version,
                        found = found,
                        "lifecycle write lost a race"
                    );
                    SubscriptionError::ConcurrentModification(id)
                }
                RepositoryError::NotFound(_) => SubscriptionError::SubscriptionNotFound(id.to_string()),
                other => other.into(),
            });
        }

        info!(
            subscription_id = %id,
            tenant_id = %subscription.tenant_id(),
            operation = %operation,
            from = %from,
            to = %subscription.status(),
            expiry = %subscription.expiry_date(),
            version = subscription.version(),
            "subscription transition committed"
        );
        self.events
            .publish(SubscriptionEvent::committed(operation, Some(from), &subscription));
        Ok(subscription)
    }
}
