//! Access Gate
//!
//! One decision per tenant request, taken before any domain work starts:
//! allow iff the tenant's current subscription grants access and the target
//! data is inside the caller's isolation scope. A deny carries the reason so
//! the caller can tell "complete payment" apart from "contact support".

use crate::entitlements::{self, Entitlements};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::model::{Subscription, SubscriptionStatus};
use crate::plan::Resource;
use crate::repository::SubscriptionRepository;
use campus_common::{Clock, TenantId};
use campus_tenant::{context, IsolationFilter, TenantContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why access was refused
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyReason {
    /// Tenant never held a subscription
    NoSubscription,
    /// Suspended by an operator, with the recorded reason
    Suspended(String),
    Expired,
    Cancelled,
    PendingPayment,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSubscription => write!(f, "no subscription"),
            Self::Suspended(reason) => write!(f, "subscription suspended: {}", reason),
            Self::Expired => write!(f, "subscription expired"),
            Self::Cancelled => write!(f, "subscription cancelled"),
            Self::PendingPayment => write!(f, "payment pending"),
        }
    }
}

/// Outcome of `check_access`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    /// Set iff `allowed` is false
    pub reason: Option<DenyReason>,
    pub days_remaining: u32,
    pub is_in_grace_period: bool,
}

impl AccessDecision {
    /// Decide for the tenant's current subscription at `now`
    pub fn evaluate(subscription: Option<&Subscription>, now: DateTime<Utc>) -> Self {
        let Some(subscription) = subscription else {
            return Self::deny(DenyReason::NoSubscription, 0);
        };
        let days_remaining = entitlements::days_remaining(subscription, now);
        let reason = match subscription.status() {
            SubscriptionStatus::Active | SubscriptionStatus::GracePeriod => None,
            SubscriptionStatus::Suspended => Some(DenyReason::Suspended(
                subscription.suspension_reason().unwrap_or_default().to_string(),
            )),
            SubscriptionStatus::Expired => Some(DenyReason::Expired),
            SubscriptionStatus::Cancelled => Some(DenyReason::Cancelled),
            SubscriptionStatus::PendingPayment => Some(DenyReason::PendingPayment),
        };
        match reason {
            Some(reason) => Self::deny(reason, days_remaining),
            None => Self {
                allowed: true,
                reason: None,
                days_remaining,
                is_in_grace_period: entitlements::is_in_grace_period(subscription),
            },
        }
    }

    fn deny(reason: DenyReason, days_remaining: u32) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            days_remaining,
            is_in_grace_period: false,
        }
    }
}

/// What an authorized request may do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGrant {
    /// Platform operator; no subscription applies
    Superadmin,
    /// Tenant request with its resolved entitlements
    Tenant {
        tenant_id: TenantId,
        entitlements: Entitlements,
    },
}

impl AccessGrant {
    pub fn has_feature(&self, key: &str) -> bool {
        match self {
            Self::Superadmin => true,
            Self::Tenant { entitlements, .. } => entitlements.has_feature(key),
        }
    }
}

/// Access gate
#[derive(Clone)]
pub struct AccessGate {
    subscriptions: Arc<dyn SubscriptionRepository>,
    clock: Arc<dyn Clock>,
}

impl AccessGate {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { subscriptions, clock }
    }

    /// Access decision for `tenant_id`; called once per tenant request
    pub async fn check_access(&self, tenant_id: TenantId) -> SubscriptionResult<AccessDecision> {
        let current = self.subscriptions.find_current_by_tenant(tenant_id).await?;
        let decision = AccessDecision::evaluate(current.as_ref(), self.clock.now());
        match &decision.reason {
            None => debug!(
                tenant_id = %tenant_id,
                days_remaining = decision.days_remaining,
                grace = decision.is_in_grace_period,
                "access allowed"
            ),
            Some(reason) => warn!(tenant_id = %tenant_id, reason = %reason, "access denied"),
        }
        Ok(decision)
    }

    /// Feature enabled for the tenant right now; `false` without a subscription
    pub async fn has_feature(&self, tenant_id: TenantId, key: &str) -> SubscriptionResult<bool> {
        Ok(self
            .subscriptions
            .find_current_by_tenant(tenant_id)
            .await?
            .map_or(false, |s| entitlements::has_feature(&s, key)))
    }

    /// `usage` within the tenant's cap; `false` without a subscription
    pub async fn within_cap(&self, tenant_id: TenantId, resource: Resource, usage: u64) -> SubscriptionResult<bool> {
        Ok(self
            .subscriptions
            .find_current_by_tenant(tenant_id)
            .await?
            .map_or(false, |s| entitlements::within_cap(&s, resource, usage)))
    }

    /// Fail-fast gate for a request under `ctx` touching `target_tenant`'s data.
    ///
    /// Order: context resolved, target in scope, subscription grants access.
    /// Superadmin skips the subscription check.
    pub async fn authorize(&self, ctx: &TenantContext, target_tenant: TenantId) -> SubscriptionResult<AccessGrant> {
        ctx.ensure_resolved()?;
        if ctx.is_superadmin() {
            return Ok(AccessGrant::Superadmin);
        }
        IsolationFilter::ensure_in_scope(ctx, &target_tenant).map_err(|e| {
            warn!(target = %target_tenant, scope = ?ctx.scope(), "request outside tenant scope");
            SubscriptionError::from(e)
        })?;

        let current = self.subscriptions.find_current_by_tenant(target_tenant).await?;
        let now = self.clock.now();
        let decision = AccessDecision::evaluate(current.as_ref(), now);
        match (decision.reason, current) {
            (None, Some(subscription)) => {
                debug!(tenant_id = %target_tenant, "request authorized");
                Ok(AccessGrant::Tenant {
                    tenant_id: target_tenant,
                    entitlements: Entitlements::resolve(&subscription, now),
                })
            }
            (Some(reason), _) => {
                warn!(tenant_id = %target_tenant, reason = %reason, "request denied");
                Err(SubscriptionError::AccessDenied(reason))
            }
            (None, None) => Err(SubscriptionError::AccessDenied(DenyReason::NoSubscription)),
        }
    }

    /// `authorize` under the task-local context
    pub async fn authorize_current(&self, target_tenant: TenantId) -> SubscriptionResult<AccessGrant> {
        let ctx = context::current()?;
        self.authorize(&ctx, target_tenant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{at, date, subscription};
    use crate::repository::InMemorySubscriptionRepository;
    use campus_common::ManualClock;
    use campus_tenant::{IsolationError, TenantOwned};

    #[test]
    fn test_evaluate_reasons() {
        let now = at(date(2025, 3, 1));
        assert_eq!(
            AccessDecision::evaluate(None, now).reason,
            Some(DenyReason::NoSubscription)
        );

        let cases = [
            (SubscriptionStatus::Suspended, Some(DenyReason::Suspended("test".into()))),
            (SubscriptionStatus::Expired, Some(DenyReason::Expired)),
            (SubscriptionStatus::Cancelled, Some(DenyReason::Cancelled)),
            (SubscriptionStatus::PendingPayment, Some(DenyReason::PendingPayment)),
            (SubscriptionStatus::Active, None),
            (SubscriptionStatus::GracePeriod, None),
        ];
        for (status, expected) in cases {
            let sub = subscription(status, date(2025, 3, 11));
            let decision = AccessDecision::evaluate(Some(&sub), now);
            assert_eq!(decision.reason, expected, "{}", status);
            assert_eq!(decision.allowed, expected.is_none());
            assert_eq!(decision.days_remaining, 10);
        }
    }

    #[test]
    fn test_suspended_denies_regardless_of_expiry() {
        let sub = subscription(SubscriptionStatus::Suspended, date(2026, 1, 1));
        let decision = AccessDecision::evaluate(Some(&sub), at(date(2025, 3, 1)));
        assert!(!decision.allowed);
        assert!(decision.days_remaining > 0);
    }

    async fn gate_with(subs: &[Subscription]) -> AccessGate {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        for sub in subs {
            repo.insert(sub).await.unwrap();
        }
        AccessGate::new(repo, Arc::new(ManualClock::at_date(date(2025, 3, 1))))
    }

    #[tokio::test]
    async fn test_has_feature_and_caps() {
        let active = subscription(SubscriptionStatus::Active, date(2025, 3, 31));
        let suspended = subscription(SubscriptionStatus::Suspended, date(2025, 3, 31));
        let gate = gate_with(&[active.clone(), suspended.clone()]).await;

        assert!(gate.has_feature(active.tenant_id(), "gradebook").await.unwrap());
        assert!(!gate.has_feature(suspended.tenant_id(), "gradebook").await.unwrap());
        assert!(!gate.has_feature(TenantId::new(), "gradebook").await.unwrap());

        assert!(gate.within_cap(active.tenant_id(), Resource::Students, 500).await.unwrap());
        assert!(!gate.within_cap(active.tenant_id(), Resource::Students, 501).await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize() {
        let active = subscription(SubscriptionStatus::Active, date(2025, 3, 31));
        let pending = subscription(SubscriptionStatus::PendingPayment, date(2025, 3, 31));
        let gate = gate_with(&[active.clone(), pending.clone()]).await;
        let a = active.tenant_id();

        let grant = gate.authorize(&TenantContext::for_tenant(a), a).await.unwrap();
        assert!(grant.has_feature("gradebook"));
        assert!(matches!(grant, AccessGrant::Tenant { tenant_id, .. } if tenant_id == a));

        assert_eq!(
            gate.authorize(&TenantContext::for_tenant(pending.tenant_id()), pending.tenant_id()).await,
            Err(SubscriptionError::AccessDenied(DenyReason::PendingPayment))
        );
        assert_eq!(
            gate.authorize(&TenantContext::for_tenant(pending.tenant_id()), a).await,
            Err(SubscriptionError::Isolation(IsolationError::OutOfScope {
                owner: a,
                scope: pending.tenant_id(),
            }))
        );
        assert_eq!(
            gate.authorize(&TenantContext::unresolved(), a).await,
            Err(SubscriptionError::TenantContextMissing)
        );
        assert_eq!(
            gate.authorize(&TenantContext::superadmin(), TenantId::new()).await,
            Ok(AccessGrant::Superadmin)
        );
        let stranger = TenantId::new();
        assert_eq!(
            gate.authorize(&TenantContext::for_tenant(stranger), stranger).await,
            Err(SubscriptionError::AccessDenied(DenyReason::NoSubscription))
        );
    }

    #[tokio::test]
    async fn test_authorize_current_uses_task_context() {
        let active = subscription(SubscriptionStatus::Active, date(2025, 3, 31));
        let gate = gate_with(&[active.clone()]).await;
        let a = active.tenant_id();

        assert_eq!(gate.authorize_current(a).await, Err(SubscriptionError::TenantContextMissing));

        let grant = context::scope(TenantContext::for_tenant(a), gate.authorize_current(a))
            .await
            .unwrap();
        assert!(matches!(grant, AccessGrant::Tenant { .. }));
    }
}
