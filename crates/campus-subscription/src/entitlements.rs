//! Entitlement Resolver
//!
//! Pure functions of `(subscription, now)`. Nothing here writes status:
//! moving a subscription into `GracePeriod` or `Expired` belongs to the
//! expiry sweep, so a read-only access check never changes persisted state.

use crate::model::{Subscription, SubscriptionStatus};
use crate::plan::{PlanCaps, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `true` iff the status is `Active` or `GracePeriod`
pub fn can_access(subscription: &Subscription) -> bool {
    subscription.status().grants_access()
}

/// Whole days until expiry, never negative
pub fn days_remaining(subscription: &Subscription, now: DateTime<Utc>) -> u32 {
    let days = (subscription.expiry_date() - now.date_naive()).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// `status == Expired`; a subscription past expiry but still in grace is not expired
pub fn is_expired(subscription: &Subscription) -> bool {
    subscription.status() == SubscriptionStatus::Expired
}

pub fn is_in_grace_period(subscription: &Subscription) -> bool {
    subscription.status() == SubscriptionStatus::GracePeriod
}

/// Feature enabled and access currently granted
pub fn has_feature(subscription: &Subscription, key: &str) -> bool {
    can_access(subscription) && subscription.enabled_features().contains(key)
}

/// `usage <= cap`; the caller counts usage
pub fn within_cap(subscription: &Subscription, resource: Resource, usage: u64) -> bool {
    usage <= subscription.cap(resource)
}

/// Resolved entitlements of one subscription at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    pub can_access: bool,
    pub days_remaining: u32,
    pub is_in_grace_period: bool,
    /// Empty whenever access is denied
    pub features: BTreeSet<String>,
    pub caps: PlanCaps,
}

impl Entitlements {
    pub fn resolve(subscription: &Subscription, now: DateTime<Utc>) -> Self {
        let can_access = can_access(subscription);
        Self {
            can_access,
            days_remaining: days_remaining(subscription, now),
            is_in_grace_period: is_in_grace_period(subscription),
            features: if can_access {
                subscription.enabled_features().clone()
            } else {
                BTreeSet::new()
            },
            caps: subscription.caps(),
        }
    }

    pub fn has_feature(&self, key: &str) -> bool {
        self.features.contains(key)
    }

    pub fn within_cap(&self, resource: Resource, usage: u64) -> bool {
        usage <= self.caps.cap(resource)
    }
}
