//! Subscription aggregate
//!
//! # Invariants
//! - `expiry_date >= start_date`
//! - `amount >= 0`
//! - `enabled_features` is a set
//! - `suspension_reason` is set only while `Suspended`
//! - `Cancelled` is terminal
//!
//! Fields are private. A subscription is built once by [`Subscription::create`]
//! and afterwards changes only through the transition methods, which the
//! lifecycle engine and the expiry sweep commit under a version check.
//! Deserialized subscriptions are re-checked against the invariants.

use crate::error::SubscriptionError;
use crate::plan::{BillingCycle, PlanCaps, PlanType, Resource, SubscriptionPlan};
use campus_common::{PlanId, SubscriptionId, TenantId};
use campus_tenant::TenantOwned;
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    PendingPayment,
    Active,
    Suspended,
    Cancelled,
    Expired,
    GracePeriod,
}

impl SubscriptionStatus {
    /// Every status
    pub const ALL: [SubscriptionStatus; 6] = [
        Self::PendingPayment,
        Self::Active,
        Self::Suspended,
        Self::Cancelled,
        Self::Expired,
        Self::GracePeriod,
    ];

    /// Whether a subscription in this status grants access
    pub const fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::GracePeriod)
    }

    /// No transition leaves a terminal status
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether `operation` may start from this status
    pub const fn permits(&self, operation: Operation) -> bool {
        match operation {
            Operation::Create => false,
            Operation::Activate => matches!(self, Self::PendingPayment | Self::Suspended),
            Operation::Suspend => matches!(self, Self::Active | Self::GracePeriod),
            Operation::Cancel => !self.is_terminal(),
            Operation::Renew => matches!(self, Self::Active | Self::GracePeriod | Self::Expired),
            Operation::Sweep => matches!(self, Self::Active | Self::GracePeriod),
            Operation::Annotate => true,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingPayment => write!(f, "pending_payment"),
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Expired => write!(f, "expired"),
            Self::GracePeriod => write!(f, "grace_period"),
        }
    }
}

/// Lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Activate,
    Suspend,
    Cancel,
    Renew,
    /// Time-driven expiry / grace transition
    Sweep,
    /// Operator note, no status change
    Annotate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Activate => write!(f, "activate"),
            Self::Suspend => write!(f, "suspend"),
            Self::Cancel => write!(f, "cancel"),
            Self::Renew => write!(f, "renew"),
            Self::Sweep => write!(f, "sweep"),
            Self::Annotate => write!(f, "annotate"),
        }
    }
}

/// Tenant subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SubscriptionRecord")]
pub struct Subscription {
    id: SubscriptionId,
    tenant_id: TenantId,
    plan_id: PlanId,
    plan_type: PlanType,
    billing_cycle: BillingCycle,
    start_date: NaiveDate,
    expiry_date: NaiveDate,
    status: SubscriptionStatus,
    amount: Decimal,
    currency: String,
    caps: PlanCaps,
    enabled_features: BTreeSet<String>,
    suspension_reason: Option<String>,
    admin_notes: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Create a subscription starting `now`, snapshotting the plan's caps
    /// and features. Starts `Active` when payment was already captured,
    /// `PendingPayment` otherwise.
    pub fn create(
        tenant_id: TenantId,
        plan: &SubscriptionPlan,
        billing_cycle: BillingCycle,
        amount: Decimal,
        currency: impl Into<String>,
        payment_captured: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, SubscriptionError> {
        let currency = currency.into();
        if amount.is_sign_negative() {
            return Err(SubscriptionError::Validation("amount cannot be negative".into()));
        }
        if currency.trim().is_empty() {
            return Err(SubscriptionError::Validation("currency cannot be empty".into()));
        }

        let start_date = now.date_naive();
        let expiry_date = billing_cycle
            .advance(start_date)
            .ok_or_else(|| SubscriptionError::Validation("expiry date out of range".into()))?;

        Ok(Self {
            id: SubscriptionId::new(),
            tenant_id,
            plan_id: plan.id,
            plan_type: plan.plan_type,
            billing_cycle,
            start_date,
            expiry_date,
            status: if payment_captured {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::PendingPayment
            },
            amount,
            currency,
            caps: plan.caps,
            enabled_features: plan.enabled_features.clone(),
            suspension_reason: None,
            admin_notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    pub fn plan_type(&self) -> PlanType {
        self.plan_type
    }

    pub fn billing_cycle(&self) -> BillingCycle {
        self.billing_cycle
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn expiry_date(&self) -> NaiveDate {
        self.expiry_date
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn caps(&self) -> PlanCaps {
        self.caps
    }

    /// Snapshotted cap for `resource`
    pub fn cap(&self, resource: Resource) -> u64 {
        self.caps.cap(resource)
    }

    pub fn enabled_features(&self) -> &BTreeSet<String> {
        &self.enabled_features
    }

    pub fn suspension_reason(&self) -> Option<&str> {
        self.suspension_reason.as_deref()
    }

    pub fn admin_notes(&self) -> Option<&str> {
        self.admin_notes.as_deref()
    }

    /// Optimistic concurrency version
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn require(&self, operation: Operation) -> Result<(), SubscriptionError> {
        if self.status.permits(operation) {
            Ok(())
        } else {
            Err(SubscriptionError::InvalidSubscriptionState {
                operation,
                status: self.status,
            })
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    /// `PendingPayment | Suspended -> Active`; dates unchanged
    pub(crate) fn activate(&mut self, now: DateTime<Utc>) -> Result<(), SubscriptionError> {
        self.require(Operation::Activate)?;
        self.status = SubscriptionStatus::Active;
        self.suspension_reason = None;
        self.touch(now);
        Ok(())
    }

    /// `Active | GracePeriod -> Suspended`
    pub(crate) fn suspend(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), SubscriptionError> {
        self.require(Operation::Suspend)?;
        if reason.trim().is_empty() {
            return Err(SubscriptionError::Validation("suspension reason cannot be empty".into()));
        }
        self.status = SubscriptionStatus::Suspended;
        self.suspension_reason = Some(reason.to_string());
        self.touch(now);
        Ok(())
    }

    /// Any non-terminal status `-> Cancelled`
    pub(crate) fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SubscriptionError> {
        self.require(Operation::Cancel)?;
        self.status = SubscriptionStatus::Cancelled;
        self.suspension_reason = None;
        self.touch(now);
        Ok(())
    }

    /// `Active | GracePeriod | Expired -> Active`.
    ///
    /// New expiry is `max(today, expiry_date) + cycle`: unexpired time is
    /// carried over, lapsed time is not back-filled. Price, caps and
    /// features are re-snapshotted from the current plan.
    pub(crate) fn renew(
        &mut self,
        billing_cycle: BillingCycle,
        plan: &SubscriptionPlan,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.require(Operation::Renew)?;
        if plan.id != self.plan_id {
            return Err(SubscriptionError::Validation(format!(
                "plan {} does not match subscription plan {}",
                plan.id, self.plan_id
            )));
        }

        let base = self.expiry_date.max(now.date_naive());
        let expiry_date = billing_cycle
            .advance(base)
            .ok_or_else(|| SubscriptionError::Validation("expiry date out of range".into()))?;

        self.expiry_date = expiry_date;
        self.billing_cycle = billing_cycle;
        self.status = SubscriptionStatus::Active;
        self.amount = plan.price_for(billing_cycle);
        self.currency = plan.currency.clone();
        self.plan_type = plan.plan_type;
        self.caps = plan.caps;
        self.enabled_features = plan.enabled_features.clone();
        self.touch(now);
        Ok(())
    }

    /// Replace operator notes
    pub(crate) fn annotate(&mut self, notes: Option<String>, now: DateTime<Utc>) {
        self.admin_notes = notes.filter(|n| !n.trim().is_empty());
        self.touch(now);
    }

    /// Status the expiry sweep should move this subscription to, if any.
    ///
    /// Pure in `(status, expiry_date, today, grace_period_days)`, which is
    /// what makes the sweep idempotent.
    pub fn sweep_target(&self, today: NaiveDate, grace_period_days: u32) -> Option<SubscriptionStatus> {
        if !self.status.permits(Operation::Sweep) || today <= self.expiry_date {
            return None;
        }
        // a grace window running past the calendar's end never closes
        let in_grace = self
            .expiry_date
            .checked_add_days(Days::new(u64::from(grace_period_days)))
            .map_or(true, |grace_end| today <= grace_end);
        let target = if in_grace {
            SubscriptionStatus::GracePeriod
        } else {
            SubscriptionStatus::Expired
        };
        (target != self.status).then_some(target)
    }

    /// Apply the sweep; returns the transition taken
    pub(crate) fn sweep(
        &mut self,
        now: DateTime<Utc>,
        grace_period_days: u32,
    ) -> Option<(SubscriptionStatus, SubscriptionStatus)> {
        let target = self.sweep_target(now.date_naive(), grace_period_days)?;
        let from = self.status;
        self.status = target;
        self.touch(now);
        Some((from, target))
    }
}

/// Wire form of [`Subscription`]; checked against the invariants on the way in
#[derive(Deserialize)]
struct SubscriptionRecord {
    id: SubscriptionId,
    tenant_id: TenantId,
    plan_id: PlanId,
    plan_type: PlanType,
    billing_cycle: BillingCycle,
    start_date: NaiveDate,
    expiry_date: NaiveDate,
    status: SubscriptionStatus,
    amount: Decimal,
    currency: String,
    caps: PlanCaps,
    enabled_features: BTreeSet<String>,
    suspension_reason: Option<String>,
    admin_notes: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRecord> for Subscription {
    type Error = SubscriptionError;

    fn try_from(r: SubscriptionRecord) -> Result<Self, Self::Error> {
        let id = r.id;
        let invalid = |msg: &str| Err(SubscriptionError::Validation(format!("subscription {}: {}", id, msg)));
        if r.expiry_date < r.start_date {
            return invalid("expiry date before start date");
        }
        if r.amount.is_sign_negative() {
            return invalid("amount cannot be negative");
        }
        if r.currency.trim().is_empty() {
            return invalid("currency cannot be empty");
        }
        let suspended = r.status == SubscriptionStatus::Suspended;
        let has_reason = r.suspension_reason.as_deref().map_or(false, |reason| !reason.trim().is_empty());
        if suspended != has_reason {
            return invalid("suspension reason must be set exactly while suspended");
        }
        if r.version == 0 {
            return invalid("version starts at 1");
        }

        Ok(Self {
            id: r.id,
            tenant_id: r.tenant_id,
            plan_id: r.plan_id,
            plan_type: r.plan_type,
            billing_cycle: r.billing_cycle,
            start_date: r.start_date,
            expiry_date: r.expiry_date,
            status: r.status,
            amount: r.amount,
            currency: r.currency,
            caps: r.caps,
            enabled_features: r.enabled_features,
            suspension_reason: r.suspension_reason,
            admin_notes: r.admin_notes,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl TenantOwned for Subscription {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::plan::PlanType;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn at(day: NaiveDate) -> DateTime<Utc> {
        day.and_hms_opt(9, 30, 0).unwrap().and_utc()
    }

    pub(crate) fn plan() -> SubscriptionPlan {
        SubscriptionPlan::new(PlanType::Standard, "Standard", dec!(100), "USD")
            .with_caps(500, 40, 50)
            .with_features(["gradebook", "attendance"])
            .with_cycle_discounts(dec!(5), dec!(15))
    }

    pub(crate) fn subscription(status: SubscriptionStatus, expiry: NaiveDate) -> Subscription {
        let mut sub = Subscription::create(
            TenantId::new(),
            &plan(),
            BillingCycle::Monthly,
            dec!(100),
            "USD",
            true,
            at(expiry - Duration::days(30)),
        )
        .unwrap();
        sub.expiry_date = expiry;
        sub.status = status;
        if status == SubscriptionStatus::Suspended {
            sub.suspension_reason = Some("test".into());
        }
        sub
    }

    #[test]
    fn test_create_snapshots_plan() {
        let mut plan = plan();
        let sub = Subscription::create(
            TenantId::new(),
            &plan,
            BillingCycle::Monthly,
            dec!(80),
            "USD",
            false,
            at(date(2025, 1, 31)),
        )
        .unwrap();

        assert_eq!(sub.status(), SubscriptionStatus::PendingPayment);
        assert_eq!(sub.start_date(), date(2025, 1, 31));
        assert_eq!(sub.expiry_date(), date(2025, 2, 28));
        assert_eq!(sub.amount(), dec!(80));
        assert_eq!(sub.cap(Resource::Students), 500);

        // editing the plan afterwards leaves the snapshot alone
        plan.caps.max_students = 10;
        plan.enabled_features.clear();
        assert_eq!(sub.cap(Resource::Students), 500);
        assert!(sub.enabled_features().contains("gradebook"));
    }

    #[test]
    fn test_create_validates_amount_and_currency() {
        let now = at(date(2025, 1, 1));
        assert!(matches!(
            Subscription::create(TenantId::new(), &plan(), BillingCycle::Monthly, dec!(-1), "USD", true, now),
            Err(SubscriptionError::Validation(_))
        ));
        assert!(matches!(
            Subscription::create(TenantId::new(), &plan(), BillingCycle::Monthly, dec!(1), " ", true, now),
            Err(SubscriptionError::Validation(_))
        ));
    }

    #[test]
    fn test_suspend_and_activate_keep_dates() {
        let expiry = date(2025, 3, 21);
        let mut sub = subscription(SubscriptionStatus::Active, expiry);
        let now = at(date(2025, 3, 1));

        sub.suspend("payment dispute", now).unwrap();
        assert_eq!(sub.status(), SubscriptionStatus::Suspended);
        assert_eq!(sub.suspension_reason(), Some("payment dispute"));

        sub.activate(now).unwrap();
        assert_eq!(sub.status(), SubscriptionStatus::Active);
        assert_eq!(sub.suspension_reason(), None);
        assert_eq!(sub.expiry_date(), expiry);
    }

    #[test]
    fn test_suspend_requires_reason() {
        let mut sub = subscription(SubscriptionStatus::Active, date(2025, 3, 21));
        assert!(matches!(
            sub.suspend("  ", at(date(2025, 3, 1))),
            Err(SubscriptionError::Validation(_))
        ));
        assert_eq!(sub.status(), SubscriptionStatus::Active);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let now = at(date(2025, 3, 1));
        let mut cancelled = subscription(SubscriptionStatus::Cancelled, date(2025, 3, 21));

        assert_eq!(
            cancelled.activate(now),
            Err(SubscriptionError::InvalidSubscriptionState {
                operation: Operation::Activate,
                status: SubscriptionStatus::Cancelled,
            })
        );
        assert!(cancelled.cancel(now).is_err());

        let mut pending = subscription(SubscriptionStatus::PendingPayment, date(2025, 3, 21));
        assert!(pending.suspend("x", now).is_err());
        assert!(pending.renew(BillingCycle::Monthly, &plan(), now).is_err());

        let mut active = subscription(SubscriptionStatus::Active, date(2025, 3, 21));
        assert!(active.activate(now).is_err());
    }

    #[test]
    fn test_renew_extends_from_existing_expiry() {
        let plan = plan();
        let today = date(2025, 3, 1);
        let mut sub = subscription(SubscriptionStatus::Active, today + Duration::days(10));
        sub.plan_id = plan.id;

        sub.renew(BillingCycle::Monthly, &plan, at(today)).unwrap();
        assert_eq!(sub.expiry_date(), date(2025, 4, 11));
    }

    #[test]
    fn test_renew_expired_starts_from_today() {
        let plan = plan();
        let mut sub = subscription(SubscriptionStatus::Expired, date(2025, 1, 31));
        sub.plan_id = plan.id;

        sub.renew(BillingCycle::Quarterly, &plan, at(date(2025, 3, 10))).unwrap();
        assert_eq!(sub.status(), SubscriptionStatus::Active);
        assert_eq!(sub.expiry_date(), date(2025, 6, 10));
        assert_eq!(sub.billing_cycle(), BillingCycle::Quarterly);
        assert_eq!(sub.amount(), dec!(285.00));
    }

    #[test]
    fn test_renew_reprices_from_current_plan() {
        let mut plan = plan();
        let mut sub = subscription(SubscriptionStatus::Active, date(2025, 3, 31));
        sub.plan_id = plan.id;

        plan.monthly_price = dec!(120);
        plan.caps.max_students = 800;
        plan.enabled_features.insert("report_cards".into());

        sub.renew(BillingCycle::Monthly, &plan, at(date(2025, 3, 20))).unwrap();
        assert_eq!(sub.amount(), dec!(120));
        assert_eq!(sub.cap(Resource::Students), 800);
        assert!(sub.enabled_features().contains("report_cards"));
    }

    #[test]
    fn test_renew_rejects_foreign_plan() {
        let mut sub = subscription(SubscriptionStatus::Active, date(2025, 3, 31));
        assert!(matches!(
            sub.renew(BillingCycle::Monthly, &plan(), at(date(2025, 3, 20))),
            Err(SubscriptionError::Validation(_))
        ));
    }

    #[test]
    fn test_sweep_grace_then_expired() {
        let expiry = date(2025, 1, 31);
        let mut sub = subscription(SubscriptionStatus::Active, expiry);

        assert_eq!(sub.sweep(at(date(2025, 1, 31)), 7), None);
        assert_eq!(
            sub.sweep(at(date(2025, 2, 5)), 7),
            Some((SubscriptionStatus::Active, SubscriptionStatus::GracePeriod))
        );
        assert_eq!(sub.sweep(at(date(2025, 2, 7)), 7), None);
        assert_eq!(
            sub.sweep(at(date(2025, 2, 10)), 7),
            Some((SubscriptionStatus::GracePeriod, SubscriptionStatus::Expired))
        );
    }

    #[test]
    fn test_sweep_grace_past_calendar_end() {
        let sub = subscription(SubscriptionStatus::Active, date(2025, 1, 31));
        assert_eq!(
            sub.sweep_target(NaiveDate::MAX, u32::MAX),
            Some(SubscriptionStatus::GracePeriod)
        );
        assert_eq!(
            sub.sweep_target(date(2025, 2, 10), u32::MAX),
            Some(SubscriptionStatus::GracePeriod)
        );
    }

    #[test]
    fn test_sweep_ignores_non_running_statuses() {
        let today = date(2025, 6, 1);
        for status in [
            SubscriptionStatus::PendingPayment,
            SubscriptionStatus::Suspended,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            let sub = subscription(status, date(2025, 1, 1));
            assert_eq!(sub.sweep_target(today, 7), None, "{}", status);
        }
    }

    #[test]
    fn test_deserialize_checks_invariants() {
        let sub = subscription(SubscriptionStatus::Suspended, date(2025, 3, 31));
        let json = serde_json::to_value(&sub).unwrap();
        let back: Subscription = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, sub);

        let tampered = |field: &str, value: serde_json::Value| {
            let mut json = json.clone();
            json[field] = value;
            serde_json::from_value::<Subscription>(json)
        };
        assert!(tampered("expiry_date", "2025-01-01".into()).is_err());
        assert!(tampered("amount", "-10".into()).is_err());
        assert!(tampered("currency", "".into()).is_err());
        assert!(tampered("suspension_reason", serde_json::Value::Null).is_err());
        assert!(tampered("status", "Active".into()).is_err());
        assert!(tampered("version", 0.into()).is_err());
    }

    #[test]
    fn test_version_bumps_on_every_change() {
        let mut sub = subscription(SubscriptionStatus::PendingPayment, date(2025, 3, 31));
        let v = sub.version();
        sub.activate(at(date(2025, 3, 1))).unwrap();
        sub.annotate(Some("called bursar".into()), at(date(2025, 3, 1)));
        assert_eq!(sub.version(), v + 2);
        assert_eq!(sub.admin_notes(), Some("called bursar"));
    }

    fn any_status() -> impl Strategy<Value = SubscriptionStatus> {
        prop::sample::select(SubscriptionStatus::ALL.to_vec())
    }

    fn any_cycle() -> impl Strategy<Value = BillingCycle> {
        prop::sample::select(vec![BillingCycle::Monthly, BillingCycle::Quarterly, BillingCycle::Yearly])
    }

    #[derive(Debug, Clone)]
    enum Step {
        Activate,
        Suspend,
        Cancel,
        Renew(BillingCycle),
        Sweep(i64),
    }

    fn any_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Activate),
            Just(Step::Suspend),
            Just(Step::Cancel),
            any_cycle().prop_map(Step::Renew),
            (0i64..60).prop_map(Step::Sweep),
        ]
    }

    proptest! {
        #[test]
        fn prop_cancelled_is_a_sink(steps in prop::collection::vec(any_step(), 0..20)) {
            let plan = plan();
            let mut sub = subscription(SubscriptionStatus::Cancelled, date(2025, 1, 31));
            sub.plan_id = plan.id;
            let now = at(date(2025, 1, 15));

            for step in steps {
                let _ = match step {
                    Step::Activate => sub.activate(now),
                    Step::Suspend => sub.suspend("reason", now),
                    Step::Cancel => sub.cancel(now),
                    Step::Renew(cycle) => sub.renew(cycle, &plan, now),
                    Step::Sweep(days) => {
                        sub.sweep(now + Duration::days(days), 7);
                        Ok(())
                    }
                };
                prop_assert_eq!(sub.status(), SubscriptionStatus::Cancelled);
            }
        }

        #[test]
        fn prop_grants_access_iff_active_or_grace(status in any_status()) {
            let expected = matches!(status, SubscriptionStatus::Active | SubscriptionStatus::GracePeriod);
            prop_assert_eq!(status.grants_access(), expected);
        }

        #[test]
        fn prop_renewal_never_decreases_expiry(
            status in prop::sample::select(vec![
                SubscriptionStatus::Active,
                SubscriptionStatus::GracePeriod,
                SubscriptionStatus::Expired,
            ]),
            cycle in any_cycle(),
            expiry_offset in -400i64..400,
        ) {
            let plan = plan();
            let today = date(2025, 5, 31);
            let mut sub = subscription(status, today + Duration::days(expiry_offset));
            sub.plan_id = plan.id;
            let before = sub.expiry_date();

            sub.renew(cycle, &plan, at(today)).unwrap();
            prop_assert!(sub.expiry_date() >= before);
            prop_assert!(sub.expiry_date() > today);
            prop_assert_eq!(Some(sub.expiry_date()), cycle.advance(before.max(today)));
        }

        #[test]
        fn prop_sweep_is_idempotent(
            status in any_status(),
            expiry_offset in -30i64..30,
            grace in 0u32..15,
        ) {
            let today = date(2025, 2, 10);
            let now = at(today);
            let mut once = subscription(status, today + Duration::days(expiry_offset));
            once.sweep(now, grace);

            let mut twice = once.clone();
            prop_assert_eq!(twice.sweep(now, grace), None);
            prop_assert_eq!(twice.status(), once.status());
            prop_assert_eq!(twice.version(), once.version());
        }
    }
}
