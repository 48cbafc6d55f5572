//! Subscription plans
//!
//! A plan is a template. Subscriptions snapshot a plan's caps, features and
//! price when they are created or renewed, so later edits to a plan never
//! change what an existing subscription grants.

use campus_common::PlanId;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlanType {
    Basic,
    Standard,
    Premium,
    Enterprise,
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Standard => write!(f, "standard"),
            Self::Premium => write!(f, "premium"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    /// Length in calendar months
    pub const fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
        }
    }

    /// Advance `from` by one cycle of calendar months.
    ///
    /// A day that does not exist in the target month clamps to that month's
    /// last day: Jan 31 + 1 month = Feb 28 (or 29), Feb 29 + 1 year = Feb 28.
    /// Returns `None` only past the end of the representable calendar.
    pub fn advance(&self, from: NaiveDate) -> Option<NaiveDate> {
        from.checked_add_months(Months::new(self.months()))
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Quarterly => write!(f, "quarterly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

/// Capped resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Students,
    Teachers,
    StorageGb,
}

/// Resource caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCaps {
    pub max_students: u32,
    pub max_teachers: u32,
    pub max_storage_gb: u32,
}

impl PlanCaps {
    /// Cap for `resource`
    pub const fn cap(&self, resource: Resource) -> u64 {
        match resource {
            Resource::Students => self.max_students as u64,
            Resource::Teachers => self.max_teachers as u64,
            Resource::StorageGb => self.max_storage_gb as u64,
        }
    }
}

/// Subscription plan offering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub plan_type: PlanType,
    pub name: String,
    pub description: String,
    pub monthly_price: Decimal,
    pub quarterly_price: Decimal,
    pub yearly_price: Decimal,
    pub currency: String,
    /// Advertised saving of the quarterly price against three monthly payments (%)
    pub quarterly_discount_percent: Decimal,
    /// Advertised saving of the yearly price against twelve monthly payments (%)
    pub yearly_discount_percent: Decimal,
    pub caps: PlanCaps,
    pub enabled_features: BTreeSet<String>,
    /// Visible for purchase
    pub is_active: bool,
    pub display_order: u32,
}

impl SubscriptionPlan {
    /// Create new plan with undiscounted longer cycles
    pub fn new(plan_type: PlanType, name: impl Into<String>, monthly_price: Decimal, currency: impl Into<String>) -> Self {
        Self {
            id: PlanId::new(),
            plan_type,
            name: name.into(),
            description: String::new(),
            monthly_price,
            quarterly_price: monthly_price * dec!(3),
            yearly_price: monthly_price * dec!(12),
            currency: currency.into(),
            quarterly_discount_percent: Decimal::ZERO,
            yearly_discount_percent: Decimal::ZERO,
            caps: PlanCaps { max_students: 0, max_teachers: 0, max_storage_gb: 0 },
            enabled_features: BTreeSet::new(),
            is_active: true,
            display_order: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_caps(mut self, max_students: u32, max_teachers: u32, max_storage_gb: u32) -> Self {
        self.caps = PlanCaps { max_students, max_teachers, max_storage_gb };
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Derive quarterly and yearly prices from the monthly price and the
    /// given discount percentages, rounded to cents
    pub fn with_cycle_discounts(mut self, quarterly_percent: Decimal, yearly_percent: Decimal) -> Self {
        let factor = |percent: Decimal| (dec!(100) - percent) / dec!(100);
        self.quarterly_discount_percent = quarterly_percent;
        self.yearly_discount_percent = yearly_percent;
        self.quarterly_price = (self.monthly_price * dec!(3) * factor(quarterly_percent)).round_dp(2);
        self.yearly_price = (self.monthly_price * dec!(12) * factor(yearly_percent)).round_dp(2);
        self
    }

    pub fn with_display_order(mut self, display_order: u32) -> Self {
        self.display_order = display_order;
        self
    }

    /// Price charged for one `cycle`
    pub fn price_for(&self, cycle: BillingCycle) -> Decimal {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Quarterly => self.quarterly_price,
            BillingCycle::Yearly => self.yearly_price,
        }
    }

    /// Advertised discount for `cycle` (%)
    pub fn discount_for(&self, cycle: BillingCycle) -> Decimal {
        match cycle {
            BillingCycle::Monthly => Decimal::ZERO,
            BillingCycle::Quarterly => self.quarterly_discount_percent,
            BillingCycle::Yearly => self.yearly_discount_percent,
        }
    }

    pub fn has_feature(&self, key: &str) -> bool {
        self.enabled_features.contains(key)
    }

    /// Check plan invariants: non-negative prices, a currency, discounts in 0..=100
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("plan name cannot be empty".into());
        }
        if self.currency.trim().is_empty() {
            return Err("plan currency cannot be empty".into());
        }
        for cycle in [BillingCycle::Monthly, BillingCycle::Quarterly, BillingCycle::Yearly] {
            if self.price_for(cycle).is_sign_negative() {
                return Err(format!("{} price cannot be negative", cycle));
            }
            let discount = self.discount_for(cycle);
            if discount < Decimal::ZERO || discount > dec!(100) {
                return Err(format!("{} discount must be between 0 and 100", cycle));
            }
        }
        Ok(())
    }
}
