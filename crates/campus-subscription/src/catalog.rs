//! Plan Catalog
//!
//! Lookup of subscription plans by id or tier. Hidden plans stay
//! resolvable so existing subscriptions can still renew against them.

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::plan::{PlanType, SubscriptionPlan};
use async_trait::async_trait;
use campus_common::{PlanId, RepoResult, RepositoryError};
use parking_lot::RwLock;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

/// Plan storage
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Get plan by id
    async fn get(&self, id: PlanId) -> RepoResult<SubscriptionPlan>;

    /// Insert or replace plan
    async fn save(&self, plan: &SubscriptionPlan) -> RepoResult<()>;

    /// List all plans, active or not
    async fn list(&self) -> RepoResult<Vec<SubscriptionPlan>>;
}

/// In-memory plan repository
#[derive(Default)]
pub struct InMemoryPlanRepository {
    plans: RwLock<HashMap<PlanId, SubscriptionPlan>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn get(&self, id: PlanId) -> RepoResult<SubscriptionPlan> {
        self.plans
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, plan: &SubscriptionPlan) -> RepoResult<()> {
        self.plans.write().insert(plan.id, plan.clone());
        Ok(())
    }

    async fn list(&self) -> RepoResult<Vec<SubscriptionPlan>> {
        Ok(self.plans.read().values().cloned().collect())
    }
}

/// Plan catalog
pub struct PlanCatalog {
    plans: Arc<dyn PlanRepository>,
}

impl PlanCatalog {
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Catalog over a fresh in-memory repository
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPlanRepository::new()))
    }

    /// Validate and store `plan`
    pub async fn upsert(&self, plan: SubscriptionPlan) -> SubscriptionResult<SubscriptionPlan> {
        plan.validate().map_err(SubscriptionError::Validation)?;
        self.plans.save(&plan).await?;
        tracing::info!(plan_id = %plan.id, plan_type = %plan.plan_type, active = plan.is_active, "plan saved");
        Ok(plan)
    }

    /// Get plan by id, hidden or not
    pub async fn get(&self, id: PlanId) -> SubscriptionResult<SubscriptionPlan> {
        self.plans.get(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => SubscriptionError::PlanNotFound(id.to_string()),
            other => other.into(),
        })
    }

    /// Active plan of the given tier
    pub async fn get_by_type(&self, plan_type: PlanType) -> SubscriptionResult<SubscriptionPlan> {
        self.list_active()
            .await?
            .into_iter()
            .find(|p| p.plan_type == plan_type)
            .ok_or_else(|| SubscriptionError::PlanNotFound(plan_type.to_string()))
    }

    /// Plans offered for purchase, by display order
    pub async fn list_active(&self) -> SubscriptionResult<Vec<SubscriptionPlan>> {
        let mut plans: Vec<_> = self
            .plans
            .list()
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        plans.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    /// Hide a plan from purchase; existing subscriptions are unaffected
    pub async fn deactivate(&self, id: PlanId) -> SubscriptionResult<SubscriptionPlan> {
        let mut plan = self.get(id).await?;
        plan.is_active = false;
        self.plans.save(&plan).await?;
        tracing::info!(plan_id = %id, "plan deactivated");
        Ok(plan)
    }
}

/// Standard school plan ladder
pub fn default_catalog() -> Vec<SubscriptionPlan> {
    vec![
        SubscriptionPlan::new(PlanType::Basic, "Basic", dec!(49), "USD")
            .with_description("Small schools getting started")
            .with_caps(200, 15, 10)
            .with_features(["attendance", "gradebook"])
            .with_cycle_discounts(dec!(5), dec!(15))
            .with_display_order(1),
        SubscriptionPlan::new(PlanType::Standard, "Standard", dec!(129), "USD")
            .with_description("Growing schools")
            .with_caps(1_000, 60, 100)
            .with_features(["attendance", "gradebook", "report_cards", "parent_portal"])
            .with_cycle_discounts(dec!(5), dec!(15))
            .with_display_order(2),
        SubscriptionPlan::new(PlanType::Premium, "Premium", dec!(299), "USD")
            .with_description("Multi-stream schools")
            .with_caps(5_000, 300, 500)
            .with_features([
                "attendance",
                "gradebook",
                "report_cards",
                "parent_portal",
                "timetabling",
                "analytics",
            ])
            .with_cycle_discounts(dec!(10), dec!(20))
            .with_display_order(3),
        SubscriptionPlan::new(PlanType::Enterprise, "Enterprise", dec!(799), "USD")
            .with_description("School groups and districts")
            .with_caps(50_000, 3_000, 5_000)
            .with_features([
                "attendance",
                "gradebook",
                "report_cards",
                "parent_portal",
                "timetabling",
                "analytics",
                "api_access",
                "sso",
            ])
            .with_cycle_discounts(dec!(10), dec!(25))
            .with_display_order(4),
    ]
}
