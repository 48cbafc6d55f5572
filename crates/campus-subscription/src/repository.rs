//! Subscription persistence
//!
//! The engine needs exactly three things from storage: load by id or by
//! tenant, save with a version check, and enumerate everything for the
//! sweep. Subscriptions are never hard-deleted.

use crate::model::{Subscription, SubscriptionStatus};
use async_trait::async_trait;
use campus_common::{RepoResult, RepositoryError, SubscriptionId, TenantId};
use campus_tenant::TenantOwned;
use dashmap::DashMap;

/// Subscription repository
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a new subscription.
    ///
    /// Fails with `Conflict` if the tenant already holds a non-cancelled
    /// subscription. The check and the insert are atomic.
    async fn insert(&self, subscription: &Subscription) -> RepoResult<()>;

    /// Get subscription by id
    async fn get(&self, id: SubscriptionId) -> RepoResult<Subscription>;

    /// The tenant's current subscription: the non-cancelled one if any,
    /// otherwise the most recently created. `None` if the tenant never had one.
    async fn find_current_by_tenant(&self, tenant_id: TenantId) -> RepoResult<Option<Subscription>>;

    /// Every subscription the tenant ever held, oldest first
    async fn list_for_tenant(&self, tenant_id: TenantId) -> RepoResult<Vec<Subscription>>;

    /// Every subscription of every tenant
    async fn list_all(&self) -> RepoResult<Vec<Subscription>>;

    /// Replace the stored subscription if its version is still
    /// `expected_version`; `VersionConflict` otherwise
    async fn save(&self, subscription: &Subscription, expected_version: u64) -> RepoResult<()>;
}

/// In-memory subscription repository (for testing and development)
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: DashMap<SubscriptionId, Subscription>,
    by_tenant: DashMap<TenantId, Vec<SubscriptionId>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tenant_rows(&self, tenant_id: TenantId) -> Vec<Subscription> {
        let ids = self
            .by_tenant
            .get(&tenant_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        let mut rows: Vec<Subscription> = ids
            .iter()
            .filter_map(|id| self.rows.get(id).map(|row| row.clone()))
            .collect();
        rows.sort_by_key(|s| s.created_at());
        rows
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> RepoResult<()> {
        let tenant_id = subscription.tenant_id();
        // shard lock on the tenant entry serialises concurrent creates
        let mut ids = self.by_tenant.entry(tenant_id).or_default();

        let has_open = ids.iter().any(|id| {
            self.rows
                .get(id)
                .map_or(false, |row| row.status() != SubscriptionStatus::Cancelled)
        });
        if has_open {
            return Err(RepositoryError::Conflict(format!(
                "tenant {} already has a non-cancelled subscription",
                tenant_id
            )));
        }
        if self.rows.contains_key(&subscription.id()) {
            return Err(RepositoryError::Conflict(format!(
                "subscription {} already exists",
                subscription.id()
            )));
        }

        self.rows.insert(subscription.id(), subscription.clone());
        ids.push(subscription.id());
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> RepoResult<Subscription> {
        self.rows
            .get(&id)
            .map(|row| row.clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_current_by_tenant(&self, tenant_id: TenantId) -> RepoResult<Option<Subscription>> {
        let mut rows = self.tenant_rows(tenant_id);
        if let Some(pos) = rows
            .iter()
            .position(|s| s.status() != SubscriptionStatus::Cancelled)
        {
            return Ok(Some(rows.swap_remove(pos)));
        }
        Ok(rows.pop())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> RepoResult<Vec<Subscription>> {
        Ok(self.tenant_rows(tenant_id))
    }

    async fn list_all(&self) -> RepoResult<Vec<Subscription>> {
        let mut rows: Vec<Subscription> = self.rows.iter().map(|row| row.value().clone()).collect();
        rows.sort_by_key(|s| s.created_at());
        Ok(rows)
    }

    async fn save(&self, subscription: &Subscription, expected_version: u64) -> RepoResult<()> {
        let mut row = self
            .rows
            .get_mut(&subscription.id())
            .ok_or_else(|| RepositoryError::NotFound(subscription.id().to_string()))?;

        if row.version() != expected_version {
            return Err(RepositoryError::VersionConflict {
                id: subscription.id().to_string(),
                expected: expected_version,
                found: row.version(),
            });
        }
        if row.tenant_id() != subscription.tenant_id() {
            return Err(RepositoryError::Conflict(format!(
                "subscription {} cannot change tenant",
                subscription.id()
            )));
        }

        *row = subscription.clone();
        Ok(())
    }
}
