//! Tenant-scoped in-memory store
//!
//! Every accessor takes the request's `TenantContext` and runs the isolation
//! filter before returning or mutating anything. The only unfiltered paths
//! are the `*_ignoring_tenant` accessors, each of which demands a named
//! `CrossTenantAccess` and a superadmin context.

use crate::context::{TenantContext, TenantScope};
use crate::isolation::{CrossTenantAccess, IsolationError, IsolationFilter, TenantOwned};
use campus_common::{RepositoryError, TenantId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// Keyed, tenant-owned record
pub trait Record: TenantOwned + Clone + Send + Sync {
    /// Primary key type
    type Key: Eq + Hash + Clone + Display + Send + Sync;

    /// Primary key
    fn key(&self) -> Self::Key;
}

/// In-memory store that cannot be read or written without the filter.
///
/// Keys are unique per tenant, so one tenant's keys never collide with, or
/// reveal, another tenant's rows.
pub struct TenantScopedStore<T: Record> {
    rows: Arc<RwLock<HashMap<(TenantId, T::Key), T>>>,
}

impl<T: Record> TenantScopedStore<T> {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a new record owned by the caller's tenant
    pub fn insert(&self, ctx: &TenantContext, record: T) -> Result<(), IsolationError> {
        IsolationFilter::check_write(ctx, &record)?;

        let mut rows = self.rows.write();
        let slot = (record.tenant_id(), record.key());
        if rows.contains_key(&slot) {
            return Err(RepositoryError::Conflict(slot.1.to_string()).into());
        }
        rows.insert(slot, record);
        Ok(())
    }

    /// Get a record; records of other tenants are indistinguishable from
    /// missing ones
    pub fn get(&self, ctx: &TenantContext, key: &T::Key) -> Result<Option<T>, IsolationError> {
        let rows = self.rows.read();
        Ok(lookup(ctx, &*rows, key)?.map(|(_, row)| row.clone()))
    }

    /// List every record in scope
    pub fn list(&self, ctx: &TenantContext) -> Result<Vec<T>, IsolationError> {
        self.list_where(ctx, |_| true)
    }

    /// List records in scope that also match `predicate`.
    ///
    /// The isolation filter runs first; `predicate` only ever sees rows the
    /// caller may observe.
    pub fn list_where<P>(&self, ctx: &TenantContext, predicate: P) -> Result<Vec<T>, IsolationError>
    where
        P: Fn(&T) -> bool,
    {
        let rows = self.rows.read();
        let visible = IsolationFilter::apply(ctx, rows.values())?;
        Ok(visible.into_iter().filter(|row| predicate(*row)).cloned().collect())
    }

    /// Count records in scope (e.g. live student count for cap checks)
    pub fn count(&self, ctx: &TenantContext) -> Result<usize, IsolationError> {
        let rows = self.rows.read();
        Ok(IsolationFilter::apply(ctx, rows.values())?.len())
    }

    /// Replace an existing record. Ownership can never move between tenants.
    pub fn update(&self, ctx: &TenantContext, record: T) -> Result<(), IsolationError> {
        IsolationFilter::check_write(ctx, &record)?;

        let mut rows = self.rows.write();
        let slot = (record.tenant_id(), record.key());
        if !rows.contains_key(&slot) {
            // only a superadmin can see the key under a different owner
            if let Some((owner, _)) = lookup(ctx, &*rows, &slot.1)? {
                return Err(IsolationError::CrossTenantWrite {
                    owner,
                    scope: record.tenant_id(),
                });
            }
            return Err(RepositoryError::NotFound(slot.1.to_string()).into());
        }

        rows.insert(slot, record);
        Ok(())
    }

    /// Delete a record in scope
    pub fn delete(&self, ctx: &TenantContext, key: &T::Key) -> Result<T, IsolationError> {
        let mut rows = self.rows.write();
        let owner = lookup(ctx, &*rows, key)?
            .map(|(owner, _)| owner)
            .ok_or_else(|| RepositoryError::NotFound(key.to_string()))?;
        rows.remove(&(owner, key.clone()))
            .ok_or_else(|| RepositoryError::NotFound(key.to_string()).into())
    }

    /// Unfiltered lookup by key for one of the enumerated exemptions
    pub fn get_ignoring_tenant(
        &self,
        ctx: &TenantContext,
        key: &T::Key,
        access: CrossTenantAccess,
    ) -> Result<Option<T>, IsolationError> {
        IsolationFilter::authorize_cross_tenant(ctx, access)?;
        let rows = self.rows.read();
        Ok(lookup(ctx, &*rows, key)?.map(|(_, row)| row.clone()))
    }

    /// Unfiltered listing for one of the enumerated exemptions
    pub fn list_ignoring_tenant(
        &self,
        ctx: &TenantContext,
        access: CrossTenantAccess,
    ) -> Result<Vec<T>, IsolationError> {
        IsolationFilter::authorize_cross_tenant(ctx, access)?;
        Ok(self.rows.read().values().cloned().collect())
    }
}

/// The one row holding `key` visible under `ctx`, with its owner.
///
/// A tenant sees at most its own row. A superadmin sees every tenant's, and
/// a key held by several tenants is reported as a conflict.
fn lookup<'a, T: Record>(
    ctx: &TenantContext,
    rows: &'a HashMap<(TenantId, T::Key), T>,
    key: &T::Key,
) -> Result<Option<(TenantId, &'a T)>, IsolationError> {
    match ctx.scope() {
        TenantScope::Unresolved => Err(IsolationError::TenantContextMissing),
        TenantScope::Tenant(tenant_id) => Ok(rows.get(&(tenant_id, key.clone())).map(|row| (tenant_id, row))),
        TenantScope::Superadmin => {
            let mut held = rows.iter().filter(|((_, k), _)| k == key);
            match (held.next(), held.next()) {
                (None, _) => Ok(None),
                (Some(((owner, _), row)), None) => Ok(Some((*owner, row))),
                (Some(_), Some(_)) => {
                    Err(RepositoryError::Conflict(format!("key {} is held by several tenants", key)).into())
                }
            }
        }
    }
}

impl<T: Record> Default for TenantScopedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Clone for TenantScopedStore<T> {
    fn clone(&self) -> Self {
        Self { rows: self.rows.clone() }
    }
}
