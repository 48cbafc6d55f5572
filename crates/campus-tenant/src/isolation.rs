//! Isolation Filter
//!
//! One predicate, applied identically to every tenant-owned type:
//!
//! ```text
//! belongs_to_current_scope(entity) :=
//!     scope == Superadmin || entity.tenant_id == scope.tenant_id
//! ```
//!
//! An `Unresolved` scope never evaluates to true or false; it is an error.

use crate::context::{TenantContext, TenantScope};
use campus_common::{RepositoryError, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A record owned by exactly one tenant
pub trait TenantOwned {
    /// Owning tenant
    fn tenant_id(&self) -> TenantId;
}

/// Deliberate, enumerated exceptions to the isolation filter.
///
/// Each variant names the single superadmin operation allowed to read
/// across tenants. Adding a variant is adding a hole in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossTenantAccess {
    /// Resolve which tenant owns a record id before any tenant is known
    /// (e.g. following a shared link)
    ResolveRecordTenant,
    /// Platform-wide audit export run by an operator
    PlatformAudit,
    /// Scheduled expiry sweep over every tenant's subscriptions
    ExpirySweep,
}

impl TenantOwned for TenantId {
    fn tenant_id(&self) -> TenantId {
        *self
    }
}

impl fmt::Display for CrossTenantAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveRecordTenant => write!(f, "resolve_record_tenant"),
            Self::PlatformAudit => write!(f, "platform_audit"),
            Self::ExpirySweep => write!(f, "expiry_sweep"),
        }
    }
}

/// Isolation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IsolationError {
    /// Tenant-scoped operation reached with no tenant resolved
    #[error("tenant context missing")]
    TenantContextMissing,

    /// Write targeting a record outside the caller's scope
    #[error("record owned by tenant {owner} is outside scope of tenant {scope}")]
    CrossTenantWrite {
        /// Tenant owning the record
        owner: TenantId,
        /// Tenant the request is scoped to
        scope: TenantId,
    },

    /// Operation targets data outside the caller's scope
    #[error("data of tenant {owner} is outside scope of tenant {scope}")]
    OutOfScope {
        /// Tenant owning the data
        owner: TenantId,
        /// Tenant the request is scoped to
        scope: TenantId,
    },

    /// Cross-tenant accessor invoked without superadmin scope
    #[error("cross-tenant access `{0}` requires superadmin scope")]
    CrossTenantDenied(CrossTenantAccess),

    /// Storage failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The isolation predicate
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolationFilter;

impl IsolationFilter {
    /// Whether `entity` is visible under `ctx`
    pub fn belongs_to_current_scope<T>(ctx: &TenantContext, entity: &T) -> Result<bool, IsolationError>
    where
        T: TenantOwned + ?Sized,
    {
        match ctx.scope() {
            TenantScope::Superadmin => Ok(true),
            TenantScope::Tenant(id) => Ok(entity.tenant_id() == id),
            TenantScope::Unresolved => Err(IsolationError::TenantContextMissing),
        }
    }

    /// Fail unless `entity` may be written under `ctx`
    pub fn check_write<T>(ctx: &TenantContext, entity: &T) -> Result<(), IsolationError>
    where
        T: TenantOwned + ?Sized,
    {
        match Self::ensure_in_scope(ctx, entity) {
            Err(IsolationError::OutOfScope { owner, scope }) => {
                Err(IsolationError::CrossTenantWrite { owner, scope })
            }
            other => other,
        }
    }

    /// Fail unless `entity` is visible under `ctx`
    pub fn ensure_in_scope<T>(ctx: &TenantContext, entity: &T) -> Result<(), IsolationError>
    where
        T: TenantOwned + ?Sized,
    {
        if Self::belongs_to_current_scope(ctx, entity)? {
            return Ok(());
        }
        match ctx.scope() {
            TenantScope::Tenant(scope) => Err(IsolationError::OutOfScope {
                owner: entity.tenant_id(),
                scope,
            }),
            TenantScope::Superadmin | TenantScope::Unresolved => {
                Err(IsolationError::TenantContextMissing)
            }
        }
    }

    /// Keep only the entities visible under `ctx`
    pub fn apply<'a, T, I>(ctx: &TenantContext, entities: I) -> Result<Vec<&'a T>, IsolationError>
    where
        T: TenantOwned + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        ctx.ensure_resolved()?;
        let mut visible = Vec::new();
        for entity in entities {
            if Self::belongs_to_current_scope(ctx, entity)? {
                visible.push(entity);
            }
        }
        Ok(visible)
    }

    /// Gate a cross-tenant accessor; only superadmin contexts pass
    pub fn authorize_cross_tenant(
        ctx: &TenantContext,
        access: CrossTenantAccess,
    ) -> Result<(), IsolationError> {
        if ctx.is_superadmin() {
            tracing::warn!(access = %access, "cross-tenant access granted");
            Ok(())
        } else {
            tracing::warn!(access = %access, scope = ?ctx.scope(), "cross-tenant access refused");
            Err(IsolationError::CrossTenantDenied(access))
        }
    }
}
