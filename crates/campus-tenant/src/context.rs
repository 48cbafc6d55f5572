//! Request-scoped tenant context
//!
//! A `TenantContext` is built once per request from already-authenticated
//! claims and is immutable afterwards. It is either passed explicitly down
//! the call chain or installed as a task-local for the lifetime of one
//! request future via [`scope`]; there is no process-wide "current tenant".

use crate::isolation::IsolationError;
use campus_common::TenantId;
use serde::{Deserialize, Serialize};
use std::future::Future;

tokio::task_local! {
    static CURRENT: TenantContext;
}

/// Which rows a request may observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantScope {
    /// Scoped to exactly one tenant
    Tenant(TenantId),
    /// Platform operator, unscoped (cross-tenant)
    Superadmin,
    /// No tenant could be resolved for a non-superadmin caller
    Unresolved,
}

/// Per-request tenant context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    scope: TenantScope,
}

impl TenantContext {
    /// Context scoped to `tenant_id`
    pub const fn for_tenant(tenant_id: TenantId) -> Self {
        Self { scope: TenantScope::Tenant(tenant_id) }
    }

    /// Unscoped superadmin context
    pub const fn superadmin() -> Self {
        Self { scope: TenantScope::Superadmin }
    }

    /// Context for a caller whose tenant could not be resolved
    pub const fn unresolved() -> Self {
        Self { scope: TenantScope::Unresolved }
    }

    /// Build from authenticated claims.
    ///
    /// A tenant claim always scopes the request, even for a superadmin
    /// acting on behalf of one school. Only a superadmin without a tenant
    /// claim is unscoped; anyone else without a tenant claim is
    /// `Unresolved` and fails closed downstream.
    pub const fn from_claims(tenant_id: Option<TenantId>, is_superadmin: bool) -> Self {
        match (tenant_id, is_superadmin) {
            (Some(id), _) => Self::for_tenant(id),
            (None, true) => Self::superadmin(),
            (None, false) => Self::unresolved(),
        }
    }

    /// Get scope
    pub const fn scope(&self) -> TenantScope {
        self.scope
    }

    /// Tenant this request is scoped to, if any
    pub const fn tenant_id(&self) -> Option<TenantId> {
        match self.scope {
            TenantScope::Tenant(id) => Some(id),
            TenantScope::Superadmin | TenantScope::Unresolved => None,
        }
    }

    /// Whether this is an unscoped superadmin request
    pub const fn is_superadmin(&self) -> bool {
        matches!(self.scope, TenantScope::Superadmin)
    }

    /// Tenant id for operations that only make sense for one tenant.
    ///
    /// Fails with `TenantContextMissing` for unresolved and superadmin
    /// contexts alike.
    pub fn require_tenant(&self) -> Result<TenantId, IsolationError> {
        self.tenant_id().ok_or(IsolationError::TenantContextMissing)
    }

    /// Fail closed if no scope could be resolved
    pub fn ensure_resolved(&self) -> Result<(), IsolationError> {
        match self.scope {
            TenantScope::Unresolved => Err(IsolationError::TenantContextMissing),
            TenantScope::Tenant(_) | TenantScope::Superadmin => Ok(()),
        }
    }
}

/// Run `fut` with `ctx` installed as the request's task-local context.
///
/// The context is dropped when `fut` completes; tasks spawned from inside do
/// not inherit it.
pub async fn scope<F>(ctx: TenantContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// Context installed by the enclosing [`scope`] call
pub fn current() -> Result<TenantContext, IsolationError> {
    CURRENT
        .try_with(|ctx| *ctx)
        .map_err(|_| IsolationError::TenantContextMissing)
}
