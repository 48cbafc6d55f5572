//! Subscription error taxonomy

use crate::gate::DenyReason;
use crate::model::{Operation, SubscriptionStatus};
use campus_common::{PlanId, RepositoryError, SubscriptionId, TenantId};
use campus_tenant::IsolationError;
use thiserror::Error;

/// Result type for subscription operations
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Subscription errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubscriptionError {
    /// Tenant-scoped operation reached with no tenant resolved
    #[error("tenant context missing")]
    TenantContextMissing,

    /// No subscription record at all
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Transition not legal from the current status
    #[error("cannot {operation} a subscription in status {status}")]
    InvalidSubscriptionState {
        /// Attempted operation
        operation: Operation,
        /// Status at the time of the attempt
        status: SubscriptionStatus,
    },

    /// Gate refused the request
    #[error("access denied: {0}")]
    AccessDenied(DenyReason),

    /// Lifecycle mutation lost a race; reload and decide again
    #[error("subscription {0} was modified concurrently")]
    ConcurrentModification(SubscriptionId),

    /// Tenant already holds a non-cancelled subscription
    #[error("tenant {0} already has a subscription")]
    DuplicateSubscription(TenantId),

    /// Plan missing from the catalog
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// Plan exists but is not offered for purchase
    #[error("plan {0} is not available for purchase")]
    PlanUnavailable(PlanId),

    /// Invalid input
    #[error("validation error: {0}")]
    Validation(String),

    /// Isolation failure other than a missing context
    #[error("isolation error: {0}")]
    Isolation(IsolationError),

    /// Storage failure
    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl From<IsolationError> for SubscriptionError {
    fn from(err: IsolationError) -> Self {
        match err {
            IsolationError::TenantContextMissing => Self::TenantContextMissing,
            IsolationError::Repository(e) => Self::Repository(e),
            other => Self::Isolation(other),
        }
    }
}

impl From<RepositoryError> for SubscriptionError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}
