//! Campus Common - Shared primitives for the tenancy core
//!
//! This crate provides the small set of types every other campus crate
//! agrees on:
//! - Identifiers (`TenantId`, `SubscriptionId`, `PlanId`)
//! - The injected `Clock` used by every time-dependent decision
//! - Repository error types shared by the persistence seams

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod ids;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{RepoResult, RepositoryError};
pub use ids::{PlanId, SubscriptionId, TenantId};
