//! Campus Tenant Isolation
//!
//! Guarantees that every tenant-owned record is observed only by requests
//! scoped to its own tenant.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     TENANT DATA ISOLATION                           │
//! │                                                                     │
//! │   authenticated identity ──► TenantContext (one per request)        │
//! │                                   │                                 │
//! │  ┌────────────────────────────────▼──────────────────────────────┐  │
//! │  │                     ISOLATION FILTER                          │  │
//! │  │   scope == Superadmin  ||  entity.tenant_id == scope.tenant   │  │
//! │  └────────────────────────────────┬──────────────────────────────┘  │
//! │                                   │                                 │
//! │  ┌────────────────────────────────▼──────────────────────────────┐  │
//! │  │              TENANT-SCOPED STORE<T: TenantOwned>              │  │
//! │  │   list | get | insert | update | delete  (filter always on)   │  │
//! │  │   ignoring_tenant(CrossTenantAccess)  (enumerated exemptions) │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod assessment;
pub mod context;
pub mod isolation;
pub mod store;

pub use assessment::{Assessment, AssessmentKind};
pub use context::{TenantContext, TenantScope};
pub use isolation::{CrossTenantAccess, IsolationError, IsolationFilter, TenantOwned};
pub use store::{Record, TenantScopedStore};
