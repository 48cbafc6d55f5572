//! Campus Subscriptions
//!
//! Tenant subscription lifecycle and the access-entitlement gate every
//! tenant request passes through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    SUBSCRIPTION & ENTITLEMENT CORE                      │
//! │                                                                         │
//! │  ┌──────────────┐   snapshot caps/features   ┌──────────────────────┐   │
//! │  │ Plan Catalog │ ─────────────────────────► │  Lifecycle Engine    │   │
//! │  └──────────────┘                            │ create│activate│     │   │
//! │                                              │ suspend│cancel│renew │   │
//! │  ┌──────────────┐  time-driven transitions   └──────────┬───────────┘   │
//! │  │ Expiry Sweep │ ──────────────────────────────────────┤               │
//! │  └──────────────┘                                       ▼               │
//! │                                          ┌──────────────────────────┐   │
//! │                                          │ Subscription Repository  │   │
//! │                                          │  (optimistic versioning) │   │
//! │                                          └──────────┬───────────────┘   │
//! │                                                     │                   │
//! │  request ─► TenantContext ─► ACCESS GATE ◄──────────┘                   │
//! │                  isolation filter + entitlement resolver                │
//! │                  allow │ deny(NoSubscription│Suspended│Expired│...)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```


pub mod catalog;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod model;
pub mod plan;
pub mod repository;
pub mod sweep;

pub use catalog::{default_catalog, InMemoryPlanRepository, PlanCatalog, PlanRepository};
pub use config::{ConfigError, SubscriptionConfig, MAX_GRACE_PERIOD_DAYS};
pub use entitlements::Entitlements;
pub use error::{SubscriptionError, SubscriptionResult};
pub use events::{EventBus, SubscriptionEvent};
pub use gate::{AccessDecision, AccessGate, AccessGrant, DenyReason};
pub use lifecycle::{CreateSubscription, SubscriptionLifecycle};
pub use model::{Operation, Subscription, SubscriptionStatus};
pub use plan::{BillingCycle, PlanCaps, PlanType, Resource, SubscriptionPlan};
pub use repository::{InMemorySubscriptionRepository, SubscriptionRepository};
pub use sweep::{ExpirySweep, SweepReport};
