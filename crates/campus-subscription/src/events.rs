//! Lifecycle events
//!
//! Every committed transition is published once, after the save succeeded.
//! Events are past tense: a receiver never sees a transition that lost
//! its version check.

use crate::model::{Operation, Subscription, SubscriptionStatus};
use campus_common::{SubscriptionId, TenantId};
use campus_tenant::TenantOwned;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Committed subscription transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub subscription_id: SubscriptionId,
    pub tenant_id: TenantId,
    pub operation: Operation,
    /// `None` for creation
    pub from: Option<SubscriptionStatus>,
    pub to: SubscriptionStatus,
    /// Version after the transition
    pub version: u64,
    pub at: DateTime<Utc>,
}

impl SubscriptionEvent {
    /// Event for `subscription` as committed
    pub fn committed(operation: Operation, from: Option<SubscriptionStatus>, subscription: &Subscription) -> Self {
        Self {
            subscription_id: subscription.id(),
            tenant_id: subscription.tenant_id(),
            operation,
            from,
            to: subscription.status(),
            version: subscription.version(),
            at: subscription.updated_at(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self.operation {
            Operation::Create => "subscription.created",
            Operation::Activate => "subscription.activated",
            Operation::Suspend => "subscription.suspended",
            Operation::Cancel => "subscription.cancelled",
            Operation::Renew => "subscription.renewed",
            Operation::Sweep => "subscription.swept",
            Operation::Annotate => "subscription.annotated",
        }
    }
}

/// Broadcast channel for lifecycle events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SubscriptionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish; having no receivers is not an error
    pub fn publish(&self, event: SubscriptionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
