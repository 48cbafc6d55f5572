//! JSON snapshot of the subscription table
//!
//! Every record is re-validated on load; one bad record fails the whole load
//! rather than being swept in a state the lifecycle could never produce.

use campus_common::RepositoryError;
use campus_subscription::{Subscription, SubscriptionRepository, SubscriptionStatus};
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot rejected by repository: {0}")]
    Repository(#[from] RepositoryError),
}

/// Insert every subscription stored at `path`. A missing file is an empty
/// table. Returns the number loaded.
pub async fn load(path: &Path, repo: &dyn SubscriptionRepository) -> Result<usize, SnapshotError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "no snapshot, starting empty");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let mut subscriptions: Vec<Subscription> = serde_json::from_slice(&raw)?;
    // cancelled history first so the one open subscription per tenant inserts last
    subscriptions.sort_by_key(|s| (s.status() != SubscriptionStatus::Cancelled, s.created_at()));
    for subscription in &subscriptions {
        repo.insert(subscription).await?;
    }

    info!(path = %path.display(), subscriptions = subscriptions.len(), "snapshot loaded");
    Ok(subscriptions.len())
}

/// Write every subscription in `repo` to `path`, replacing it atomically
pub async fn save(path: &Path, repo: &dyn SubscriptionRepository) -> Result<usize, SnapshotError> {
    let subscriptions = repo.list_all().await?;
    let json = serde_json::to_vec_pretty(&subscriptions)?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;

    info!(path = %path.display(), subscriptions = subscriptions.len(), "snapshot saved");
    Ok(subscriptions.len())
}
