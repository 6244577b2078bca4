//! In-Memory Document Store
//!
//! Local `DocumentStore` backend. Assigns uuid ids and strictly monotonic
//! server timestamps, and fans a fresh full snapshot out to every subscriber
//! of a partition on each committed append. Also the store used by the test
//! suites, with fault hooks for an unreachable channel and revoked access.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use async_trait::async_trait;

use super::store::{
    CollectionPath, Committed, Document, DocumentStore, OrderDirection, SnapshotReceiver,
    StoreError, StoreResult,
};

/// Snapshot channel capacity per subscriber. A subscriber that falls this far
/// behind is dropped rather than blocking commits.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

struct Subscriber {
    tx: mpsc::Sender<StoreResult<Vec<Document>>>,
    direction: OrderDirection,
}

#[derive(Default)]
struct Partition {
    documents: Vec<Document>,
    subscribers: Vec<Subscriber>,
}

#[derive(Default)]
struct MemoryState {
    partitions: HashMap<String, Partition>,
    revoked: HashSet<String>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// In-memory document store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable backing channel. While offline, appends and
    /// new subscriptions fail with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Revoke access to a partition: pending writes fail with
    /// `PermissionDenied` and every active subscription is terminated with an
    /// error item.
    pub async fn revoke(&self, path: &CollectionPath) {
        let key = path.storage_key();
        let mut state = self.state.lock().await;
        state.revoked.insert(key.clone());

        if let Some(partition) = state.partitions.get_mut(&key) {
            for subscriber in partition.subscribers.drain(..) {
                let _ = subscriber.tx.try_send(Err(StoreError::PermissionDenied(
                    format!("access to {} revoked", key),
                )));
            }
        }
    }

    /// Next server timestamp: wall clock, clamped forward so commit order and
    /// timestamp order always agree.
    fn next_timestamp(state: &mut MemoryState) -> DateTime<Utc> {
        let now = Utc::now();
        let assigned = match state.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        state.last_timestamp = Some(assigned);
        assigned
    }

    fn snapshot(documents: &[Document], direction: OrderDirection) -> Vec<Document> {
        let mut docs = documents.to_vec();
        docs.sort_by(|a, b| {
            let by_time = match direction {
                OrderDirection::Ascending => a.created_at.cmp(&b.created_at),
                OrderDirection::Descending => b.created_at.cmp(&a.created_at),
            };
            by_time.then_with(|| a.id.cmp(&b.id))
        });
        docs
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn append(&self, path: &CollectionPath, document: Value) -> StoreResult<Committed> {
        self.check_reachable()?;

        let key = path.storage_key();
        let mut state = self.state.lock().await;

        if state.revoked.contains(&key) {
            return Err(StoreError::PermissionDenied(format!(
                "append to revoked partition {}",
                key
            )));
        }

        let created_at = Self::next_timestamp(&mut state);
        let id = Uuid::new_v4().to_string();
        let partition = state.partitions.entry(key.clone()).or_default();
        partition.documents.push(Document {
            id: id.clone(),
            created_at,
            data: document,
        });
        debug!(%key, %id, "document committed");

        // Fan out a fresh snapshot to every live subscriber, preserving
        // commit order by sending while the partition is locked.
        let documents = partition.documents.clone();
        partition.subscribers.retain(|subscriber| {
            let snapshot = Self::snapshot(&documents, subscriber.direction);
            match subscriber.tx.try_send(Ok(snapshot)) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%key, "dropping subscriber that stopped draining snapshots");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });

        Ok(Committed {
            id,
            server_timestamp: created_at,
        })
    }

    async fn subscribe(
        &self,
        path: &CollectionPath,
        _order_field: &str,
        direction: OrderDirection,
    ) -> StoreResult<SnapshotReceiver> {
        self.check_reachable()?;

        let key = path.storage_key();
        let mut state = self.state.lock().await;

        if state.revoked.contains(&key) {
            return Err(StoreError::PermissionDenied(format!(
                "subscribe to revoked partition {}",
                key
            )));
        }

        let partition = state.partitions.entry(key).or_default();
        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);

        let initial = Self::snapshot(&partition.documents, direction);
        let _ = tx.try_send(Ok(initial));
        partition.subscribers.push(Subscriber { tx, direction });

        Ok(rx)
    }
}
