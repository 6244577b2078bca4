//! Document Store Interface
//!
//! Capability trait for the hosted document store. Writes append documents to
//! an identity-scoped collection; reads arrive as full snapshots over a
//! channel, one per remote change, ordered by the requested field.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from document store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing channel cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Identity scoping was violated. Structural misuse, fatal to the call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Snapshot ordering direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

/// Identity-scoped collection path: per-application namespace, then
/// per-identity partition, then a fixed collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub namespace: String,
    pub identity: String,
    pub collection: String,
}

impl CollectionPath {
    pub fn new(
        namespace: impl Into<String>,
        identity: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            identity: identity.into(),
            collection: collection.into(),
        }
    }

    /// Flattened path used as the partition key.
    pub fn storage_key(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.identity, self.collection)
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// A stored document with its store-assigned metadata.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

/// Metadata assigned by the store when an append commits.
#[derive(Debug, Clone)]
pub struct Committed {
    pub id: String,
    pub server_timestamp: DateTime<Utc>,
}

/// Channel of full-collection snapshots. An `Err` item terminates the
/// subscription; the consumer must resubscribe.
pub type SnapshotReceiver = mpsc::Receiver<StoreResult<Vec<Document>>>;

/// Trait implemented by document store backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document; the store assigns id and server timestamp.
    async fn append(&self, path: &CollectionPath, document: Value) -> StoreResult<Committed>;

    /// Subscribe to full snapshots of a collection, current state first,
    /// then one per committed change, ordered by `order_field`.
    async fn subscribe(
        &self,
        path: &CollectionPath,
        order_field: &str,
        direction: OrderDirection,
    ) -> StoreResult<SnapshotReceiver>;
}
