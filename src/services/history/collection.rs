//! Synced Collection
//!
//! Mirrors one identity's remote history partition into an ordered local
//! sequence, live-updated. Each subscription is a cancelable forwarding task;
//! at most one subscription is active per identity per process, and
//! re-subscribing supersedes the previous stream.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use faunalens_core::config::StoreSettings;
use faunalens_inference::AnalysisPayload;

use crate::models::record::{self, AnalysisRecord};
use crate::services::identity::Identity;

use super::store::{
    CollectionPath, Document, DocumentStore, OrderDirection, StoreError, StoreResult,
};

/// Field the remote store orders snapshots by.
pub const ORDER_FIELD: &str = "createdAt";

const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// A live history subscription. Each received item is a fresh full snapshot
/// in canonical order; an `Err` item terminates the stream and the consumer
/// must resubscribe. The consumer holds the cancellation handle and invokes
/// it when its context ends.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<StoreResult<Vec<AnalysisRecord>>>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Receive the next snapshot. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<StoreResult<Vec<AnalysisRecord>>> {
        self.rx.recv().await
    }

    /// Cancel the subscription and release the remote channel.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for canceling the subscription after `into_stream`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Adapt the subscription into a `Stream`. Keep the cancellation token
    /// from `cancellation_token` to release the remote channel when done.
    pub fn into_stream(self) -> ReceiverStream<StoreResult<Vec<AnalysisRecord>>> {
        ReceiverStream::new(self.rx)
    }
}

/// Identity-scoped synced view of the analysis history.
pub struct SyncedCollection {
    store: Arc<dyn DocumentStore>,
    settings: StoreSettings,
    active: Mutex<HashMap<Identity, CancellationToken>>,
}

impl SyncedCollection {
    pub fn new(store: Arc<dyn DocumentStore>, settings: StoreSettings) -> Self {
        Self {
            store,
            settings,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, identity: &Identity) -> CollectionPath {
        CollectionPath::new(
            self.settings.namespace.clone(),
            identity.as_str(),
            self.settings.collection.clone(),
        )
    }

    fn check_identity(identity: &Identity) -> StoreResult<()> {
        if identity.as_str().is_empty() {
            return Err(StoreError::PermissionDenied(
                "empty identity partition".to_string(),
            ));
        }
        Ok(())
    }

    /// Subscribe to the identity's history. Must be called only once the
    /// retrieval state is Ready. Supersedes any prior subscription for the
    /// same identity.
    pub async fn subscribe(&self, identity: &Identity) -> StoreResult<Subscription> {
        Self::check_identity(identity)?;

        let path = self.path_for(identity);
        let mut store_rx = self
            .store
            .subscribe(&path, ORDER_FIELD, OrderDirection::Descending)
            .await?;

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if let Some(prior) = active.insert(identity.clone(), cancel.clone()) {
                debug!(%identity, "superseding prior history subscription");
                prior.cancel();
            }
        }

        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let token = cancel.clone();
        let subscriber_identity = identity.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = store_rx.recv() => match item {
                        Some(Ok(documents)) => {
                            let snapshot = to_snapshot(documents);
                            if tx.send(Ok(snapshot)).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            warn!(identity = %subscriber_identity, %err, "history subscription failed");
                            let _ = tx.send(Err(err)).await;
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(Subscription { rx, cancel })
    }

    /// Commit one analysis to the identity's partition and return the record
    /// as the store committed it.
    pub async fn write(
        &self,
        identity: &Identity,
        payload: &AnalysisPayload,
        image_data: &str,
    ) -> StoreResult<AnalysisRecord> {
        Self::check_identity(identity)?;

        let path = self.path_for(identity);
        let body = record::document_body(payload, image_data);
        let committed = self.store.append(&path, body).await?;
        info!(%identity, id = %committed.id, "analysis committed to history");

        Ok(AnalysisRecord::committed(
            committed.id,
            committed.server_timestamp,
            payload.clone(),
            image_data.to_string(),
        ))
    }
}

/// Map a document snapshot into records in canonical order. Documents that do
/// not parse are skipped rather than poisoning the whole snapshot.
fn to_snapshot(documents: Vec<Document>) -> Vec<AnalysisRecord> {
    let mut records: Vec<AnalysisRecord> = documents
        .iter()
        .filter_map(|doc| {
            match AnalysisRecord::from_document(&doc.id, doc.created_at, &doc.data) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(id = %doc.id, %err, "skipping malformed history document");
                    None
                }
            }
        })
        .collect();
    record::sort_snapshot(&mut records);
    records
}
