//! Synced collection scenarios: commit-order delivery, snapshot idempotence,
//! and full-field round-trips.

use std::sync::Arc;
use std::time::Duration;

use faunalens::models::record::data_uri;
use faunalens::services::history::{
    DocumentStore, InMemoryStore, StoreError, Subscription, SyncedCollection,
};
use faunalens::services::identity::Identity;
use faunalens::AnalysisRecord;
use faunalens_core::config::StoreSettings;
use faunalens_inference::{AnalysisPayload, Classification};
use tokio_stream::StreamExt;

use super::support::sample_payload;

fn collection() -> SyncedCollection {
    SyncedCollection::new(Arc::new(InMemoryStore::new()), StoreSettings::default())
}

async fn next_snapshot(subscription: &mut Subscription) -> Vec<AnalysisRecord> {
    tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .expect("snapshot timed out")
        .expect("stream ended")
        .expect("snapshot errored")
}

#[tokio::test]
async fn round_trip_preserves_every_field() {
    let collection = collection();
    let identity = Identity::new("user-1");

    let payload = AnalysisPayload {
        scientific_name: "Lumbricus terrestris".to_string(),
        common_name: "Common earthworm".to_string(),
        summary: "A deep-burrowing annelid.".to_string(),
        classification: Classification {
            order: Some("Opisthopora".to_string()),
            family: None,
            class: Some("Clitellata".to_string()),
        },
        ecological_role: "Soil engineer.".to_string(),
    };
    let image_data = data_uri("image/jpeg", &[255, 216, 255]);

    let written = collection
        .write(&identity, &payload, &image_data)
        .await
        .unwrap();
    assert!(!written.id.is_empty());

    let mut subscription = collection.subscribe(&identity).await.unwrap();
    let snapshot = next_snapshot(&mut subscription).await;
    assert_eq!(snapshot.len(), 1);

    let observed = &snapshot[0];
    assert_eq!(observed.id, written.id);
    assert_eq!(observed.created_at, written.created_at);
    assert_eq!(observed.payload(), payload);
    assert_eq!(observed.image_data, image_data);
}

#[tokio::test]
async fn earlier_write_is_never_observed_after_later_write_alone() {
    let collection = collection();
    let identity = Identity::new("user-1");

    let mut subscription = collection.subscribe(&identity).await.unwrap();
    assert!(next_snapshot(&mut subscription).await.is_empty());

    let w1 = collection
        .write(&identity, &sample_payload(), "data:image/png;base64,AA==")
        .await
        .unwrap();
    let w2 = collection
        .write(&identity, &sample_payload(), "data:image/png;base64,AA==")
        .await
        .unwrap();

    // Every subscriber observes a snapshot containing W1 before one
    // containing W2; W2 never appears without W1.
    let mut seen_w1 = false;
    loop {
        let snapshot = next_snapshot(&mut subscription).await;
        let has_w1 = snapshot.iter().any(|r| r.id == w1.id);
        let has_w2 = snapshot.iter().any(|r| r.id == w2.id);
        if has_w2 {
            assert!(has_w1, "observed W2 without W1");
            break;
        }
        if has_w1 {
            seen_w1 = true;
        }
    }
    assert!(seen_w1);
}

#[tokio::test]
async fn snapshots_are_ordered_newest_first() {
    let collection = collection();
    let identity = Identity::new("user-1");

    let mut written = Vec::new();
    for _ in 0..4 {
        written.push(
            collection
                .write(&identity, &sample_payload(), "data:image/png;base64,AA==")
                .await
                .unwrap(),
        );
    }

    let mut subscription = collection.subscribe(&identity).await.unwrap();
    let snapshot = next_snapshot(&mut subscription).await;

    let observed: Vec<&str> = snapshot.iter().map(|r| r.id.as_str()).collect();
    let expected: Vec<&str> = written.iter().rev().map(|r| r.id.as_str()).collect();
    assert_eq!(observed, expected);

    for pair in snapshot.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[tokio::test]
async fn successive_subscriptions_start_from_identical_snapshots() {
    let collection = collection();
    let identity = Identity::new("user-1");

    for _ in 0..3 {
        collection
            .write(&identity, &sample_payload(), "data:image/png;base64,AA==")
            .await
            .unwrap();
    }

    let mut first = collection.subscribe(&identity).await.unwrap();
    let first_snapshot = next_snapshot(&mut first).await;

    let mut second = collection.subscribe(&identity).await.unwrap();
    let second_snapshot = next_snapshot(&mut second).await;

    assert_eq!(first_snapshot, second_snapshot);
}

#[tokio::test]
async fn canceled_subscription_releases_the_stream() {
    let collection = collection();
    let identity = Identity::new("user-1");

    let mut subscription = collection.subscribe(&identity).await.unwrap();
    assert!(next_snapshot(&mut subscription).await.is_empty());

    subscription.cancel();

    // After cancellation the stream ends; later items are never delivered.
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(item) = subscription.recv().await {
            item.expect("unexpected error item");
        }
    })
    .await;
    assert!(ended.is_ok(), "stream did not end after cancel");
}

#[tokio::test]
async fn stream_adapter_ends_after_token_cancellation() {
    let collection = collection();
    let identity = Identity::new("user-1");

    let subscription = collection.subscribe(&identity).await.unwrap();
    let token = subscription.cancellation_token();
    let mut stream = subscription.into_stream();

    assert!(stream.next().await.unwrap().unwrap().is_empty());

    token.cancel();
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        while stream.next().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok(), "stream did not end after token cancel");
}

#[tokio::test]
async fn unreachable_store_fails_writes_with_unavailable() {
    let store = Arc::new(InMemoryStore::new());
    let collection = SyncedCollection::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        StoreSettings::default(),
    );
    let identity = Identity::new("user-1");

    store.set_offline(true);
    let err = collection
        .write(&identity, &sample_payload(), "data:image/png;base64,AA==")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}
