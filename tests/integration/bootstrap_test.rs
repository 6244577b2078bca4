//! Identity bootstrap scenarios: the token-to-anonymous fallback ladder and
//! identity scoping of subsequent writes.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use faunalens::services::history::{InMemoryStore, SyncedCollection};
use faunalens::services::identity::{Identity, IdentityBootstrap, RetrievalState};
use faunalens_core::config::{IdentitySettings, StoreSettings};

use super::support::{sample_payload, ScriptedIdentityProvider};

fn settings_with_token() -> IdentitySettings {
    IdentitySettings {
        credential_token: Some("issued-token".to_string()),
    }
}

#[tokio::test]
async fn token_failure_falls_back_to_anonymous() {
    let provider = ScriptedIdentityProvider::new(None, Some("anon-7"));
    let bootstrap = IdentityBootstrap::new(provider.clone(), &settings_with_token());

    let identity = bootstrap.establish().await.unwrap();
    assert_eq!(identity.as_str(), "anon-7");
    assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.anonymous_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bootstrap.state(), RetrievalState::Ready(identity));
}

#[tokio::test]
async fn anonymous_identity_scopes_subsequent_writes() {
    let provider = ScriptedIdentityProvider::new(None, Some("anon-7"));
    let bootstrap = IdentityBootstrap::new(provider, &settings_with_token());
    let identity = bootstrap.establish().await.unwrap();

    let store = Arc::new(InMemoryStore::new());
    let collection = SyncedCollection::new(store, StoreSettings::default());

    let image_data = "data:image/png;base64,AAEC";
    let written = collection
        .write(&identity, &sample_payload(), image_data)
        .await
        .unwrap();

    // The anonymous identity's partition sees the record...
    let mut own = collection.subscribe(&identity).await.unwrap();
    let snapshot = own.recv().await.unwrap().unwrap();
    assert_eq!(snapshot, vec![written]);

    // ...and a different identity's partition stays empty.
    let other = Identity::new("someone-else");
    let mut foreign = collection.subscribe(&other).await.unwrap();
    assert!(foreign.recv().await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_ladder_reports_error_state() {
    let provider = ScriptedIdentityProvider::new(None, None);
    let bootstrap = IdentityBootstrap::new(provider, &settings_with_token());

    let err = bootstrap.establish().await.unwrap_err();
    assert!(err.to_string().contains("anonymous sign-in unavailable"));
    assert!(matches!(bootstrap.state(), RetrievalState::Error(_)));
}
