//! Full pipeline scenarios through `AppState`: bootstrap, inference against
//! the scripted HTTP stub, and persistence into the synced history.

use std::sync::Arc;
use std::time::Duration;

use faunalens::services::orchestrator::{AnalysisError, AnalysisPhase};
use faunalens::{AppState, InMemoryStore};
use faunalens_core::config::AppConfig;

use super::support::{sample_payload, valid_response_body, ScriptedIdentityProvider, StubServer};

fn config_for(server: &StubServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.inference.base_url = server.base_url();
    config.inference.api_key = Some("test-key".to_string());
    config.inference.backoff_base_ms = 20;
    config
}

fn app_state(server: &StubServer) -> AppState {
    AppState::new(
        config_for(server),
        ScriptedIdentityProvider::new(None, Some("anon-1")),
        Arc::new(InMemoryStore::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn analysis_after_transient_failures_commits_one_record() {
    let server = StubServer::spawn(vec![
        (500, "{}".to_string()),
        (500, "{}".to_string()),
        (200, valid_response_body()),
    ])
    .await;
    let state = app_state(&server);

    state.establish_identity().await.unwrap();
    let mut subscription = state.subscribe_history().await.unwrap();
    assert!(subscription.recv().await.unwrap().unwrap().is_empty());

    let outcome = state.run_analysis(&[1, 2, 3], "image/png").await.unwrap();
    assert_eq!(outcome.payload, sample_payload());
    assert!(outcome.store_notice.is_none());
    assert_eq!(server.hits(), 3);

    let snapshot = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, outcome.record.unwrap().id);
    assert_eq!(state.orchestrator().phase().await, AnalysisPhase::Success);
}

#[tokio::test]
async fn exhausted_inference_commits_nothing() {
    let server = StubServer::spawn(vec![
        (500, "{}".to_string()),
        (500, "{}".to_string()),
        (500, "{}".to_string()),
    ])
    .await;
    let state = app_state(&server);

    state.establish_identity().await.unwrap();
    let mut subscription = state.subscribe_history().await.unwrap();
    assert!(subscription.recv().await.unwrap().unwrap().is_empty());

    let err = state.run_analysis(&[1, 2, 3], "image/png").await.unwrap_err();
    assert!(matches!(err, AnalysisError::InferenceFailed(_)));
    assert_eq!(server.hits(), 3);
    assert_eq!(state.orchestrator().phase().await, AnalysisPhase::Failed);
    assert!(state.orchestrator().last_error().await.is_some());

    // No record ever appears in the subscription.
    let nothing =
        tokio::time::timeout(Duration::from_millis(200), subscription.recv()).await;
    assert!(nothing.is_err(), "unexpected snapshot after failed analysis");
}

#[tokio::test]
async fn oversized_image_fails_before_any_network_call() {
    let server = StubServer::spawn(vec![(200, valid_response_body())]).await;
    let state = app_state(&server);
    state.establish_identity().await.unwrap();

    let image = vec![0u8; 6 * 1024 * 1024];
    let err = state.run_analysis(&image, "image/png").await.unwrap_err();

    match err {
        AnalysisError::InferenceFailed(message) => {
            assert!(message.contains("exceeds maximum"));
        }
        other => panic!("expected InferenceFailed, got {:?}", other),
    }
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn operations_are_gated_on_bootstrap() {
    let server = StubServer::spawn(vec![]).await;
    let state = app_state(&server);

    // Before establish: no history access, no analysis.
    assert!(state.subscribe_history().await.is_err());
    let err = state.run_analysis(&[1, 2, 3], "image/png").await.unwrap_err();
    assert!(matches!(err, AnalysisError::NotReady));
    assert_eq!(server.hits(), 0);

    state.establish_identity().await.unwrap();
    assert!(state.retrieval_state().is_ready());
    assert!(state.subscribe_history().await.is_ok());

    state.shutdown();
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let mut config = AppConfig::default();
    config.inference.model = String::new();

    let result = AppState::new(
        config,
        ScriptedIdentityProvider::new(None, Some("anon-1")),
        Arc::new(InMemoryStore::new()),
    );
    assert!(result.is_err());
}
