//! Application State
//!
//! Composition root wiring the configuration, identity bootstrap, synced
//! history collection, inference client and analysis orchestrator. The host
//! process constructs one `AppState` at startup with its collaborator
//! implementations and drives everything through it.

use std::sync::Arc;

use faunalens_core::config::AppConfig;
use faunalens_inference::{GeminiClient, InferenceProvider};

use crate::services::history::{DocumentStore, Subscription, SyncedCollection};
use crate::services::identity::{
    AuthError, Identity, IdentityBootstrap, IdentityProvider, RetrievalState,
};
use crate::services::orchestrator::{AnalysisError, AnalysisOrchestrator, AnalysisOutcome};
use crate::utils::error::{AppError, AppResult};

/// Application state owning every service of the orchestration core.
pub struct AppState {
    config: AppConfig,
    bootstrap: Arc<IdentityBootstrap>,
    collection: Arc<SyncedCollection>,
    orchestrator: Arc<AnalysisOrchestrator>,
}

impl AppState {
    /// Build the state with the default inference client.
    pub fn new(
        config: AppConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> AppResult<Self> {
        let inference: Arc<dyn InferenceProvider> =
            Arc::new(GeminiClient::new(&config.inference));
        Self::with_inference(config, identity_provider, store, inference)
    }

    /// Build the state with an explicit inference provider.
    pub fn with_inference(
        config: AppConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        inference: Arc<dyn InferenceProvider>,
    ) -> AppResult<Self> {
        config.validate().map_err(AppError::config)?;

        let bootstrap = IdentityBootstrap::new(identity_provider, &config.identity);
        let collection = Arc::new(SyncedCollection::new(store, config.store.clone()));
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            inference,
            Arc::clone(&collection),
            bootstrap.subscribe_state(),
        ));

        Ok(Self {
            config,
            bootstrap,
            collection,
            orchestrator,
        })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current retrieval state.
    pub fn retrieval_state(&self) -> RetrievalState {
        self.bootstrap.state()
    }

    /// Establish the process identity (idempotent; see `IdentityBootstrap`).
    pub async fn establish_identity(&self) -> Result<Identity, AuthError> {
        self.bootstrap.establish().await
    }

    /// Subscribe to the current identity's history. Requires Ready state.
    pub async fn subscribe_history(&self) -> AppResult<Subscription> {
        match self.retrieval_state() {
            RetrievalState::Ready(identity) => {
                Ok(self.collection.subscribe(&identity).await?)
            }
            RetrievalState::Bootstrapping => {
                Err(AppError::auth("identity bootstrap still in progress"))
            }
            RetrievalState::Error(message) => Err(AppError::auth(message)),
        }
    }

    /// Run one analysis through the orchestrator.
    pub async fn run_analysis(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.orchestrator.run_analysis(image, mime_type).await
    }

    /// The analysis orchestrator (phase and last-result slots).
    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    /// The synced history collection.
    pub fn collection(&self) -> &Arc<SyncedCollection> {
        &self.collection
    }

    /// Cancel background listeners at process teardown.
    pub fn shutdown(&self) {
        self.bootstrap.shutdown();
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("retrieval_state", &self.retrieval_state())
            .finish()
    }
}
