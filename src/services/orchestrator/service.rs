//! Analysis Orchestrator
//!
//! Runs one analysis request at a time through an explicit state machine:
//! `Idle → Submitting → {Success | Failed}`. Preconditions are checked before
//! any network activity; a successful inference is written through the synced
//! collection, and a persistence failure is reported as a secondary notice
//! that never masks the inference result.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use faunalens_inference::{AnalysisPayload, InferenceProvider, SchemaDescriptor};

use crate::models::record::{self, AnalysisRecord};
use crate::services::history::SyncedCollection;
use crate::services::identity::RetrievalState;

/// Fixed prompt sent with every analysis request.
pub const ANALYSIS_PROMPT: &str = "Identify the organism in this photograph. Provide its \
scientific name, its common name, a short summary, its taxonomic classification (order, \
family, class) and its ecological role.";

/// Lifecycle of one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    Idle,
    Submitting,
    Success,
    Failed,
}

/// Errors from `run_analysis`
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Identity bootstrap has not reached Ready.
    #[error("Identity is not ready")]
    NotReady,

    /// No image bytes were staged for analysis.
    #[error("No image staged for analysis")]
    NoImage,

    /// A previous analysis is still in flight.
    #[error("An analysis is already in flight")]
    AlreadyRunning,

    /// Inference retries were exhausted; carries the last error verbatim.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

/// Result of a completed analysis. `record` is present when persistence
/// succeeded; otherwise `store_notice` carries the non-fatal write failure.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub payload: AnalysisPayload,
    pub record: Option<AnalysisRecord>,
    pub store_notice: Option<String>,
}

/// Orchestrates a single in-flight analysis per instance.
pub struct AnalysisOrchestrator {
    inference: Arc<dyn InferenceProvider>,
    collection: Arc<SyncedCollection>,
    retrieval: watch::Receiver<RetrievalState>,
    schema: SchemaDescriptor,
    phase: Mutex<AnalysisPhase>,
    last_outcome: Mutex<Option<AnalysisOutcome>>,
    last_error: Mutex<Option<String>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        inference: Arc<dyn InferenceProvider>,
        collection: Arc<SyncedCollection>,
        retrieval: watch::Receiver<RetrievalState>,
    ) -> Self {
        Self {
            inference,
            collection,
            retrieval,
            schema: SchemaDescriptor::analysis(),
            phase: Mutex::new(AnalysisPhase::Idle),
            last_outcome: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Current request phase.
    pub async fn phase(&self) -> AnalysisPhase {
        *self.phase.lock().await
    }

    /// Outcome of the most recent successful analysis.
    pub async fn last_outcome(&self) -> Option<AnalysisOutcome> {
        self.last_outcome.lock().await.clone()
    }

    /// Error message of the most recent failed analysis.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    /// Run one analysis. Fails fast on unmet preconditions without touching
    /// the network; rejects concurrent invocations while one is in flight.
    pub async fn run_analysis(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let identity = match self.retrieval.borrow().clone() {
            RetrievalState::Ready(identity) => identity,
            _ => return Err(AnalysisError::NotReady),
        };
        if image.is_empty() {
            return Err(AnalysisError::NoImage);
        }

        {
            let mut phase = self.phase.lock().await;
            if *phase == AnalysisPhase::Submitting {
                return Err(AnalysisError::AlreadyRunning);
            }
            *phase = AnalysisPhase::Submitting;
        }

        let result = self
            .inference
            .analyze(image, mime_type, &self.schema, ANALYSIS_PROMPT)
            .await;

        match result {
            Ok(payload) => {
                let image_data = record::data_uri(mime_type, image);
                let (committed, store_notice) = match self
                    .collection
                    .write(&identity, &payload, &image_data)
                    .await
                {
                    Ok(committed) => (Some(committed), None),
                    Err(err) => {
                        warn!(%identity, %err, "analysis succeeded but persistence failed");
                        (None, Some(err.to_string()))
                    }
                };

                info!(
                    %identity,
                    species = %payload.scientific_name,
                    persisted = committed.is_some(),
                    "analysis complete"
                );
                let outcome = AnalysisOutcome {
                    payload,
                    record: committed,
                    store_notice,
                };

                *self.phase.lock().await = AnalysisPhase::Success;
                *self.last_outcome.lock().await = Some(outcome.clone());
                *self.last_error.lock().await = None;
                Ok(outcome)
            }
            Err(err) => {
                let message = err.to_string();
                *self.phase.lock().await = AnalysisPhase::Failed;
                *self.last_error.lock().await = Some(message.clone());
                Err(AnalysisError::InferenceFailed(message))
            }
        }
    }
}
