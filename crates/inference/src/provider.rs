//! Inference Provider Trait
//!
//! Defines the seam between the orchestration core and a concrete inference
//! backend.

use async_trait::async_trait;

use crate::schema::SchemaDescriptor;
use crate::types::{AnalysisPayload, InferenceResult};

/// Trait implemented by inference backends.
///
/// `analyze` owns the full request lifecycle for one image: precondition
/// checks, the schema-constrained call, transient retries, and structural
/// validation of the response. It has no side effects beyond the network
/// call — persistence belongs to the caller.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Produce a schema-valid structured analysis of one image.
    async fn analyze(
        &self,
        image: &[u8],
        mime_type: &str,
        schema: &SchemaDescriptor,
        prompt: &str,
    ) -> InferenceResult<AnalysisPayload>;

    /// Check that the provider is configured and reachable.
    async fn health_check(&self) -> InferenceResult<()>;
}
