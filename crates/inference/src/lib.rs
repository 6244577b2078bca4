//! Faunalens Inference
//!
//! Client for the generative inference service: sends one image together with
//! a structural response-schema contract, retries transient failures with a
//! fixed exponential backoff, and returns a validated `AnalysisPayload`.
//!
//! Persistence is deliberately out of scope here; the orchestration core in
//! the application crate writes successful results through its own store.

pub mod gemini;
pub mod http_client;
pub mod provider;
pub mod schema;
pub mod types;

// Re-export main types
pub use gemini::GeminiClient;
pub use http_client::build_http_client;
pub use provider::InferenceProvider;
pub use schema::SchemaDescriptor;
pub use types::*;
