//! Faunalens - Orchestration Core Library
//!
//! Client-side orchestration core for schema-constrained image analysis with
//! a live-synchronized per-identity history. It includes:
//! - Identity bootstrap state machine (token exchange with anonymous fallback)
//! - Synced history collection over a document-store capability trait
//! - Analysis orchestrator composing inference and persistence
//! - Data models and utilities
//!
//! The identity provider and document store are collaborator traits supplied
//! by the host; the inference client lives in `faunalens-inference`.

pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used items
pub use models::record::AnalysisRecord;
pub use services::history::{InMemoryStore, Subscription, SyncedCollection};
pub use services::identity::{Identity, IdentityBootstrap, RetrievalState};
pub use services::orchestrator::{AnalysisOrchestrator, AnalysisOutcome};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
