//! Services
//!
//! Business logic services for the orchestration core.

pub mod history;
pub mod identity;
pub mod orchestrator;

pub use history::{InMemoryStore, Subscription, SyncedCollection};
pub use identity::{IdentityBootstrap, RetrievalState};
pub use orchestrator::AnalysisOrchestrator;
