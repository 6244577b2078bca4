//! Analysis Orchestration
//!
//! Composes identity gating, inference and history persistence for one
//! analysis request at a time.

pub mod service;

pub use service::{
    AnalysisError, AnalysisOrchestrator, AnalysisOutcome, AnalysisPhase, ANALYSIS_PROMPT,
};
