//! Data Models
//!
//! Contains the persisted data structures used throughout the application.

pub mod record;

pub use record::*;
