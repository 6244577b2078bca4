//! Faunalens Core
//!
//! Foundation crate for the Faunalens workspace: the core error type and the
//! explicit configuration structs shared by the orchestration core and the
//! inference client. Kept dependency-light (serde + thiserror + std) so every
//! other crate can depend on it.

pub mod config;
pub mod error;

pub use config::{AppConfig, IdentitySettings, InferenceSettings, SettingsUpdate, StoreSettings};
pub use error::{CoreError, CoreResult};
