//! Identity Services
//!
//! Establishes and tracks the single authenticated identity for this process.

pub mod bootstrap;
pub mod provider;

pub use bootstrap::IdentityBootstrap;
pub use provider::{Credential, IdentityProvider, Invalidation};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque stable identifier for an authenticated user. Created once per
/// process lifetime and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gate for operations that require an established identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalState {
    /// Bootstrap in progress; data operations must wait.
    Bootstrapping,
    /// Identity established; fixed for the process lifetime.
    Ready(Identity),
    /// Both bootstrap paths failed; the caller may re-invoke `establish`.
    Error(String),
}

impl RetrievalState {
    pub fn is_ready(&self) -> bool {
        matches!(self, RetrievalState::Ready(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            RetrievalState::Ready(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Errors from identity bootstrap
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Every credential path failed; carries the last path's error.
    #[error("Authentication failed: {last_error}")]
    Exhausted { last_error: String },

    /// The identity provider rejected a single operation.
    #[error("Identity provider error: {0}")]
    Provider(String),
}
