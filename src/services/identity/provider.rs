//! Identity Provider Interface
//!
//! Capability trait for the hosted identity service. Invalidation events are
//! surfaced as a channel the bootstrap consumes from a cancelable task, not
//! as an ambient callback.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AuthError, Identity};

/// A credential issued by the identity service.
#[derive(Debug, Clone)]
pub struct Credential {
    pub identity: Identity,
    pub is_anonymous: bool,
}

/// External identity invalidation (e.g. session revocation).
#[derive(Debug, Clone)]
pub struct Invalidation {
    pub reason: String,
}

/// Trait implemented by the hosted identity service adapter.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a previously-issued credential token for a credential.
    async fn exchange_token(&self, token: &str) -> Result<Credential, AuthError>;

    /// Create a fresh anonymous credential.
    async fn create_anonymous(&self) -> Result<Credential, AuthError>;

    /// Receive external invalidation events for the current session.
    /// The returned channel stays open for the provider's lifetime.
    fn subscribe_invalidations(&self) -> mpsc::Receiver<Invalidation>;
}
