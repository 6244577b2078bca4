//! Identity Bootstrap
//!
//! Establishes a single authenticated identity per process lifetime. The
//! credential paths form a flat, ordered ladder — token exchange first when a
//! token was injected, anonymous creation as the fallback — evaluated until
//! the first success. State is published through a watch channel so every
//! consumer can gate on `RetrievalState` without polling.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use faunalens_core::config::IdentitySettings;

use super::provider::IdentityProvider;
use super::{AuthError, Identity, RetrievalState};

/// Ordered credential paths tried by `establish`; first success wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootstrapPath {
    TokenExchange,
    Anonymous,
}

impl fmt::Display for BootstrapPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapPath::TokenExchange => write!(f, "token_exchange"),
            BootstrapPath::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Identity bootstrap state machine.
///
/// At most one attempt is in flight at a time: concurrent `establish` calls
/// serialize on an internal lock and the late arrivals observe the winner's
/// result instead of starting a second attempt.
pub struct IdentityBootstrap {
    provider: Arc<dyn IdentityProvider>,
    credential_token: Option<String>,
    state_tx: watch::Sender<RetrievalState>,
    inflight: Mutex<()>,
    shutdown: CancellationToken,
    listener: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl IdentityBootstrap {
    /// Create a new bootstrap in the `Bootstrapping` state.
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: &IdentitySettings) -> Arc<Self> {
        let (state_tx, _) = watch::channel(RetrievalState::Bootstrapping);
        Arc::new(Self {
            provider,
            credential_token: settings.credential_token.clone(),
            state_tx,
            inflight: Mutex::new(()),
            shutdown: CancellationToken::new(),
            listener: std::sync::Mutex::new(None),
        })
    }

    /// Current retrieval state.
    pub fn state(&self) -> RetrievalState {
        self.state_tx.borrow().clone()
    }

    /// Watch the retrieval state. Consumers re-check after every change; a
    /// previously Ready identity may return to Bootstrapping on invalidation.
    pub fn subscribe_state(&self) -> watch::Receiver<RetrievalState> {
        self.state_tx.subscribe()
    }

    /// Establish the process identity, resolving at most once.
    ///
    /// Callers that arrive while an attempt is in flight wait for that
    /// attempt's outcome. After a terminal `Error` the caller may invoke
    /// `establish` again.
    pub async fn establish(self: &Arc<Self>) -> Result<Identity, AuthError> {
        if let RetrievalState::Ready(identity) = self.state() {
            return Ok(identity);
        }

        let _guard = self.inflight.lock().await;

        // The attempt we were waiting on may have resolved while queued.
        if let RetrievalState::Ready(identity) = self.state() {
            return Ok(identity);
        }

        self.state_tx.send_replace(RetrievalState::Bootstrapping);
        match self.run_paths().await {
            Ok(identity) => {
                self.state_tx
                    .send_replace(RetrievalState::Ready(identity.clone()));
                self.spawn_invalidation_listener();
                Ok(identity)
            }
            Err(err) => {
                self.state_tx
                    .send_replace(RetrievalState::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Cancel the invalidation listener at process teardown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn paths(&self) -> Vec<BootstrapPath> {
        if self.credential_token.is_some() {
            vec![BootstrapPath::TokenExchange, BootstrapPath::Anonymous]
        } else {
            vec![BootstrapPath::Anonymous]
        }
    }

    /// Walk the credential ladder until the first success.
    async fn run_paths(&self) -> Result<Identity, AuthError> {
        let mut last_error = String::from("no credential path available");

        for path in self.paths() {
            debug!(%path, "attempting bootstrap path");
            let outcome = match path {
                BootstrapPath::TokenExchange => {
                    let token = self.credential_token.as_deref().unwrap_or_default();
                    self.provider.exchange_token(token).await
                }
                BootstrapPath::Anonymous => self.provider.create_anonymous().await,
            };

            match outcome {
                Ok(credential) => {
                    info!(
                        identity = %credential.identity,
                        anonymous = credential.is_anonymous,
                        %path,
                        "identity established"
                    );
                    return Ok(credential.identity);
                }
                Err(err) => {
                    warn!(%path, %err, "bootstrap path failed");
                    last_error = err.to_string();
                }
            }
        }

        Err(AuthError::Exhausted { last_error })
    }

    /// Re-run the ladder after an external invalidation, under the same
    /// single-flight lock as `establish`.
    async fn rebootstrap(&self) {
        let _guard = self.inflight.lock().await;
        self.state_tx.send_replace(RetrievalState::Bootstrapping);
        match self.run_paths().await {
            Ok(identity) => {
                self.state_tx.send_replace(RetrievalState::Ready(identity));
            }
            Err(err) => {
                self.state_tx
                    .send_replace(RetrievalState::Error(err.to_string()));
            }
        }
    }

    fn spawn_invalidation_listener(self: &Arc<Self>) {
        let mut guard = self.listener.lock().expect("listener lock");
        if guard.is_some() {
            return;
        }

        let this = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let mut invalidations = self.provider.subscribe_invalidations();

        *guard = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = invalidations.recv() => match event {
                        Some(invalidation) => {
                            warn!(reason = %invalidation.reason, "identity invalidated, re-running bootstrap");
                            this.rebootstrap().await;
                        }
                        None => break,
                    },
                }
            }
        }));
    }
}
