//! Shared test collaborators: a scriptable identity provider, a canned
//! inference payload, and a minimal scripted HTTP server for transport tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use faunalens::services::identity::{
    AuthError, Credential, Identity, IdentityProvider, Invalidation,
};
use faunalens_inference::{AnalysisPayload, Classification};

/// Identity provider scripted per path: `Some(identity)` succeeds with that
/// identity, `None` fails the path.
pub struct ScriptedIdentityProvider {
    token_identity: Option<String>,
    anonymous_identity: Option<String>,
    pub exchange_calls: AtomicUsize,
    pub anonymous_calls: AtomicUsize,
}

impl ScriptedIdentityProvider {
    pub fn new(token_identity: Option<&str>, anonymous_identity: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            token_identity: token_identity.map(str::to_string),
            anonymous_identity: anonymous_identity.map(str::to_string),
            exchange_calls: AtomicUsize::new(0),
            anonymous_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    async fn exchange_token(&self, _token: &str) -> Result<Credential, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        match &self.token_identity {
            Some(identity) => Ok(Credential {
                identity: Identity::new(identity.clone()),
                is_anonymous: false,
            }),
            None => Err(AuthError::Provider("credential token expired".to_string())),
        }
    }

    async fn create_anonymous(&self) -> Result<Credential, AuthError> {
        self.anonymous_calls.fetch_add(1, Ordering::SeqCst);
        match &self.anonymous_identity {
            Some(identity) => Ok(Credential {
                identity: Identity::new(identity.clone()),
                is_anonymous: true,
            }),
            None => Err(AuthError::Provider(
                "anonymous sign-in unavailable".to_string(),
            )),
        }
    }

    fn subscribe_invalidations(&self) -> mpsc::Receiver<Invalidation> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

/// The payload every stubbed success response carries.
pub fn sample_payload() -> AnalysisPayload {
    AnalysisPayload {
        scientific_name: "Cyanocitta cristata".to_string(),
        common_name: "Blue jay".to_string(),
        summary: "A noisy corvid of eastern North America.".to_string(),
        classification: Classification {
            order: Some("Passeriformes".to_string()),
            family: Some("Corvidae".to_string()),
            class: Some("Aves".to_string()),
        },
        ecological_role: "Seed disperser and nest predator.".to_string(),
    }
}

/// A valid inference response body wrapping `sample_payload`.
pub fn valid_response_body() -> String {
    let payload_text = serde_json::to_string(&sample_payload()).unwrap();
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": payload_text}]}}]
    })
    .to_string()
}

/// Scripted HTTP stub server. Serves the given (status, body) responses in
/// order, one per connection, then keeps answering HTTP 500.
pub struct StubServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub async fn spawn(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            let mut responses = responses.into_iter();
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses
                    .next()
                    .unwrap_or((500, "{\"error\": \"exhausted\"}".to_string()));

                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, hits }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Read one full HTTP request (headers plus content-length body).
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]);
        let content_length = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}
