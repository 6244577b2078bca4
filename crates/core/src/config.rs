//! Application Configuration
//!
//! Explicit configuration for the orchestration core. The host process builds
//! an `AppConfig` once at startup and passes it at construction time —
//! credentials and endpoints are injected, never read from the environment or
//! from disk by this core.

use serde::{Deserialize, Serialize};

/// Default inference service endpoint.
pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default inference model.
pub const DEFAULT_INFERENCE_MODEL: &str = "gemini-2.5-flash";

/// Default number of inference attempts (initial call + retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for the exponential retry backoff, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Default upper bound on accepted image payloads, in bytes (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Default application namespace for the document store partition.
pub const DEFAULT_STORE_NAMESPACE: &str = "faunalens";

/// Default history collection name within an identity partition.
pub const DEFAULT_STORE_COLLECTION: &str = "analyses";

/// Inference client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Inference service base URL
    pub base_url: String,
    /// API key for the inference service (injected by the host)
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Total attempts per analysis request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for the exponential backoff between attempts
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Maximum accepted image size in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_INFERENCE_MODEL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Document store partition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Per-application namespace (first path segment)
    pub namespace: String,
    /// Fixed collection name within each identity partition
    pub collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_STORE_NAMESPACE.to_string(),
            collection: DEFAULT_STORE_COLLECTION.to_string(),
        }
    }
}

/// Identity bootstrap settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Previously-issued credential token, if the host holds one.
    /// Absent or rejected tokens fall back to anonymous identity creation.
    pub credential_token: Option<String>,
}

/// Top-level application configuration, resolved once at process start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub inference: InferenceSettings,
    pub store: StoreSettings,
    pub identity: IdentitySettings,
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub inference_base_url: Option<String>,
    pub inference_api_key: Option<String>,
    pub inference_model: Option<String>,
    pub backoff_base_ms: Option<u64>,
    pub credential_token: Option<String>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(base_url) = update.inference_base_url {
            self.inference.base_url = base_url;
        }
        if let Some(api_key) = update.inference_api_key {
            self.inference.api_key = Some(api_key);
        }
        if let Some(model) = update.inference_model {
            self.inference.model = model;
        }
        if let Some(backoff) = update.backoff_base_ms {
            self.inference.backoff_base_ms = backoff;
        }
        if let Some(token) = update.credential_token {
            self.identity.credential_token = Some(token);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.inference.base_url.trim().is_empty() {
            return Err("inference base_url must not be empty".to_string());
        }
        if self.inference.model.trim().is_empty() {
            return Err("inference model must not be empty".to_string());
        }
        if self.inference.max_attempts == 0 {
            return Err("inference max_attempts must be at least 1".to_string());
        }
        if self.inference.max_image_bytes == 0 {
            return Err("inference max_image_bytes must be positive".to_string());
        }
        if self.store.namespace.trim().is_empty() {
            return Err("store namespace must not be empty".to_string());
        }
        if self.store.collection.trim().is_empty() {
            return Err("store collection must not be empty".to_string());
        }
        Ok(())
    }
}
