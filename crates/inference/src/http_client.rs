//! HTTP Client Factory
//!
//! Builds the shared `reqwest::Client` used by the inference client. No
//! per-request timeout is set here; the transport's own defaults apply.

/// Build a `reqwest::Client` for the inference service.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .expect("failed to build reqwest client")
}
