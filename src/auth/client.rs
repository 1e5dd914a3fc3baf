//! HTTP client for the cloud bootstrap API.
//!
//! Pure request/response; no retry logic of its own. Failures propagate to
//! the orchestrator, which surfaces them to the operator.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer token returned by the `oauth/token` exchange.
///
/// Valid only for the lifetime of the current bootstrap attempt; never
/// persisted.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub value: String,
    pub scheme: String,
}

impl AuthToken {
    /// `Authorization` header value: `<scheme> <value>`.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.scheme, self.value)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("web API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
    #[error("certificate payload is not valid base64: {0}")]
    CertificateDecode(#[from] base64::DecodeError),
    #[error("certificate store I/O failed: {0}")]
    CertificateStore(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
    grant_type: &'a str,
    client_id: u32,
    client_secret: &'a str,
    scope: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

#[derive(Debug, Deserialize)]
struct CertificateResponse {
    pkcs12: String,
}

/// Client for the two-step bootstrap plus ad-hoc diagnostic fetches.
pub struct AuthClient {
    http: Client,
    base_url: String,
}

impl AuthClient {
    /// Client against `https://<api_host>/api/v2`.
    pub fn new(api_host: &str) -> Result<Self, AuthError> {
        Self::with_base_url(format!("https://{api_host}/api/v2"))
    }

    /// Client against an explicit base URL. Integration tests use this to
    /// point at a local mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// `POST oauth/token`: exchange account credentials for a bearer token.
    pub async fn retrieve_token(
        &self,
        email: &str,
        password: &str,
        client_secret: &str,
    ) -> Result<AuthToken, AuthError> {
        let request = TokenRequest {
            username: email,
            password,
            grant_type: "password",
            client_id: 1,
            client_secret,
            scope: "*",
        };

        let response = self
            .http
            .post(format!("{}/oauth/token", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::UnexpectedShape(e.to_string()))?;
        debug!(scheme = %token.token_type, "bearer token retrieved");
        Ok(AuthToken {
            value: token.access_token,
            scheme: token.token_type,
        })
    }

    /// `GET users/certificate`: exchange the bearer token for the PKCS#12
    /// client certificate, returned decoded.
    pub async fn retrieve_certificate(&self, token: &AuthToken) -> Result<Vec<u8>, AuthError> {
        let response = self
            .http
            .get(format!("{}/users/certificate", self.base_url))
            .header(reqwest::header::AUTHORIZATION, token.authorization())
            .send()
            .await?;
        let response = check_status(response).await?;

        let certificate: CertificateResponse = response
            .json()
            .await
            .map_err(|e| AuthError::UnexpectedShape(e.to_string()))?;
        Ok(STANDARD.decode(certificate.pkcs12.as_bytes())?)
    }

    /// Ad-hoc diagnostic `GET <path>` (the `-w` flag): `users/me`,
    /// `product-items`, `boards`, ...
    pub async fn inspect(
        &self,
        token: &AuthToken,
        path: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let response = self
            .http
            .get(format!("{}/{path}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, token.authorization())
            .send()
            .await?;
        let response = check_status(response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::UnexpectedShape(e.to_string()))?;
        log_inspection_hints(path, &data);
        Ok(data)
    }
}

/// Known inspection paths carry connection settings worth calling out.
fn log_inspection_hints(path: &str, data: &serde_json::Value) {
    if path == "users/me" {
        if let Some(endpoint) = data.get("mqtt_endpoint").and_then(|v| v.as_str()) {
            info!(broker = endpoint, "broker endpoint reported by the web API");
        }
    }
    if path == "product-items" {
        let first = data.get(0);
        if let Some(serial) = first
            .and_then(|item| item.get("serial_number"))
            .and_then(|v| v.as_str())
        {
            info!(serial, "device serial number");
        }
        if let Some(command_in) = first
            .and_then(|item| item.get("mqtt_topics"))
            .and_then(|topics| topics.get("command_in"))
            .and_then(|v| v.as_str())
        {
            let prefix = command_in.trim_end_matches("/commandIn");
            info!(topic_prefix = prefix, "device topic prefix");
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Api { status, body });
    }
    Ok(response)
}
