//! Bootstrap orchestration: stored credentials in, working certificate out.
//!
//! Phases run `Idle → NeedToken → NeedCertificate → Ready`, with a shortcut
//! `Idle → Ready` when a persisted certificate exists and no diagnostic
//! inspection was requested. HTTP failures at any step are not retried;
//! they surface to the operator.

use super::{AuthClient, AuthError};
use crate::config::BridgeConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bootstrap phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Idle,
    NeedToken,
    NeedCertificate,
    Ready,
}

/// Decide the transition out of `Idle` from the persisted state.
///
/// The cached certificate is trusted on presence alone; no expiry check is
/// performed. An inspect request always runs the token step, even with a
/// cached certificate, because the diagnostic fetch needs a bearer token.
pub fn initial_phase(certificate_cached: bool, inspect_requested: bool) -> BootstrapPhase {
    if inspect_requested {
        BootstrapPhase::NeedToken
    } else if certificate_cached {
        BootstrapPhase::Ready
    } else {
        BootstrapPhase::NeedToken
    }
}

/// Opaque PKCS#12 credential used to mutually authenticate the broker
/// connection.
#[derive(Clone)]
pub struct ClientCertificate(Vec<u8>);

impl ClientCertificate {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientCertificate(<{} bytes>)", self.0.len())
    }
}

/// Outcome of one bootstrap run.
#[derive(Debug)]
pub enum Bootstrap {
    /// Certificate in hand; the broker session may start.
    Ready(ClientCertificate),
    /// Diagnostic inspection performed instead of connecting.
    Inspected(serde_json::Value),
}

pub struct BootstrapOrchestrator<'a> {
    client: AuthClient,
    config: &'a BridgeConfig,
    certificate_path: PathBuf,
}

impl<'a> BootstrapOrchestrator<'a> {
    pub fn new(config: &'a BridgeConfig, certificate_path: PathBuf) -> Result<Self, AuthError> {
        let client = AuthClient::new(&config.cloud.api_host)?;
        Ok(Self {
            client,
            config,
            certificate_path,
        })
    }

    /// Orchestrator over an explicit client; integration tests use this
    /// with a client pointed at a mock server.
    pub fn with_client(
        client: AuthClient,
        config: &'a BridgeConfig,
        certificate_path: PathBuf,
    ) -> Self {
        Self {
            client,
            config,
            certificate_path,
        }
    }

    /// Run the bootstrap chain. Issues at most one token request and one
    /// certificate request; the fast path issues none.
    pub async fn run(&self, inspect: Option<&str>) -> Result<Bootstrap, AuthError> {
        let mut phase = initial_phase(self.certificate_path.exists(), inspect.is_some());
        debug!(?phase, "bootstrap starting");

        if phase == BootstrapPhase::Ready {
            info!(path = %self.certificate_path.display(), "certificate cached, fast connect");
            let der = std::fs::read(&self.certificate_path)?;
            return Ok(Bootstrap::Ready(ClientCertificate::from_der(der)));
        }

        let token = self
            .client
            .retrieve_token(
                &self.config.device.email,
                &self.config.device.password,
                &self.config.cloud.client_secret,
            )
            .await?;

        if let Some(path) = inspect {
            // Diagnostic side-path: one fetch, no broker connection.
            let data = self.client.inspect(&token, path).await?;
            return Ok(Bootstrap::Inspected(data));
        }

        phase = BootstrapPhase::NeedCertificate;
        debug!(?phase, "token retrieved");

        let der = self.client.retrieve_certificate(&token).await?;
        persist_certificate(&self.certificate_path, &der)?;
        info!(path = %self.certificate_path.display(), "client certificate retrieved and persisted");
        Ok(Bootstrap::Ready(ClientCertificate::from_der(der)))
    }
}

/// Persist the certificate so future cold starts can fast-connect.
fn persist_certificate(path: &Path, der: &[u8]) -> Result<(), AuthError> {
    std::fs::write(path, der)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_path_requires_cached_certificate_and_no_inspect() {
        assert_eq!(initial_phase(true, false), BootstrapPhase::Ready);
    }

    #[test]
    fn test_cold_start_needs_token() {
        assert_eq!(initial_phase(false, false), BootstrapPhase::NeedToken);
    }

    #[test]
    fn test_inspect_overrides_fast_path() {
        assert_eq!(initial_phase(true, true), BootstrapPhase::NeedToken);
        assert_eq!(initial_phase(false, true), BootstrapPhase::NeedToken);
    }

    #[test]
    fn test_certificate_debug_hides_contents() {
        let certificate = ClientCertificate::from_der(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(format!("{certificate:?}"), "ClientCertificate(<4 bytes>)");
    }
}
