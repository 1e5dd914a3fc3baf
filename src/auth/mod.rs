//! Certificate-based bootstrap against the cloud web API.
//!
//! Two-step chain: exchange account credentials for a bearer token, then
//! exchange the token for a PKCS#12 client certificate. A cached
//! certificate on disk bypasses both steps ("fast connect").

mod bootstrap;
mod client;

pub use bootstrap::{
    initial_phase, Bootstrap, BootstrapOrchestrator, BootstrapPhase, ClientCertificate,
};
pub use client::{AuthClient, AuthError, AuthToken};
