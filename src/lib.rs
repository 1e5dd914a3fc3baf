//! Mowerlink - Cloud-to-filesystem bridge for a robotic mower
//!
//! # Overview
//!
//! This crate bridges a vendor cloud service for robotic mowers to plain
//! local files:
//! - Certificate bootstrap against the vendor HTTP API (OAuth password
//!   grant, then a per-account PKCS#12 client certificate)
//! - Mutually authenticated MQTT session with reconnect-storm protection
//! - CSV telemetry log appended from decoded status messages
//! - File mailbox relaying operator commands onto the broker
//!
//! # Quick Start
//!
//! ```rust
//! use mowerlink::telemetry;
//!
//! let payload = br#"{
//!     "cfg": {"tm": "12:00", "dt": "01/01/2020"},
//!     "dat": {
//!         "ls": 1,
//!         "le": 0,
//!         "bt": {"t": 21.5, "v": 18.2, "p": 87, "c": true}
//!     }
//! }"#;
//!
//! let message = telemetry::decode(payload).unwrap();
//! assert_eq!(message.data.state_code, 1);
//! assert_eq!(message.data.battery.charge_percent, 87);
//!
//! let line = telemetry::recorder::format_line(&message);
//! assert_eq!(line, "12:00 01.01.2020;1;0;21,5;18,2;87;true;\n");
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod observability;
pub mod relay;
pub mod session;
pub mod telemetry;

pub use auth::{AuthClient, Bootstrap, BootstrapOrchestrator, ClientCertificate};
pub use config::{BridgeConfig, BridgePaths};
pub use error::{BridgeError, BridgeResult};
pub use session::BrokerSession;
