//! Structured logging for the bridge.

pub mod logging;

pub use logging::{init_cli_logging, init_default_logging, init_logging, LogFormat};
