//! Append-only CSV log of decoded telemetry.
//!
//! Each write is a scoped open-append-close; no file handle is held across
//! events. The log is never rewritten or deduplicated.

use super::TelemetryMessage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Header line, emitted exactly once when the log file does not yet exist.
const HEADER: &str = "datetime;state;error;temp;volt;perc;charge;\n";

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("telemetry log write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Stateless transform from a decoded telemetry message to one CSV record.
pub struct TelemetryRecorder {
    path: PathBuf,
}

impl TelemetryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append exactly one line for `message`, writing the header first if
    /// the destination log does not yet exist.
    pub fn record(&self, message: &TelemetryMessage) -> Result<(), RecorderError> {
        let fresh = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if fresh {
            file.write_all(HEADER.as_bytes())?;
        }
        file.write_all(format_line(message).as_bytes())?;
        debug!(path = %self.path.display(), "telemetry record appended");
        Ok(())
    }
}

/// Render one CSV line in the fixed field order.
///
/// Fractional fields use a decimal comma for the regional consumer of this
/// log; integer and boolean fields are left untouched.
pub fn format_line(message: &TelemetryMessage) -> String {
    format!(
        "{} {};{};{};{};{};{};{};\n",
        message.clock.time,
        message.clock.date.replace('/', "."),
        message.data.state_code,
        message.data.error_code,
        decimal_comma(message.data.battery.temperature),
        decimal_comma(message.data.battery.voltage),
        message.data.battery.charge_percent,
        message.data.battery.charging,
    )
}

fn decimal_comma(value: f64) -> String {
    value.to_string().replace('.', ",")
}
