//! Inbound telemetry payloads and their decoded form.
//!
//! The device publishes periodic status messages on `<prefix>/commandOut`;
//! this module models the subset the bridge records. Unknown fields are
//! ignored so firmware additions do not break decoding.

pub mod recorder;

pub use recorder::{RecorderError, TelemetryRecorder};

use serde::{Deserialize, Serialize};

/// One periodic status message from the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    #[serde(rename = "cfg")]
    pub clock: DeviceClock,
    #[serde(rename = "dat")]
    pub data: DeviceData,
}

/// Device-reported wall clock, as formatted by the firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClock {
    /// Time of day, e.g. "12:00"
    #[serde(rename = "tm")]
    pub time: String,
    /// Date with '/' separators, e.g. "01/01/2020"
    #[serde(rename = "dt")]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceData {
    /// Mower state code
    #[serde(rename = "ls")]
    pub state_code: i64,
    /// Last error code, 0 when none
    #[serde(rename = "le")]
    pub error_code: i64,
    #[serde(rename = "bt")]
    pub battery: BatteryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Temperature in °C
    #[serde(rename = "t")]
    pub temperature: f64,
    /// Voltage in V
    #[serde(rename = "v")]
    pub voltage: f64,
    /// Charge percentage
    #[serde(rename = "p")]
    pub charge_percent: i64,
    /// Charging flag
    #[serde(rename = "c")]
    pub charging: bool,
}

/// Decode one raw broker payload into a [`TelemetryMessage`].
///
/// Malformed input is an error for the caller to report and skip; it must
/// never take the session down.
pub fn decode(payload: &[u8]) -> Result<TelemetryMessage, RecorderError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
pub(crate) fn sample_message() -> TelemetryMessage {
    decode(sample_payload()).unwrap()
}

#[cfg(test)]
pub(crate) fn sample_payload() -> &'static [u8] {
    br#"{"cfg":{"tm":"12:00","dt":"01/01/2020"},"dat":{"ls":1,"le":0,"bt":{"t":21.5,"v":18.2,"p":87,"c":true}}}"#
}
