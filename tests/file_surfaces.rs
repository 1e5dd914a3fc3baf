//! Integration tests for the bridge's on-disk surfaces
//!
//! The CSV telemetry log and the command mailbox are contracts with
//! external tools; these tests pin their exact byte-level behavior.

use mowerlink::relay::CommandRelay;
use mowerlink::telemetry::{self, TelemetryRecorder};

const SAMPLE_PAYLOAD: &[u8] = br#"{
    "cfg": {"tm": "12:00", "dt": "01/01/2020"},
    "dat": {
        "ls": 1,
        "le": 0,
        "bt": {"t": 21.5, "v": 18.2, "p": 87, "c": true}
    }
}"#;

const SAMPLE_LINE: &str = "12:00 01.01.2020;1;0;21,5;18,2;87;true;\n";
const HEADER: &str = "datetime;state;error;temp;volt;perc;charge;\n";

#[test]
fn test_csv_log_accumulates_with_single_header() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("telemetry.csv");
    let recorder = TelemetryRecorder::new(log_path.clone());

    let message = telemetry::decode(SAMPLE_PAYLOAD).unwrap();
    recorder.record(&message).unwrap();
    recorder.record(&message).unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(content, format!("{HEADER}{SAMPLE_LINE}{SAMPLE_LINE}"));
}

#[test]
fn test_csv_log_preserves_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("telemetry.csv");
    std::fs::write(&log_path, format!("{HEADER}old line\n")).unwrap();

    let recorder = TelemetryRecorder::new(log_path.clone());
    let message = telemetry::decode(SAMPLE_PAYLOAD).unwrap();
    recorder.record(&message).unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(content, format!("{HEADER}old line\n{SAMPLE_LINE}"));
    assert_eq!(content.matches("datetime;").count(), 1);
}

#[test]
fn test_mailbox_drains_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = dir.path().join("cmdIn.json");
    std::fs::write(&mailbox, br#"{"cmd":1}"#).unwrap();

    let mut relay = CommandRelay::new(mailbox.clone());
    relay.poll_mailbox().unwrap();
    let command = relay.next().unwrap();
    assert_eq!(command.payload, br#"{"cmd":1}"#);

    // The marker is removed after the publish attempt regardless of its
    // outcome; nothing remains to drain.
    relay.clear_mailbox().unwrap();
    assert!(!mailbox.exists());

    relay.poll_mailbox().unwrap();
    assert!(relay.next().is_none());
}

#[test]
fn test_malformed_telemetry_is_rejected_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("telemetry.csv");
    let _recorder = TelemetryRecorder::new(log_path.clone());

    assert!(telemetry::decode(b"not json").is_err());
    assert!(telemetry::decode(br#"{"cfg": {}}"#).is_err());
    // Nothing decodable, nothing written; the log is created on first
    // successful record only.
    assert!(!log_path.exists());
}
