//! Broker session management.
//!
//! [`BrokerSession`] owns one mutually authenticated MQTT connection, one
//! subscription, the periodic command-drain timer and inbound decoding.
//! All events are serialized through a single loop, so counters and file
//! writes need no locking.

mod events;
mod state;
mod topics;

pub use state::{
    SessionAction, SessionEvent, SessionState, TerminationCause, RECONNECT_CEILING,
};
pub use topics::Topics;

use crate::auth::ClientCertificate;
use crate::config::{BridgeConfig, BridgePaths};
use crate::relay::CommandRelay;
use crate::telemetry::{self, TelemetryRecorder};
use events::EventRoute;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop, MqttOptions};
use rumqttc::{TlsConfiguration, Transport};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Cadence of the outbound command drain.
const DRAIN_PERIOD: Duration = Duration::from_secs(10);
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const EVENT_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("broker trust anchor unreadable at {path}: {source}")]
    TrustAnchor {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid broker endpoint: {0}")]
    Endpoint(#[from] crate::config::ConfigError),
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::v5::ClientError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("reconnect ceiling reached after {attempts} connection attempts without an inbound message")]
    ReconnectStorm { attempts: u32 },
}

impl From<TerminationCause> for SessionError {
    fn from(cause: TerminationCause) -> Self {
        match cause {
            TerminationCause::ReconnectStorm { attempts } => {
                SessionError::ReconnectStorm { attempts }
            }
            TerminationCause::TransportError(reason) => SessionError::Transport(reason),
        }
    }
}

/// Snapshot-then-decode step for one inbound publish.
///
/// Kept separate from the session so the snapshot contract holds without a
/// broker in the loop: every publish on the status topic overwrites the
/// snapshot file, decodable or not, and only a successful decode produces
/// a session event. Malformed telemetry is reported and skipped.
struct InboundPipeline {
    command_out: String,
    snapshot_path: PathBuf,
}

impl InboundPipeline {
    fn new(topics: &Topics, snapshot_path: PathBuf) -> Self {
        Self {
            command_out: topics.command_out(),
            snapshot_path,
        }
    }

    fn handle(&self, topic: &str, payload: &[u8]) -> Option<SessionEvent> {
        if topic != self.command_out {
            debug!(topic, "ignoring publish on unexpected topic");
            return None;
        }

        if let Err(e) = std::fs::write(&self.snapshot_path, payload) {
            warn!(error = %e, path = %self.snapshot_path.display(), "snapshot write failed");
        }

        match telemetry::decode(payload) {
            Ok(message) => Some(SessionEvent::Telemetry(message)),
            Err(e) => {
                warn!(error = %e, "malformed telemetry payload skipped");
                None
            }
        }
    }
}

pub struct BrokerSession {
    client: AsyncClient,
    event_loop: EventLoop,
    topics: Topics,
    recorder: TelemetryRecorder,
    relay: CommandRelay,
    inbound: InboundPipeline,
    state: SessionState,
    attempts: u32,
}

impl BrokerSession {
    /// Build the session from the active certificate. The connection is
    /// established lazily when [`run`](Self::run) first polls.
    pub fn connect(
        config: &BridgeConfig,
        certificate: &ClientCertificate,
        paths: &BridgePaths,
    ) -> Result<Self, SessionError> {
        let (host, port) = config.broker_endpoint()?;
        let client_id = format!("android-{}", config.client_uuid());

        let mut options = MqttOptions::new(client_id, &host, port);
        options.set_keep_alive(KEEP_ALIVE);

        let ca = std::fs::read(&paths.trust_anchor).map_err(|source| {
            SessionError::TrustAnchor {
                path: paths.trust_anchor.clone(),
                source,
            }
        })?;
        // The PKCS#12 archive is issued without a passphrase.
        options.set_transport(Transport::Tls(TlsConfiguration::SimpleNative {
            ca,
            client_auth: Some((certificate.as_der().to_vec(), String::new())),
        }));

        debug!(host, port, "broker session configured");
        let (client, event_loop) = AsyncClient::new(options, EVENT_CHANNEL_CAPACITY);

        let topics = Topics::new(config.broker.topic_prefix.clone());
        let inbound = InboundPipeline::new(&topics, paths.snapshot.clone());

        Ok(Self {
            client,
            event_loop,
            topics,
            recorder: TelemetryRecorder::new(paths.telemetry_log.clone()),
            relay: CommandRelay::new(paths.pending_command.clone()),
            inbound,
            state: SessionState::Disconnected,
            attempts: 0,
        })
    }

    /// Drive the session until it terminates.
    ///
    /// Inbound transport events and drain ticks are serialized through this
    /// single loop; handlers run to completion before the next event is
    /// dispatched.
    pub async fn run(mut self) -> Result<(), SessionError> {
        self.transition_to(SessionState::Connecting, 0);

        let mut drain = time::interval(DRAIN_PERIOD);
        drain.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The interval fires immediately on creation; swallow that tick so
        // the first drain happens one full period after connect.
        drain.tick().await;

        loop {
            let event = tokio::select! {
                polled = self.event_loop.poll() => match polled {
                    Ok(event) => self.route(&event),
                    Err(e) => Some(SessionEvent::TransportError(e.to_string())),
                },
                _ = drain.tick() => Some(SessionEvent::Tick),
            };

            let Some(event) = event else { continue };
            let errored = matches!(event, SessionEvent::TransportError(_));

            let transition = state::apply(&self.state, self.attempts, event);
            self.transition_to(transition.state, transition.attempts);
            for action in transition.actions {
                self.execute(action).await?;
            }

            if let SessionState::Terminated(cause) = &self.state {
                let cause = cause.clone();
                let _ = self.client.disconnect().await;
                return Err(cause.into());
            }

            // While the transport is cycling, polls fail fast; pace them.
            if errored {
                if let SessionState::Reconnecting(_) = self.state {
                    time::sleep(state::backoff_delay(self.attempts.max(1))).await;
                }
            }
        }
    }

    fn transition_to(&mut self, state: SessionState, attempts: u32) {
        if state != self.state {
            state::log_transition(&self.state, &state);
        }
        self.state = state;
        self.attempts = attempts;
    }

    fn route(&self, event: &rumqttc::v5::Event) -> Option<SessionEvent> {
        match events::route_event(event) {
            EventRoute::ConnAck => Some(SessionEvent::ConnAck),
            EventRoute::Inbound { topic, payload } => self.inbound.handle(&topic, &payload),
            EventRoute::Disconnected => Some(SessionEvent::Disconnected),
            EventRoute::Ignore => None,
        }
    }

    async fn execute(&mut self, action: SessionAction) -> Result<(), SessionError> {
        match action {
            SessionAction::EstablishSession => self.establish_session().await,
            SessionAction::Record(message) => {
                if let Err(e) = self.recorder.record(&message) {
                    // The session outlives a log write failure; the record
                    // for this message is lost.
                    warn!(error = %e, "telemetry record dropped");
                }
                Ok(())
            }
            SessionAction::DrainCommands => self.drain_commands().await,
            // Termination side effects run in the main loop, where the
            // session is torn down.
            SessionAction::Terminate(_) => Ok(()),
        }
    }

    /// Subscribe to the status channel and publish the presence handshake.
    async fn establish_session(&mut self) -> Result<(), SessionError> {
        let command_out = self.topics.command_out();
        self.client
            .subscribe(command_out.clone(), QoS::AtLeastOnce)
            .await?;
        debug!(topic = %command_out, "subscribed");

        let command_in = self.topics.command_in();
        self.client
            .publish(command_in.clone(), QoS::AtLeastOnce, false, b"{}".to_vec())
            .await?;
        debug!(topic = %command_in, "presence handshake published");
        Ok(())
    }

    /// One drain tick: relay a pending command if the mailbox holds one.
    ///
    /// At most once: the mailbox marker is cleared after the publish
    /// attempt even when publishing failed, so a command can be lost. That
    /// is the documented contract, not a bug.
    async fn drain_commands(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.relay.poll_mailbox() {
            warn!(error = %e, "pending-command mailbox unreadable");
            return Ok(());
        }

        while let Some(command) = self.relay.next() {
            let command_in = self.topics.command_in();
            let outcome = self
                .client
                .publish(command_in.clone(), QoS::AtLeastOnce, false, command.payload)
                .await;
            if let Err(e) = self.relay.clear_mailbox() {
                warn!(error = %e, "pending-command marker not removed");
            }
            match outcome {
                Ok(()) => debug!(topic = %command_in, "pending command relayed"),
                Err(e) => {
                    warn!(error = %e, "pending command lost: publish failed after marker removal");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerSection, CloudSection, DeviceSection};
    use crate::telemetry::sample_payload;

    const STATUS_TOPIC: &str = "DB510/AA/commandOut";

    fn pipeline(dir: &tempfile::TempDir) -> InboundPipeline {
        InboundPipeline::new(&Topics::new("DB510/AA"), dir.path().join("cmdOut.json"))
    }

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            device: DeviceSection {
                client_uuid: Some("f47ac10b-58cc-4372-a567-0e02b2c3d479".to_string()),
                email: "owner@example.com".to_string(),
                password: "hunter2".to_string(),
            },
            cloud: CloudSection {
                api_host: "api.example.com".to_string(),
                client_secret: "s3cret".to_string(),
            },
            broker: BrokerSection {
                host: "b.example".to_string(),
                topic_prefix: "DB510/AA".to_string(),
            },
        }
    }

    fn paths_in(dir: &tempfile::TempDir) -> BridgePaths {
        BridgePaths {
            certificate: dir.path().join("client.p12"),
            trust_anchor: dir.path().join("ca.pem"),
            pending_command: dir.path().join("cmdIn.json"),
            snapshot: dir.path().join("cmdOut.json"),
            telemetry_log: dir.path().join("telemetry.csv"),
        }
    }

    #[test]
    fn test_snapshot_overwritten_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        pipeline.handle(STATUS_TOPIC, sample_payload());
        pipeline.handle(STATUS_TOPIC, br#"{"second": true}"#);

        let snapshot = std::fs::read(dir.path().join("cmdOut.json")).unwrap();
        assert_eq!(snapshot, br#"{"second": true}"#);
    }

    #[test]
    fn test_snapshot_written_even_for_malformed_payload() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let event = pipeline.handle(STATUS_TOPIC, b"not json");

        assert!(event.is_none());
        let snapshot = std::fs::read(dir.path().join("cmdOut.json")).unwrap();
        assert_eq!(snapshot, b"not json");
    }

    #[test]
    fn test_decodable_payload_yields_telemetry_event() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let event = pipeline.handle(STATUS_TOPIC, sample_payload());
        assert!(matches!(event, Some(SessionEvent::Telemetry(_))));
    }

    #[test]
    fn test_unexpected_topic_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);

        let event = pipeline.handle("DB510/AA/commandIn", sample_payload());

        assert!(event.is_none());
        assert!(!dir.path().join("cmdOut.json").exists());
    }

    #[test]
    fn test_connect_builds_with_trust_anchor_and_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(&dir);
        std::fs::write(&paths.trust_anchor, b"-----BEGIN CERTIFICATE-----").unwrap();
        let certificate = ClientCertificate::from_der(vec![0xde, 0xad]);

        // The connection itself is lazy; construction only wires the
        // transport up.
        let session = BrokerSession::connect(&test_config(), &certificate, &paths);
        assert!(session.is_ok());
    }

    #[test]
    fn test_connect_requires_readable_trust_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(&dir);
        let certificate = ClientCertificate::from_der(vec![0xde, 0xad]);

        let result = BrokerSession::connect(&test_config(), &certificate, &paths);
        assert!(matches!(result, Err(SessionError::TrustAnchor { .. })));
    }
}
