//! Pure state machine for the broker session.
//!
//! Transitions are pure functions of (state, attempt counter, event);
//! side effects come back as [`SessionAction`]s for the session loop to
//! execute. This keeps the reconnect-counting and termination rules
//! testable without a broker.

use crate::telemetry::TelemetryMessage;
use std::time::Duration;
use tracing::{error, info, warn};

/// Number of connection-established events tolerated without an
/// intervening inbound message before the session gives up.
pub const RECONNECT_CEILING: u32 = 9;

/// Delay pattern applied between transport reconnect polls.
const BACKOFF_PATTERN_MS: [u64; 4] = [250, 500, 1000, 2000];
const SUSTAINED_BACKOFF_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Transport dropped; the event loop is cycling back toward ConnAck.
    Reconnecting(u32),
    Terminated(TerminationCause),
}

/// Why a session ended. A reconnect storm must stay distinguishable from a
/// plain transport error so operators can tell "gave up" from "one bad
/// error".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCause {
    /// Reconnect ceiling reached without a liveness signal.
    ReconnectStorm { attempts: u32 },
    /// Transport-level error; recovery is external process supervision.
    TransportError(String),
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Broker acknowledged a connection.
    ConnAck,
    /// Successfully decoded inbound telemetry (the liveness signal).
    Telemetry(TelemetryMessage),
    /// Broker closed the connection without a transport error.
    Disconnected,
    /// Transport-level failure from the event loop.
    TransportError(String),
    /// Periodic command-drain tick.
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Subscribe to commandOut and publish the `{}` presence handshake.
    EstablishSession,
    /// Record the decoded telemetry message.
    Record(TelemetryMessage),
    /// Check the pending-command mailbox and publish if present.
    DrainCommands,
    /// Tear the session down.
    Terminate(TerminationCause),
}

/// Result of applying one event.
#[derive(Debug)]
pub struct Transition {
    pub state: SessionState,
    pub attempts: u32,
    pub actions: Vec<SessionAction>,
}

impl Transition {
    fn new(state: SessionState, attempts: u32, actions: Vec<SessionAction>) -> Self {
        Self {
            state,
            attempts,
            actions,
        }
    }

    fn stay(state: &SessionState, attempts: u32) -> Self {
        Self::new(state.clone(), attempts, Vec::new())
    }
}

/// Apply one event to the session.
///
/// `attempts` counts connection-established events since the last decoded
/// inbound message.
pub fn apply(state: &SessionState, attempts: u32, event: SessionEvent) -> Transition {
    if let SessionState::Terminated(_) = state {
        // Terminal: no event revives the session.
        return Transition::stay(state, attempts);
    }

    match event {
        SessionEvent::ConnAck => on_connack(attempts),
        SessionEvent::Telemetry(message) => Transition::new(
            SessionState::Connected,
            0,
            vec![SessionAction::Record(message)],
        ),
        SessionEvent::Disconnected => {
            Transition::new(SessionState::Reconnecting(attempts), attempts, Vec::new())
        }
        SessionEvent::TransportError(reason) => on_transport_error(state, attempts, reason),
        SessionEvent::Tick => on_tick(state, attempts),
    }
}

fn on_connack(attempts: u32) -> Transition {
    let count = attempts + 1;
    if count >= RECONNECT_CEILING {
        let cause = TerminationCause::ReconnectStorm { attempts: count };
        return Transition::new(
            SessionState::Terminated(cause.clone()),
            count,
            vec![SessionAction::Terminate(cause)],
        );
    }
    // The handshake re-runs on every accepted connection; a reconnected
    // transport has lost its subscription.
    Transition::new(
        SessionState::Connected,
        count,
        vec![SessionAction::EstablishSession],
    )
}

fn on_transport_error(state: &SessionState, attempts: u32, reason: String) -> Transition {
    if let SessionState::Reconnecting(_) = state {
        // Part of the transport's own reconnect cycle; the next ConnAck
        // (counted) or the ceiling resolves it.
        return Transition::stay(state, attempts);
    }
    let cause = TerminationCause::TransportError(reason);
    Transition::new(
        SessionState::Terminated(cause.clone()),
        attempts,
        vec![SessionAction::Terminate(cause)],
    )
}

fn on_tick(state: &SessionState, attempts: u32) -> Transition {
    match state {
        SessionState::Connected => Transition::new(
            SessionState::Connected,
            attempts,
            vec![SessionAction::DrainCommands],
        ),
        _ => Transition::stay(state, attempts),
    }
}

/// Delay before re-polling the transport while it is reconnecting.
pub fn backoff_delay(attempt: u32) -> Duration {
    let index = attempt.saturating_sub(1) as usize;
    let millis = BACKOFF_PATTERN_MS
        .get(index)
        .copied()
        .unwrap_or(SUSTAINED_BACKOFF_MS);
    Duration::from_millis(millis)
}

/// Log a state transition at the severity it deserves.
pub fn log_transition(from: &SessionState, to: &SessionState) {
    match (from, to) {
        (SessionState::Connecting, SessionState::Connected) => {
            info!("broker connected");
        }
        (SessionState::Reconnecting(_), SessionState::Connected) => {
            warn!("broker reconnected without an inbound message");
        }
        (_, SessionState::Reconnecting(attempts)) => {
            warn!(attempts, "broker connection lost, transport reconnecting");
        }
        (_, SessionState::Terminated(TerminationCause::ReconnectStorm { attempts })) => {
            error!(
                attempts,
                ceiling = RECONNECT_CEILING,
                "reconnect ceiling reached, giving up"
            );
        }
        (_, SessionState::Terminated(TerminationCause::TransportError(reason))) => {
            error!(%reason, "transport error, terminating session");
        }
        _ => {}
    }
}
