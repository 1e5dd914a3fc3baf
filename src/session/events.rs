//! Pure routing of transport events onto the session state machine.

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::Event;

/// What the session loop should do with one transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// Broker acknowledged a connection.
    ConnAck,
    /// Inbound publish on some topic.
    Inbound { topic: String, payload: Vec<u8> },
    /// Broker closed the connection.
    Disconnected,
    /// Infrastructure traffic (acks, pings, outgoing packets).
    Ignore,
}

pub fn route_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => EventRoute::ConnAck,
        Event::Incoming(Packet::Publish(publish)) => EventRoute::Inbound {
            topic: String::from_utf8_lossy(&publish.topic).to_string(),
            payload: publish.payload.to_vec(),
        },
        Event::Incoming(Packet::Disconnect(_)) => EventRoute::Disconnected,
        Event::Incoming(_) => EventRoute::Ignore,
        Event::Outgoing(_) => EventRoute::Ignore,
    }
}
