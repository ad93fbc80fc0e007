//! Pure mapping between MQTT v5 packets and signal messages
//!
//! The out-of-band attachment travels as the user property `attachment`,
//! the encoding as the v5 content type, and the optional sample timestamp
//! as the user property `timestamp` in RFC 3339 form.

use crate::protocol::{InboundMessage, OutboundMessage};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rumqttc::v5::mqttbytes::v5::{Packet, Publish, PublishProperties};
use rumqttc::v5::Event;
use tracing::debug;

pub const ATTACHMENT_PROPERTY: &str = "attachment";
pub const TIMESTAMP_PROPERTY: &str = "timestamp";

/// Pure routing decisions for MQTT events
pub struct MessageHandler;

impl MessageHandler {
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => {
                    EventRoute::MessageReceived(Self::inbound_from_publish(publish))
                }
                Packet::Disconnect(_) => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    summary: format!("{:?}", suback.return_codes),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    pub fn inbound_from_publish(publish: &Publish) -> InboundMessage {
        let key_expr = String::from_utf8_lossy(&publish.topic).into_owned();
        let mut message = InboundMessage::new(key_expr, publish.payload.clone());

        if let Some(properties) = &publish.properties {
            message.encoding = properties.content_type.clone();
            message.attachment = user_property(properties, ATTACHMENT_PROPERTY)
                .map(|value| Bytes::copy_from_slice(value.as_bytes()));
            message.timestamp =
                user_property(properties, TIMESTAMP_PROPERTY).and_then(parse_timestamp);
        }

        message
    }

    pub fn publish_properties(message: &OutboundMessage) -> PublishProperties {
        PublishProperties {
            content_type: Some(message.encoding.to_string()),
            user_properties: vec![
                (ATTACHMENT_PROPERTY.to_string(), message.attachment.to_string()),
                (TIMESTAMP_PROPERTY.to_string(), message.timestamp.to_rfc3339()),
            ],
            ..Default::default()
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    ConnectionAcknowledged,
    MessageReceived(InboundMessage),
    Disconnected,
    SubscriptionConfirmed { packet_id: u16, summary: String },
    /// PingResp, PubAck and the like
    InfrastructureEvent(String),
    OutgoingEvent,
}

fn user_property<'a>(properties: &'a PublishProperties, key: &str) -> Option<&'a str> {
    properties
        .user_properties
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
        Err(e) => {
            debug!(value, error = %e, "Ignoring unparseable timestamp property");
            None
        }
    }
}
