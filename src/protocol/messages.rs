//! Inbound and outbound signal messages
//!
//! These are transport-neutral: the MQTT layer maps them onto publish
//! packets and their v5 properties.

use super::signal::{state_payload, SignalKind, CURRENT_VALUE_TAG, TARGET_VALUE_TAG};
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Encoding descriptor attached to every confirmation
pub const ENCODING_TEXT_UTF8: &str = "text/plain;charset=utf-8";

/// A message received on the subscribed key-expression.
///
/// Only lives for the duration of one handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub key_expr: String,
    pub payload: Bytes,
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl InboundMessage {
    pub fn new(key_expr: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            key_expr: key_expr.into(),
            payload: payload.into(),
            encoding: None,
            attachment: None,
            timestamp: None,
        }
    }

    pub fn with_attachment(mut self, attachment: impl Into<Bytes>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn kind(&self) -> SignalKind {
        SignalKind::classify(self.attachment.as_deref())
    }

    /// Payload as text for logging
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Encoding for logging, `none` when the sender set none
    pub fn encoding_label(&self) -> &str {
        self.encoding.as_deref().unwrap_or("none")
    }

    /// RFC 3339 timestamp for logging, `none` when absent
    pub fn timestamp_label(&self) -> String {
        self.timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "none".to_string())
    }
}

/// A confirmation of the actuator's current state
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub payload: Bytes,
    pub attachment: &'static str,
    pub encoding: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn current_value(value: bool) -> Self {
        Self::tagged(value, CURRENT_VALUE_TAG)
    }

    /// A command, as sent by a controller such as `send-command`
    pub fn target_value(value: bool) -> Self {
        Self::tagged(value, TARGET_VALUE_TAG)
    }

    fn tagged(value: bool, attachment: &'static str) -> Self {
        Self {
            payload: Bytes::from_static(state_payload(value).as_bytes()),
            attachment,
            encoding: ENCODING_TEXT_UTF8,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> SignalKind {
        SignalKind::classify(Some(self.attachment.as_bytes()))
    }
}
