//! Pub/sub transport boundary
//!
//! The provider needs four things from the bus: open a session, declare a
//! subscriber on one key-expression, declare a publisher on the same
//! key-expression, and put tagged payloads. These traits keep the actuation
//! logic independent of the concrete transport and make it testable with
//! the mocks in [`crate::testing`].

use crate::locator::LocatorError;
use crate::protocol::{InboundMessage, KeyExprError, OutboundMessage};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod mqtt;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Session open failed: {0}")]
    SessionOpenFailed(String),
    #[error("No connection acknowledgement within {0:?}")]
    ConnAckTimeout(Duration),
    #[error("Subscriber declaration on '{key_expr}' failed")]
    SubscriptionFailed {
        key_expr: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Publisher declaration on '{key_expr}' failed: {reason}")]
    PublisherDeclarationFailed { key_expr: String, reason: String },
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Not connected - session state: {0}")]
    NotConnected(String),
    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] LocatorError),
    #[error("Invalid key-expression: {0}")]
    InvalidKeyExpr(#[from] KeyExprError),
}

/// Publication endpoint bound to one key-expression
#[async_trait]
pub trait Publisher: Send + Sync {
    fn key_expr(&self) -> &str;

    /// Emit a message. Fire-and-forget: no delivery acknowledgement is awaited.
    async fn put(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// An open bus session
#[async_trait]
pub trait Session: Send + Sync {
    type Publisher: Publisher + 'static;

    async fn declare_subscriber(&mut self, key_expr: &str) -> Result<Subscriber, TransportError>;

    async fn declare_publisher(&self, key_expr: &str) -> Result<Self::Publisher, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Receiving end of a subscription.
///
/// Messages arrive in transport delivery order.
#[derive(Debug)]
pub struct Subscriber {
    key_expr: String,
    receiver: mpsc::Receiver<InboundMessage>,
}

impl Subscriber {
    pub fn new(key_expr: impl Into<String>, receiver: mpsc::Receiver<InboundMessage>) -> Self {
        Self {
            key_expr: key_expr.into(),
            receiver,
        }
    }

    pub fn key_expr(&self) -> &str {
        &self.key_expr
    }

    /// Next message, or `None` once the session has stopped delivering
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.receiver.recv().await
    }
}

/// Type alias for the MQTT session
pub type MqttTransport = mqtt::MqttSession;
