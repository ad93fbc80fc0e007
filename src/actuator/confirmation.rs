//! Current-value confirmations

use crate::protocol::OutboundMessage;
use crate::transport::Publisher;
use tracing::{debug, warn};

/// Publishes the actuator's state on the declared key-expression.
///
/// Fire-and-forget: transport failures are logged and never retried.
pub struct ConfirmationPublisher<P: Publisher> {
    publisher: P,
}

impl<P: Publisher> ConfirmationPublisher<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    pub fn key_expr(&self) -> &str {
        self.publisher.key_expr()
    }

    /// Publish `value` tagged as current value. Returns whether the
    /// message was handed to the transport.
    pub async fn publish(&self, value: bool) -> bool {
        let message = OutboundMessage::current_value(value);
        match self.publisher.put(message).await {
            Ok(()) => {
                debug!(key_expr = %self.key_expr(), value, "Published current value");
                true
            }
            Err(e) => {
                warn!(
                    key_expr = %self.key_expr(),
                    value,
                    error = %e,
                    "Failed to publish current value"
                );
                false
            }
        }
    }
}
