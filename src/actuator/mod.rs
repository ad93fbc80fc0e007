//! Signal actuation
//!
//! - [`engine`] - Classification dispatch and output transitions
//! - [`confirmation`] - Current-value publishing
//!
//! [`ActuatorContext`] bundles the engine with the declared key-expression
//! and is owned by a single consumer task, so messages are handled one at a
//! time in delivery order.

pub mod confirmation;
pub mod engine;

pub use confirmation::ConfirmationPublisher;
pub use engine::{ActuationEngine, Outcome};

use crate::actuation_span;
use crate::output::OutputPin;
use crate::protocol::key_expr;
use crate::protocol::InboundMessage;
use crate::transport::{Publisher, Subscriber};
use tracing::{debug, info, Instrument};

pub struct ActuatorContext<O: OutputPin, P: Publisher> {
    key_expr: String,
    engine: ActuationEngine<O, P>,
    handled: u64,
}

impl<O: OutputPin, P: Publisher> ActuatorContext<O, P> {
    pub fn new(key_expr: impl Into<String>, engine: ActuationEngine<O, P>) -> Self {
        Self {
            key_expr: key_expr.into(),
            engine,
            handled: 0,
        }
    }

    pub fn key_expr(&self) -> &str {
        &self.key_expr
    }

    pub fn state(&self) -> bool {
        self.engine.state()
    }

    /// Number of messages processed, including dropped ones
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub async fn process(&mut self, message: &InboundMessage) -> Outcome {
        self.handled += 1;
        let span = actuation_span!(
            key_expr = %message.key_expr,
            kind = %message.kind(),
            seq = self.handled
        );

        async {
            info!(
                payload = %message.payload_lossy(),
                encoding = message.encoding_label(),
                timestamp = %message.timestamp_label(),
                "Received message"
            );
            if !key_expr::matches(&self.key_expr, &message.key_expr) {
                debug!(expected = %self.key_expr, "Message on unexpected key-expression dropped");
                return Outcome::OffTopic;
            }
            let outcome = self.engine.handle(message).await;
            debug!(?outcome, "Message handled");
            outcome
        }
        .instrument(span)
        .await
    }
}

/// Drain the subscriber until the session stops delivering
pub async fn run_consumer<O: OutputPin, P: Publisher>(
    mut context: ActuatorContext<O, P>,
    mut subscriber: Subscriber,
) -> ActuatorContext<O, P> {
    info!(key_expr = %subscriber.key_expr(), "Consumer started");
    while let Some(message) = subscriber.recv().await {
        context.process(&message).await;
    }
    info!(handled = context.handled(), "Subscriber closed, consumer stopping");
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DEFAULT_KEY_EXPR, TARGET_VALUE_TAG};
    use crate::testing::mocks::{MockOutputPin, MockPublisher};
    use tokio::sync::mpsc;

    fn context(publisher: &MockPublisher) -> ActuatorContext<MockOutputPin, MockPublisher> {
        let engine = ActuationEngine::new(
            MockOutputPin::new(),
            ConfirmationPublisher::new(publisher.clone()),
        )
        .unwrap();
        ActuatorContext::new(DEFAULT_KEY_EXPR, engine)
    }

    #[tokio::test]
    async fn test_off_topic_message_dropped() {
        let publisher = MockPublisher::default();
        let mut context = context(&publisher);

        let message = InboundMessage::new("Vehicle/Body/Lights/IsActive", "true")
            .with_attachment(TARGET_VALUE_TAG);
        assert_eq!(context.process(&message).await, Outcome::OffTopic);
        assert!(!context.state());
        assert_eq!(context.handled(), 1);
        assert!(publisher.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_consumer_processes_in_order() {
        let publisher = MockPublisher::default();
        let (tx, rx) = mpsc::channel(8);
        let subscriber = Subscriber::new(DEFAULT_KEY_EXPR, rx);

        for payload in ["true", "false", "true"] {
            let message =
                InboundMessage::new(DEFAULT_KEY_EXPR, payload).with_attachment(TARGET_VALUE_TAG);
            tx.send(message).await.unwrap();
        }
        drop(tx);

        let context = run_consumer(context(&publisher), subscriber).await;
        assert!(context.state());
        assert_eq!(context.handled(), 3);
        assert_eq!(
            publisher.get_published_payloads().await,
            vec!["true", "false", "true"]
        );
    }
}
