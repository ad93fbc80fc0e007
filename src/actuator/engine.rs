//! Actuation engine
//!
//! Turns classified messages into output transitions. A recognised command
//! sets the state, drives the output and then publishes the confirmation,
//! strictly in that order.

use super::confirmation::ConfirmationPublisher;
use crate::output::{OutputError, OutputPin};
use crate::protocol::{parse_command, InboundMessage, SignalKind};
use crate::transport::Publisher;
use tracing::{debug, info, warn};

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Topic does not equal the declared key-expression
    OffTopic,
    /// Not a command: current-value echo or unknown tag
    Ignored(SignalKind),
    /// Command payload was neither `true` nor `false`
    Rejected,
    /// Output driver refused the level; state unchanged, nothing published
    OutputFailed,
    Actuated { value: bool, confirmed: bool },
}

pub struct ActuationEngine<O: OutputPin, P: Publisher> {
    output: O,
    confirmation: ConfirmationPublisher<P>,
    state: bool,
}

impl<O: OutputPin, P: Publisher> ActuationEngine<O, P> {
    /// Create the engine and drive the output low
    pub fn new(mut output: O, confirmation: ConfirmationPublisher<P>) -> Result<Self, OutputError> {
        output.set_level(false)?;
        Ok(Self {
            output,
            confirmation,
            state: false,
        })
    }

    /// Last state successfully driven to the output
    pub fn state(&self) -> bool {
        self.state
    }

    pub fn key_expr(&self) -> &str {
        self.confirmation.key_expr()
    }

    /// Classify and dispatch one message
    pub async fn handle(&mut self, message: &InboundMessage) -> Outcome {
        match message.kind() {
            SignalKind::TargetValue => self.on_command(&message.payload).await,
            SignalKind::CurrentValue => {
                debug!(payload = %message.payload_lossy(), "Ignoring current value echo");
                Outcome::Ignored(SignalKind::CurrentValue)
            }
            SignalKind::Unknown => {
                let attachment = message
                    .attachment
                    .as_ref()
                    .map(|a| String::from_utf8_lossy(a).into_owned());
                info!(?attachment, "Unknown signal type, message dropped");
                Outcome::Ignored(SignalKind::Unknown)
            }
        }
    }

    /// Apply a target-value command
    pub async fn on_command(&mut self, payload: &[u8]) -> Outcome {
        let Some(value) = parse_command(payload) else {
            warn!(
                payload = %String::from_utf8_lossy(payload),
                "Unknown command payload, message dropped"
            );
            return Outcome::Rejected;
        };

        if let Err(e) = self.output.set_level(value) {
            warn!(value, error = %e, "Failed to drive output");
            return Outcome::OutputFailed;
        }
        self.state = value;
        info!(value, "Actuator set");

        let confirmed = self.confirmation.publish(value).await;
        Outcome::Actuated { value, confirmed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CURRENT_VALUE_TAG, DEFAULT_KEY_EXPR, TARGET_VALUE_TAG};
    use crate::testing::mocks::{MockOutputPin, MockPublisher};

    fn engine(
        pin: &MockOutputPin,
        publisher: &MockPublisher,
    ) -> ActuationEngine<MockOutputPin, MockPublisher> {
        ActuationEngine::new(pin.clone(), ConfirmationPublisher::new(publisher.clone())).unwrap()
    }

    fn target(payload: &'static str) -> InboundMessage {
        InboundMessage::new(DEFAULT_KEY_EXPR, payload).with_attachment(TARGET_VALUE_TAG)
    }

    #[tokio::test]
    async fn test_new_drives_output_low() {
        let pin = MockOutputPin::new();
        let engine = engine(&pin, &MockPublisher::default());
        assert!(!engine.state());
        assert_eq!(pin.levels(), vec![false]);
    }

    #[tokio::test]
    async fn test_new_fails_when_output_fails() {
        let result = ActuationEngine::new(
            MockOutputPin::with_failure(),
            ConfirmationPublisher::new(MockPublisher::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_target_true_actuates_and_confirms() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::default();
        let mut engine = engine(&pin, &publisher);

        let outcome = engine.handle(&target("true")).await;

        assert_eq!(
            outcome,
            Outcome::Actuated {
                value: true,
                confirmed: true
            }
        );
        assert!(engine.state());
        assert_eq!(pin.levels(), vec![false, true]);
        let published = publisher.get_published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload.as_ref(), b"true");
        assert_eq!(published[0].attachment, CURRENT_VALUE_TAG);
    }

    #[tokio::test]
    async fn test_unknown_payload_rejected() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::default();
        let mut engine = engine(&pin, &publisher);

        assert_eq!(engine.handle(&target("maybe")).await, Outcome::Rejected);
        assert_eq!(engine.handle(&target("TRUE")).await, Outcome::Rejected);
        assert_eq!(engine.handle(&target("true ")).await, Outcome::Rejected);

        assert!(!engine.state());
        assert_eq!(pin.levels(), vec![false]);
        assert!(publisher.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_current_value_is_ignored() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::default();
        let mut engine = engine(&pin, &publisher);

        let echo = InboundMessage::new(DEFAULT_KEY_EXPR, "true").with_attachment(CURRENT_VALUE_TAG);
        assert_eq!(
            engine.handle(&echo).await,
            Outcome::Ignored(SignalKind::CurrentValue)
        );
        assert!(!engine.state());
        assert!(publisher.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_echo_after_actuation_keeps_state() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::default();
        let mut engine = engine(&pin, &publisher);

        engine.handle(&target("true")).await;
        let stale_echo =
            InboundMessage::new(DEFAULT_KEY_EXPR, "false").with_attachment(CURRENT_VALUE_TAG);
        assert_eq!(
            engine.handle(&stale_echo).await,
            Outcome::Ignored(SignalKind::CurrentValue)
        );

        assert!(engine.state());
        assert_eq!(pin.levels(), vec![false, true]);
        assert_eq!(publisher.get_published_payloads().await, vec!["true"]);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_ignored() {
        let publisher = MockPublisher::default();
        let mut engine = engine(&MockOutputPin::new(), &publisher);

        let untagged = InboundMessage::new(DEFAULT_KEY_EXPR, "true");
        let prefixed =
            InboundMessage::new(DEFAULT_KEY_EXPR, "true").with_attachment("currentValueX");

        assert_eq!(
            engine.handle(&untagged).await,
            Outcome::Ignored(SignalKind::Unknown)
        );
        assert_eq!(
            engine.handle(&prefixed).await,
            Outcome::Ignored(SignalKind::Unknown)
        );
        assert!(publisher.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_output_failure_keeps_state_and_skips_publish() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::default();
        let mut engine = engine(&pin, &publisher);
        pin.set_failing(true);

        assert_eq!(engine.handle(&target("true")).await, Outcome::OutputFailed);
        assert!(!engine.state());
        assert!(publisher.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_roll_back() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::with_failure();
        let mut engine = engine(&pin, &publisher);

        assert_eq!(
            engine.on_command(b"true").await,
            Outcome::Actuated {
                value: true,
                confirmed: false
            }
        );
        assert!(engine.state());
        assert_eq!(pin.levels(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_sequence_confirms_each_state() {
        let pin = MockOutputPin::new();
        let publisher = MockPublisher::default();
        let mut engine = engine(&pin, &publisher);

        for payload in ["true", "false", "true"] {
            engine.handle(&target(payload)).await;
            let published = publisher.get_published_payloads().await;
            assert_eq!(published.last().map(String::as_str), Some(payload));
            assert_eq!(engine.state(), payload == "true");
        }

        assert_eq!(
            publisher.get_published_payloads().await,
            vec!["true", "false", "true"]
        );
        assert_eq!(pin.levels(), vec![false, true, false, true]);
    }
}
