//! Provider bootstrap and shutdown
//!
//! Startup order: link up, output opened, locator validated,
//! session opened, subscriber declared, publisher declared, output driven
//! low, consumer task spawned. Any failure along the way is fatal.

use crate::actuator::{run_consumer, ActuationEngine, ActuatorContext, ConfirmationPublisher};
use crate::config::{ActuatorConfig, OutputBackend};
use crate::error::{ActuatorError, ActuatorResult};
use crate::link::{self, Connectivity, LinkDriver, SysfsLink};
use crate::locator::validate_locator;
use crate::output::{LogOutputPin, OutputPin, SysfsOutputPin};
use crate::transport::mqtt::MqttSession;
use crate::transport::Session;
use crate::{lifecycle_span, link_span};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

const CONSUMER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Link driver described by the `[link]` section
pub fn link_driver(config: &ActuatorConfig) -> ActuatorResult<SysfsLink> {
    let interface = config.link_interface()?;
    Ok(SysfsLink::new(interface, config.poll_interval())
        .with_associate_command(config.link.associate_command.clone()))
}

/// Start link supervision and block until the link is up
pub async fn connect_link<D: LinkDriver>(
    driver: D,
    config: &ActuatorConfig,
) -> ActuatorResult<Connectivity> {
    let credentials = config.get_link_credentials()?;
    let span = link_span!(max_retries = config.link.max_retries);

    async {
        let connectivity = link::establish(driver, credentials, config.retry_policy()).await?;
        connectivity
            .wait_until_connected(config.poll_interval())
            .await?;
        info!("Link ready");
        Ok(connectivity)
    }
    .instrument(span)
    .await
}

/// Output driver described by the `[output]` section.
///
/// The level is first driven by [`ActuationEngine::new`] when the provider starts.
pub fn open_output(config: &ActuatorConfig) -> ActuatorResult<Box<dyn OutputPin>> {
    let pin = config.output.pin;
    let output: Box<dyn OutputPin> = match config.output.backend {
        OutputBackend::Sysfs => Box::new(SysfsOutputPin::open(&config.output.sysfs_root, pin)?),
        OutputBackend::Log => Box::new(LogOutputPin::new(pin)),
    };
    info!(pin, backend = ?config.output.backend, "Output initialised");
    Ok(output)
}

/// Validate the locator and open the MQTT session
pub async fn open_session(config: &ActuatorConfig) -> ActuatorResult<MqttSession> {
    validate_locator(&config.bus.locator)?;
    let session_config = config.session_config()?;
    Ok(MqttSession::open(&session_config).await?)
}

/// A running provider: open session plus the consumer task
pub struct ActuatorProvider<S: Session> {
    key_expr: String,
    session: S,
    consumer: Option<JoinHandle<()>>,
}

impl<S: Session + 'static> ActuatorProvider<S> {
    /// Declare the subscriber and publisher on `key_expr` and start consuming
    pub async fn start<O: OutputPin + 'static>(
        mut session: S,
        key_expr: &str,
        output: O,
    ) -> ActuatorResult<Self> {
        let span = lifecycle_span!(key_expr);

        async move {
            let subscriber = session.declare_subscriber(key_expr).await?;
            let publisher = session.declare_publisher(key_expr).await?;

            let engine = ActuationEngine::new(output, ConfirmationPublisher::new(publisher))?;
            let context = ActuatorContext::new(key_expr, engine);

            let consumer = tokio::spawn(async move {
                run_consumer(context, subscriber).await;
            });

            info!("Actuator provider started");
            Ok(Self {
                key_expr: key_expr.to_string(),
                session,
                consumer: Some(consumer),
            })
        }
        .instrument(span)
        .await
    }

    pub fn key_expr(&self) -> &str {
        &self.key_expr
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_consuming(&self) -> bool {
        self.consumer
            .as_ref()
            .is_some_and(|consumer| !consumer.is_finished())
    }

    /// Close the session and wait for the consumer to drain
    pub async fn shutdown(mut self) -> ActuatorResult<()> {
        info!(key_expr = %self.key_expr, "Shutting down actuator provider");
        self.session.close().await?;

        if let Some(mut consumer) = self.consumer.take() {
            match tokio::time::timeout(CONSUMER_SHUTDOWN_TIMEOUT, &mut consumer).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(ActuatorError::Consumer(e.to_string()));
                }
                Err(_) => {
                    warn!("Consumer did not stop in time, aborting");
                    consumer.abort();
                }
            }
        }

        Ok(())
    }
}

impl<S: Session> Drop for ActuatorProvider<S> {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InboundMessage, DEFAULT_KEY_EXPR, TARGET_VALUE_TAG};
    use crate::testing::mocks::{MockLinkDriver, MockOutputPin, MockSession};

    #[tokio::test]
    async fn test_open_output_log_backend() {
        let config = ActuatorConfig::test_config();
        assert!(open_output(&config).is_ok());
    }

    #[tokio::test]
    async fn test_open_output_sysfs_backend() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("gpio25")).unwrap();

        let mut config = ActuatorConfig::test_config();
        config.output.backend = OutputBackend::Sysfs;
        config.output.sysfs_root = root.path().to_path_buf();

        let output = open_output(&config).unwrap();
        let value_path = root.path().join("gpio25/value");
        assert!(!value_path.exists());

        let provider = ActuatorProvider::start(MockSession::new(), DEFAULT_KEY_EXPR, output)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&value_path).unwrap(), "0");
        provider.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_startup_drives_output_low_once() {
        let pin = MockOutputPin::new();
        let provider = ActuatorProvider::start(MockSession::new(), DEFAULT_KEY_EXPR, pin.clone())
            .await
            .unwrap();
        assert_eq!(pin.levels(), vec![false]);
        provider.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_link_driver_uses_resolved_interface() {
        let mut config = ActuatorConfig::test_config();
        config.bus.locator = "tcp/10.0.0.2:1883#iface=eth0".to_string();
        assert_eq!(link_driver(&config).unwrap().interface(), "eth0");
    }

    #[tokio::test]
    async fn test_connect_link_exhausts_budget() {
        let mut config = ActuatorConfig::test_config();
        config.link.max_retries = 1;
        config.link.poll_interval_ms = 5;

        let result = connect_link(MockLinkDriver::always_failing(), &config).await;
        assert!(matches!(result, Err(ActuatorError::Link(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_failing_subscription() {
        let session = MockSession {
            fail_subscribe: true,
            ..Default::default()
        };
        let result = ActuatorProvider::start(session, DEFAULT_KEY_EXPR, MockOutputPin::new()).await;
        assert!(matches!(result, Err(ActuatorError::Transport(_))));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let session = MockSession::new();
        let pin = MockOutputPin::new();
        let provider = ActuatorProvider::start(session.clone(), DEFAULT_KEY_EXPR, pin.clone())
            .await
            .unwrap();
        assert!(provider.is_consuming());

        let command =
            InboundMessage::new(DEFAULT_KEY_EXPR, "true").with_attachment(TARGET_VALUE_TAG);
        assert!(session.inject(command).await);

        tokio::time::timeout(Duration::from_secs(1), async {
            while session.publisher.get_published().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        provider.shutdown().await.unwrap();
        assert!(session.is_closed());
        assert_eq!(pin.levels(), vec![false, true]);
    }
}
