//! Impure I/O operations for the MQTT session
//!
//! Owns the `rumqttc` event loop task, forwards inbound publishes to
//! declared subscribers and re-subscribes after every reconnection.

use super::connection::{configure_mqtt_options, SessionConfig, SessionState};
use super::message_handler::{EventRoute, MessageHandler};
use crate::protocol::{validate_key_expr, InboundMessage, OutboundMessage};
use crate::transport::{Publisher, Session, Subscriber, TransportError};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay before polling again after an event loop error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CHANNEL_CAPACITY: usize = 10;

type SubscriptionMap = Arc<Mutex<HashMap<String, mpsc::Sender<InboundMessage>>>>;

/// Open MQTT session
pub struct MqttSession {
    client_id: String,
    client: AsyncClient,
    state_rx: watch::Receiver<SessionState>,
    state_tx: watch::Sender<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    subscriptions: SubscriptionMap,
    channel_capacity: usize,
    event_loop_handle: Option<JoinHandle<()>>,
}

impl MqttSession {
    /// Connect and wait for the broker's ConnAck
    pub async fn open(config: &SessionConfig) -> Result<Self, TransportError> {
        let options = configure_mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let (host, port) = config.endpoint();
        info!(
            client_id = %config.client_id,
            mode = %config.mode,
            host,
            port,
            "Opening session"
        );

        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let subscriptions: SubscriptionMap = Arc::new(Mutex::new(HashMap::new()));

        let handle = tokio::spawn(Self::run_event_loop(
            config.client_id.clone(),
            event_loop,
            client.clone(),
            state_tx.clone(),
            shutdown_rx,
            subscriptions.clone(),
        ));

        let mut session = MqttSession {
            client_id: config.client_id.clone(),
            client,
            state_rx: state_rx.clone(),
            state_tx,
            shutdown_tx,
            subscriptions,
            channel_capacity: config.channel_capacity,
            event_loop_handle: Some(handle),
        };

        if let Err(e) =
            Self::wait_for_connection_confirmation(state_rx, config.connect_timeout).await
        {
            session.stop_event_loop();
            return Err(e);
        }

        info!(client_id = %session.client_id, "Session open");
        Ok(session)
    }

    /// Wait for the first ConnAck, failing on timeout or connection error
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<SessionState>,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let confirmation = tokio::time::timeout(timeout, async {
            loop {
                match &*state_rx.borrow_and_update() {
                    SessionState::Connected => return Ok(()),
                    SessionState::Disconnected(reason) => {
                        return Err(TransportError::SessionOpenFailed(reason.clone()));
                    }
                    SessionState::Closed => {
                        return Err(TransportError::SessionOpenFailed(
                            "session closed".to_string(),
                        ));
                    }
                    SessionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(TransportError::SessionOpenFailed(
                        "state channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        match confirmation {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnAckTimeout(timeout)),
        }
    }

    async fn run_event_loop(
        client_id: String,
        mut event_loop: EventLoop,
        client: AsyncClient,
        state_tx: watch::Sender<SessionState>,
        mut shutdown_rx: watch::Receiver<bool>,
        subscriptions: SubscriptionMap,
    ) {
        debug!(client_id = %client_id, "Starting MQTT event loop");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event loop");
                        break;
                    }
                }
                event_result = event_loop.poll() => match event_result {
                    Ok(event) => {
                        let route = MessageHandler::route_mqtt_event(&event);
                        Self::process_event_route(route, &state_tx, &client, &subscriptions).await;
                    }
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "MQTT event loop error");
                        let _ = state_tx.send(SessionState::Disconnected(e.to_string()));
                        if !Self::interruptible_sleep(shutdown_rx.clone(), RECONNECT_DELAY).await {
                            break;
                        }
                    }
                }
            }
        }

        debug!(client_id = %client_id, "MQTT event loop stopped");
    }

    async fn process_event_route(
        route: EventRoute,
        state_tx: &watch::Sender<SessionState>,
        client: &AsyncClient,
        subscriptions: &SubscriptionMap,
    ) {
        match route {
            EventRoute::ConnectionAcknowledged => {
                let _ = state_tx.send(SessionState::Connected);
                Self::resubscribe(client, subscriptions).await;
            }
            EventRoute::MessageReceived(message) => {
                Self::forward_message(subscriptions, message).await;
            }
            EventRoute::Disconnected => {
                warn!("Disconnected by broker");
                let _ = state_tx.send(SessionState::Disconnected(
                    "disconnected by broker".to_string(),
                ));
            }
            EventRoute::SubscriptionConfirmed { packet_id, summary } => {
                debug!(target: "mqtt_transport", packet_id, "Subscription confirmed: {}", summary);
            }
            EventRoute::InfrastructureEvent(event) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event);
            }
            EventRoute::OutgoingEvent => {}
        }
    }

    /// Hand a message to the subscriber declared on its exact key-expression
    async fn forward_message(subscriptions: &SubscriptionMap, message: InboundMessage) {
        let sender = subscriptions.lock().await.get(&message.key_expr).cloned();
        match sender {
            Some(sender) => {
                if sender.send(message).await.is_err() {
                    debug!("Subscriber dropped, discarding message");
                }
            }
            None => debug!(key_expr = %message.key_expr, "No subscriber for key-expression"),
        }
    }

    async fn resubscribe(client: &AsyncClient, subscriptions: &SubscriptionMap) {
        let key_exprs: Vec<String> = subscriptions.lock().await.keys().cloned().collect();
        for key_expr in key_exprs {
            if let Err(e) = client.subscribe(key_expr.as_str(), QoS::AtLeastOnce).await {
                error!(key_expr = %key_expr, error = %e, "Failed to re-subscribe");
            } else {
                debug!(target: "mqtt_transport", "Re-subscribed to: {}", key_expr);
            }
        }
    }

    /// Returns true if the sleep completed, false if shutdown was requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
            _ = tokio::time::sleep(delay) => true,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Watch channel for session state changes
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    fn stop_event_loop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Session for MqttSession {
    type Publisher = MqttPublisher;

    async fn declare_subscriber(&mut self, key_expr: &str) -> Result<Subscriber, TransportError> {
        validate_key_expr(key_expr)?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.subscriptions
            .lock()
            .await
            .insert(key_expr.to_string(), tx);

        if let Err(e) = self.client.subscribe(key_expr, QoS::AtLeastOnce).await {
            self.subscriptions.lock().await.remove(key_expr);
            return Err(TransportError::SubscriptionFailed {
                key_expr: key_expr.to_string(),
                source: Box::new(e),
            });
        }

        info!(key_expr, "Subscriber declared");
        Ok(Subscriber::new(key_expr, rx))
    }

    async fn declare_publisher(&self, key_expr: &str) -> Result<MqttPublisher, TransportError> {
        validate_key_expr(key_expr)?;

        let state = self.state();
        if matches!(state, SessionState::Closed) {
            return Err(TransportError::PublisherDeclarationFailed {
                key_expr: key_expr.to_string(),
                reason: format!("session is {state}"),
            });
        }

        info!(key_expr, "Publisher declared");
        Ok(MqttPublisher::new(
            self.client.clone(),
            key_expr,
            self.state_rx.clone(),
        ))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Disconnect request failed");
        }
        let _ = self.state_tx.send(SessionState::Closed);
        // Dropping the senders ends every subscriber stream
        self.subscriptions.lock().await.clear();

        if let Some(handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!("Event loop task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => warn!("Event loop task ended with error: {}", e),
                Err(_) => warn!("Event loop task didn't shut down gracefully, forcing abort"),
                _ => {}
            }
        }

        info!(client_id = %self.client_id, "Session closed");
        Ok(())
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.stop_event_loop();
    }
}

/// Publisher bound to one key-expression of an [`MqttSession`]
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    key_expr: String,
    state_rx: watch::Receiver<SessionState>,
}

impl MqttPublisher {
    fn new(
        client: AsyncClient,
        key_expr: impl Into<String>,
        state_rx: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            client,
            key_expr: key_expr.into(),
            state_rx,
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    fn key_expr(&self) -> &str {
        &self.key_expr
    }

    async fn put(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let state = self.state_rx.borrow().clone();
        if state != SessionState::Connected {
            return Err(TransportError::NotConnected(state.to_string()));
        }

        let properties = MessageHandler::publish_properties(&message);
        self.client
            .publish_with_properties(
                self.key_expr.as_str(),
                QoS::AtLeastOnce,
                false,
                message.payload,
                properties,
            )
            .await
            .map_err(|e| TransportError::PublishFailed(Box::new(e)))
    }
}
