//! Mock implementations for testing
//!
//! Provides mock output, publisher, session and link driver implementations
//! so the provider can be exercised without GPIO, a broker or a radio.

use crate::link::{Credentials, LinkDriver, LinkError, LinkEvent};
use crate::output::{OutputError, OutputPin};
use crate::protocol::{InboundMessage, OutboundMessage, DEFAULT_KEY_EXPR};
use crate::transport::{Publisher, Session, Subscriber, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Mock output recording every level it is driven to.
///
/// Clones share state, so a test can keep one handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockOutputPin {
    pub levels: Arc<std::sync::Mutex<Vec<bool>>>,
    pub should_fail: Arc<AtomicBool>,
}

impl MockOutputPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        let pin = Self::default();
        pin.set_failing(true);
        pin
    }

    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl OutputPin for MockOutputPin {
    fn set_level(&mut self, high: bool) -> Result<(), OutputError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(OutputError::Rejected("mock failure".to_string()));
        }
        if let Ok(mut levels) = self.levels.lock() {
            levels.push(high);
        }
        Ok(())
    }
}

/// Mock publisher recording every put
#[derive(Debug, Clone)]
pub struct MockPublisher {
    pub key_expr: String,
    pub published: Arc<Mutex<Vec<OutboundMessage>>>,
    pub should_fail: Arc<AtomicBool>,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_EXPR)
    }
}

impl MockPublisher {
    pub fn new(key_expr: impl Into<String>) -> Self {
        Self {
            key_expr: key_expr.into(),
            published: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_failure() -> Self {
        let publisher = Self::default();
        publisher.should_fail.store(true, Ordering::SeqCst);
        publisher
    }

    pub async fn get_published(&self) -> Vec<OutboundMessage> {
        self.published.lock().await.clone()
    }

    /// Published payloads as text, in publish order
    pub async fn get_published_payloads(&self) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .map(|m| String::from_utf8_lossy(&m.payload).into_owned())
            .collect()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn key_expr(&self) -> &str {
        &self.key_expr
    }

    async fn put(&self, message: OutboundMessage) -> Result<(), TransportError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(TransportError::PublishFailed("mock failure".into()));
        }
        self.published.lock().await.push(message);
        Ok(())
    }
}

/// Mock session handing out in-memory subscribers and a shared [`MockPublisher`]
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    pub subscribers: Arc<Mutex<HashMap<String, mpsc::Sender<InboundMessage>>>>,
    pub publisher: MockPublisher,
    pub closed: Arc<AtomicBool>,
    pub fail_subscribe: bool,
    pub fail_publisher: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(publisher: MockPublisher) -> Self {
        Self {
            publisher,
            ..Default::default()
        }
    }

    /// Deliver a message as the bus would. Returns false when nobody is
    /// subscribed to its key-expression.
    pub async fn inject(&self, message: InboundMessage) -> bool {
        let sender = self.subscribers.lock().await.get(&message.key_expr).cloned();
        match sender {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MockSession {
    type Publisher = MockPublisher;

    async fn declare_subscriber(&mut self, key_expr: &str) -> Result<Subscriber, TransportError> {
        if self.fail_subscribe {
            return Err(TransportError::SubscriptionFailed {
                key_expr: key_expr.to_string(),
                source: "mock failure".into(),
            });
        }
        let (tx, rx) = mpsc::channel(32);
        self.subscribers
            .lock()
            .await
            .insert(key_expr.to_string(), tx);
        Ok(Subscriber::new(key_expr, rx))
    }

    async fn declare_publisher(&self, key_expr: &str) -> Result<MockPublisher, TransportError> {
        if self.fail_publisher {
            return Err(TransportError::PublisherDeclarationFailed {
                key_expr: key_expr.to_string(),
                reason: "mock failure".to_string(),
            });
        }
        let mut publisher = self.publisher.clone();
        publisher.key_expr = key_expr.to_string();
        Ok(publisher)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.lock().await.clear();
        Ok(())
    }
}

/// Mock link driver.
///
/// Emits [`LinkEvent::Started`] on start and then forwards whatever the
/// test sends through [`MockLinkDriver::events`].
pub struct MockLinkDriver {
    inject_tx: mpsc::Sender<LinkEvent>,
    inject_rx: Option<mpsc::Receiver<LinkEvent>>,
    events_tx: Option<mpsc::Sender<LinkEvent>>,
    associations: Arc<AtomicU32>,
    should_fail: bool,
    up_on_associate: bool,
    forwarder: Option<JoinHandle<()>>,
}

impl MockLinkDriver {
    pub fn new() -> Self {
        let (inject_tx, inject_rx) = mpsc::channel(16);
        Self {
            inject_tx,
            inject_rx: Some(inject_rx),
            events_tx: None,
            associations: Arc::new(AtomicU32::new(0)),
            should_fail: false,
            up_on_associate: false,
            forwarder: None,
        }
    }

    /// Every association request fails
    pub fn always_failing() -> Self {
        let mut driver = Self::new();
        driver.should_fail = true;
        driver
    }

    /// Every successful association is followed by a link-up
    pub fn connecting() -> Self {
        let mut driver = Self::new();
        driver.up_on_associate = true;
        driver
    }

    /// Injector for link events
    pub fn events(&self) -> mpsc::Sender<LinkEvent> {
        self.inject_tx.clone()
    }

    pub fn association_count(&self) -> Arc<AtomicU32> {
        self.associations.clone()
    }
}

impl Default for MockLinkDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkDriver for MockLinkDriver {
    async fn start(&mut self, events: mpsc::Sender<LinkEvent>) -> Result<(), LinkError> {
        let mut inject_rx = self
            .inject_rx
            .take()
            .ok_or_else(|| LinkError::Driver("mock driver already started".to_string()))?;

        events
            .send(LinkEvent::Started)
            .await
            .map_err(|_| LinkError::EventStreamClosed)?;

        self.events_tx = Some(events.clone());
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = inject_rx.recv().await {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn associate(&mut self, _credentials: &Credentials) -> Result<(), LinkError> {
        self.associations.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(LinkError::AssociationFailed("mock failure".to_string()));
        }
        if self.up_on_associate {
            if let Some(events) = &self.events_tx {
                events
                    .send(LinkEvent::Up)
                    .await
                    .map_err(|_| LinkError::EventStreamClosed)?;
            }
        }
        Ok(())
    }
}

impl Drop for MockLinkDriver {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
