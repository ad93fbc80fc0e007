//! Async link supervision
//!
//! [`establish`] starts the driver and spawns a task that runs every link
//! event through the [`Establisher`]. Bootstrap reads the outcome through
//! the returned [`Connectivity`] handle.

use super::establisher::{Establisher, LinkAction};
use super::{Credentials, LinkDriver, LinkError, LinkEvent, LinkState};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Bounded reassociation policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Pause before each reassociation attempt
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Snapshot of the establisher, published on every event
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatus {
    pub state: LinkState,
    pub retries: u32,
    pub exhausted: bool,
}

impl LinkStatus {
    fn from_establisher(establisher: &Establisher) -> Self {
        Self {
            state: establisher.state(),
            retries: establisher.retries(),
            exhausted: establisher.is_exhausted(),
        }
    }
}

/// Handle to the running link supervisor
pub struct Connectivity {
    status_rx: watch::Receiver<LinkStatus>,
    max_retries: u32,
    handle: JoinHandle<()>,
}

impl Connectivity {
    /// Readiness flag: true while the link is up
    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().state == LinkState::Connected
    }

    pub fn state(&self) -> LinkState {
        self.status_rx.borrow().state
    }

    pub fn status(&self) -> LinkStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_exhausted(&self) -> bool {
        self.status_rx.borrow().exhausted
    }

    /// Poll the readiness flag until the link is up.
    ///
    /// Fails if the retry budget runs out or the driver stops emitting
    /// events before the first connection.
    pub async fn wait_until_connected(&self, poll_interval: Duration) -> Result<(), LinkError> {
        loop {
            if self.is_connected() {
                return Ok(());
            }
            if self.is_exhausted() {
                return Err(LinkError::RetriesExhausted {
                    max_retries: self.max_retries,
                });
            }
            if self.handle.is_finished() {
                return Err(LinkError::EventStreamClosed);
            }
            info!("Waiting for link...");
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Resolve once the link is permanently lost: retries exhausted or the
    /// supervisor stopped.
    pub async fn wait_exhausted(&self) {
        let mut status_rx = self.status_rx.clone();
        let _ = status_rx.wait_for(|status| status.exhausted).await;
    }
}

impl Drop for Connectivity {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start the driver and supervise the link in a background task
pub async fn establish<D: LinkDriver>(
    mut driver: D,
    credentials: Credentials,
    policy: RetryPolicy,
) -> Result<Connectivity, LinkError> {
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    driver.start(events_tx).await?;

    let establisher = Establisher::new(policy.max_retries);
    let (status_tx, status_rx) = watch::channel(LinkStatus::from_establisher(&establisher));
    let max_retries = policy.max_retries;

    info!(max_retries, "Connecting link...");
    let handle = tokio::spawn(supervise(
        driver,
        credentials,
        policy,
        establisher,
        events_rx,
        status_tx,
    ));

    Ok(Connectivity {
        status_rx,
        max_retries,
        handle,
    })
}

async fn supervise<D: LinkDriver>(
    mut driver: D,
    credentials: Credentials,
    policy: RetryPolicy,
    mut establisher: Establisher,
    mut events_rx: mpsc::Receiver<LinkEvent>,
    status_tx: watch::Sender<LinkStatus>,
) {
    // Failed association requests are re-queued locally as link-down events
    let mut pending: VecDeque<LinkEvent> = VecDeque::new();

    loop {
        let event = match pending.pop_front() {
            Some(event) => event,
            None => match events_rx.recv().await {
                Some(event) => event,
                None => break,
            },
        };

        debug!(?event, "Link event");
        let action = establisher.on_event(&event);
        status_tx.send_replace(LinkStatus::from_establisher(&establisher));

        match action {
            LinkAction::Associate => {
                if let Err(e) = driver.associate(&credentials).await {
                    pending.push_back(association_failed(e));
                }
            }
            LinkAction::Reassociate { attempt } => {
                tokio::time::sleep(policy.retry_delay).await;
                debug!(attempt, "Reassociating link");
                if let Err(e) = driver.associate(&credentials).await {
                    pending.push_back(association_failed(e));
                }
            }
            LinkAction::MarkConnected => info!("Link connected"),
            LinkAction::GiveUp | LinkAction::None => {}
        }
    }

    warn!("Link event stream closed, supervisor stopping");
}

fn association_failed(error: LinkError) -> LinkEvent {
    warn!(error = %error, "Association request failed");
    LinkEvent::Down {
        reason: error.to_string(),
    }
}
