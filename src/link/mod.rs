//! Network link establishment with bounded retry
//!
//! The bus is only reachable once the device's network link is up. This
//! module drives link association through a [`LinkDriver`], reacts to
//! link-up/link-down events, and gives up after a fixed number of
//! consecutive reassociation attempts.
//!
//! # Architecture
//!
//! - [`establisher`] - Pure state machine deciding what to do on each event
//! - [`connectivity`] - Async task feeding driver events through the state
//!   machine, plus the [`Connectivity`] handle read by bootstrap
//! - [`sysfs`] - Linux driver watching interface operstate

pub mod connectivity;
pub mod establisher;
pub mod sysfs;

pub use connectivity::{establish, Connectivity, LinkStatus, RetryPolicy};
pub use establisher::{Establisher, LinkAction};
pub use sysfs::SysfsLink;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Notifications from the link layer
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Driver is ready to associate
    Started,
    /// Link has connectivity
    Up,
    /// Link lost connectivity or an association attempt failed
    Down { reason: String },
}

/// Connectivity state as seen by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Link association credentials
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

/// Link layer errors
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link driver error: {0}")]
    Driver(String),
    #[error("Association failed: {0}")]
    AssociationFailed(String),
    #[error("Link retries exhausted after {max_retries} attempts")]
    RetriesExhausted { max_retries: u32 },
    #[error("Link event stream closed before connectivity was established")]
    EventStreamClosed,
}

/// Link layer consumed by the establisher
#[async_trait]
pub trait LinkDriver: Send + 'static {
    /// Begin emitting link events. The driver sends [`LinkEvent::Started`]
    /// once it is ready to associate.
    async fn start(&mut self, events: mpsc::Sender<LinkEvent>) -> Result<(), LinkError>;

    /// Request (re)association with the given credentials
    async fn associate(&mut self, credentials: &Credentials) -> Result<(), LinkError>;
}
