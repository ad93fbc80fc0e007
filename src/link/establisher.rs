//! Pure link retry state machine
//!
//! ```text
//! Disconnected --Started--> Connecting --Up--> Connected
//!      ^                        ^                  |
//!      |                        +--Down (budget)---+
//!      +------------Down (budget exhausted)--------+
//! ```
//!
//! A link-up in any state resets the retry counter.

use super::{LinkEvent, LinkState};
use tracing::{error, info, warn};

/// What the caller should do in response to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// First association request
    Associate,
    /// Reassociate after a link-down
    Reassociate { attempt: u32 },
    /// Link is up; readiness should be signalled
    MarkConnected,
    /// Retry budget exhausted; stop trying
    GiveUp,
    /// Nothing to do
    None,
}

#[derive(Debug, Clone)]
pub struct Establisher {
    state: LinkState,
    retries: u32,
    max_retries: u32,
    exhausted: bool,
}

impl Establisher {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: LinkState::Disconnected,
            retries: 0,
            max_retries,
            exhausted: false,
        }
    }

    pub fn on_event(&mut self, event: &LinkEvent) -> LinkAction {
        match event {
            LinkEvent::Started => {
                self.state = LinkState::Connecting;
                LinkAction::Associate
            }
            LinkEvent::Up => {
                if self.retries > 0 {
                    info!(retries = self.retries, "Link recovered, retry counter reset");
                }
                self.state = LinkState::Connected;
                self.retries = 0;
                self.exhausted = false;
                LinkAction::MarkConnected
            }
            LinkEvent::Down { reason } => {
                if self.exhausted {
                    return LinkAction::None;
                }

                if self.retries < self.max_retries {
                    self.retries += 1;
                    self.state = LinkState::Connecting;
                    warn!(
                        reason = %reason,
                        attempt = self.retries,
                        max_retries = self.max_retries,
                        "Link down, reassociating"
                    );
                    LinkAction::Reassociate {
                        attempt: self.retries,
                    }
                } else {
                    self.state = LinkState::Disconnected;
                    self.exhausted = true;
                    error!(
                        reason = %reason,
                        max_retries = self.max_retries,
                        "Link down and retry budget exhausted, giving up"
                    );
                    LinkAction::GiveUp
                }
            }
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
