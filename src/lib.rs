//! VSS actuator provider
//!
//! Bridges a device's digital output to a publish/subscribe bus carrying
//! Vehicle Signal Specification values. The provider subscribes to one
//! boolean signal, treats messages tagged `targetValue` as commands, drives
//! the output, and republishes the new state tagged `currentValue`.
//!
//! # Overview
//!
//! - [`locator`] - Connection-string validation
//! - [`link`] - Network link association with bounded retry
//! - [`protocol`] - Signal classification and message shapes
//! - [`actuator`] - Actuation engine and confirmation publishing
//! - [`transport`] - Session traits and the MQTT v5 implementation
//! - [`output`] - Digital output drivers
//! - [`lifecycle`] - Startup sequence and shutdown
//!
//! # Quick Start
//!
//! ```rust
//! use vss_actuator::protocol::{InboundMessage, SignalKind, DEFAULT_KEY_EXPR};
//!
//! let message = InboundMessage::new(DEFAULT_KEY_EXPR, "true").with_attachment("targetValue");
//! assert_eq!(message.kind(), SignalKind::TargetValue);
//! assert_eq!(SignalKind::classify(Some(b"currentValueX")), SignalKind::Unknown);
//! ```

pub mod actuator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod link;
pub mod locator;
pub mod observability;
pub mod output;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use actuator::{ActuationEngine, ActuatorContext, ConfirmationPublisher, Outcome};
pub use config::ActuatorConfig;
pub use error::{ActuatorError, ActuatorResult};
pub use lifecycle::ActuatorProvider;
pub use protocol::*;
pub use transport::mqtt::MqttSession;
