//! MQTT v5 implementation of the session traits
//!
//! The module separates pure mapping code from I/O:
//!
//! - [`connection`] - Session configuration and state, option building
//! - [`message_handler`] - Packet routing and property mapping
//! - [`client`] - Event loop task, subscriber fan-out and publishing
//!
//! # Usage
//!
//! ```rust,no_run
//! use vss_actuator::transport::mqtt::{MqttSession, SessionConfig};
//! use vss_actuator::transport::Session;
//!
//! # tokio_test::block_on(async {
//! let config = SessionConfig::new("horn-actuator");
//! let mut session = MqttSession::open(&config).await?;
//! let subscriber = session.declare_subscriber("Vehicle/Body/Horn/IsActive").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{MqttPublisher, MqttSession};
pub use connection::{SessionConfig, SessionMode, SessionState};
pub use message_handler::{EventRoute, MessageHandler};
