//! Pure session configuration for the MQTT transport
//!
//! This module turns a validated locator and session settings into
//! `rumqttc` options. No I/O happens here.

use crate::locator::Locator;
use crate::transport::TransportError;
use rumqttc::v5::MqttOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Endpoint used when the locator is empty
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1883;

/// Session role on the bus.
///
/// MQTT has no listening peers: in both modes the session connects to the
/// locator endpoint. In `peer` mode that endpoint is expected to be a
/// co-located broker acting as the device's peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Client,
    Peer,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Client => f.write_str("client"),
            SessionMode::Peer => f.write_str("peer"),
        }
    }
}

/// Everything needed to open a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub client_id: String,
    pub mode: SessionMode,
    pub locator: Option<Locator>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub channel_capacity: usize,
}

impl SessionConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            mode: SessionMode::Client,
            locator: None,
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 32,
        }
    }

    /// Host and port the session connects to
    pub fn endpoint(&self) -> (&str, u16) {
        match &self.locator {
            Some(locator) => (locator.host(), locator.port()),
            None => (DEFAULT_HOST, DEFAULT_PORT),
        }
    }
}

/// Session state tracked by the event loop
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Waiting for the first ConnAck
    Connecting,
    Connected,
    /// Connection lost; the event loop keeps retrying
    Disconnected(String),
    /// Session closed locally
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::Connected => f.write_str("connected"),
            SessionState::Disconnected(reason) => write!(f, "disconnected ({reason})"),
            SessionState::Closed => f.write_str("closed"),
        }
    }
}

pub fn configure_mqtt_options(config: &SessionConfig) -> Result<MqttOptions, TransportError> {
    if config.client_id.is_empty() {
        return Err(TransportError::SessionOpenFailed(
            "client id cannot be empty".to_string(),
        ));
    }

    let (host, port) = config.endpoint();
    let mut options = MqttOptions::new(config.client_id.clone(), host, port);
    options.set_keep_alive(config.keep_alive);
    // Subscriptions are re-declared on every ConnAck
    options.set_clean_start(true);

    if let Some(username) = &config.username {
        let password = config.password.clone().unwrap_or_default();
        options.set_credentials(username, &password);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_without_locator() {
        let config = SessionConfig::new("horn-actuator");
        assert_eq!(config.endpoint(), (DEFAULT_HOST, DEFAULT_PORT));
    }

    #[test]
    fn test_endpoint_from_locator() {
        let mut config = SessionConfig::new("horn-actuator");
        config.locator = Locator::parse("tcp/192.168.1.10:7447#iface=eth0").unwrap();
        assert_eq!(config.endpoint(), ("192.168.1.10", 7447));
    }

    #[test]
    fn test_configure_mqtt_options() {
        let mut config = SessionConfig::new("horn-actuator");
        config.username = Some("device".to_string());
        config.password = Some("secret".to_string());

        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.client_id(), "horn-actuator");
        assert!(options.clean_start());
        assert_eq!(options.keep_alive(), config.keep_alive);
    }

    #[test]
    fn test_empty_client_id_rejected() {
        let config = SessionConfig::new("");
        assert!(matches!(
            configure_mqtt_options(&config),
            Err(TransportError::SessionOpenFailed(_))
        ));
    }

    #[test]
    fn test_session_mode_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: SessionMode,
        }
        let wrapper: Wrapper = toml::from_str(r#"mode = "peer""#).unwrap();
        assert_eq!(wrapper.mode, SessionMode::Peer);
        assert_eq!(SessionMode::default(), SessionMode::Client);
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Connected.to_string(), "connected");
        assert_eq!(
            SessionState::Disconnected("io".to_string()).to_string(),
            "disconnected (io)"
        );
    }
}
