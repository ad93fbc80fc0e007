//! Bus locator validation
//!
//! A locator names the transport endpoint the session attaches to. The only
//! accepted shape is `tcp/<IPv4>:<port>#iface=<name>`. An empty locator means
//! "use the transport defaults".
//!
//! Validation checks shape only, so octets above 255 are accepted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

static LOCATOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^tcp/((?:[0-9]{1,3}\.){3}[0-9]{1,3}):([0-9]+)#iface=([A-Za-z0-9_-]+)$")
        .expect("locator pattern is a valid regex")
});

/// Locator validation errors
#[derive(Debug, Error, PartialEq)]
pub enum LocatorError {
    #[error("Invalid locator format '{0}', expected 'tcp/<ip>:<port>#iface=<interface>'")]
    InvalidFormat(String),
    #[error("Locator port out of range: {0}")]
    InvalidPort(String),
}

/// Check a locator literal against the required shape.
///
/// Empty input is valid.
pub fn validate_locator(locator: &str) -> Result<(), LocatorError> {
    if locator.is_empty() || LOCATOR_PATTERN.is_match(locator) {
        Ok(())
    } else {
        Err(LocatorError::InvalidFormat(locator.to_string()))
    }
}

/// A validated `tcp/<ip>:<port>#iface=<name>` locator split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    literal: String,
    host: String,
    port: u16,
    iface: String,
}

impl Locator {
    /// Parse a locator literal. Returns `Ok(None)` for the empty locator.
    pub fn parse(locator: &str) -> Result<Option<Self>, LocatorError> {
        if locator.is_empty() {
            return Ok(None);
        }

        let captures = LOCATOR_PATTERN
            .captures(locator)
            .ok_or_else(|| LocatorError::InvalidFormat(locator.to_string()))?;

        let port = captures[2]
            .parse::<u16>()
            .map_err(|_| LocatorError::InvalidPort(captures[2].to_string()))?;

        Ok(Some(Self {
            literal: locator.to_string(),
            host: captures[1].to_string(),
            port,
            iface: captures[3].to_string(),
        }))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Network interface named by the `#iface=` suffix
    pub fn iface(&self) -> &str {
        &self.iface
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}
