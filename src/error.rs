//! Top-level error type for the actuator provider
//!
//! Every fatal startup failure surfaces as an [`ActuatorError`]. Message-level
//! problems never do: they are logged and the message is dropped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid locator: {0}")]
    Locator(#[from] crate::locator::LocatorError),

    #[error("Link error: {0}")]
    Link(#[from] crate::link::LinkError),

    #[error("Output error: {0}")]
    Output(#[from] crate::output::OutputError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Consumer task failed: {0}")]
    Consumer(String),

    #[error("Signal handler error: {0}")]
    Signal(#[source] std::io::Error),
}

impl ActuatorError {
    /// Short classification used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            ActuatorError::Config(_) => "config",
            ActuatorError::Locator(_) => "locator",
            ActuatorError::Link(_) => "link",
            ActuatorError::Output(_) => "output",
            ActuatorError::Transport(_) => "transport",
            ActuatorError::Consumer(_) => "consumer",
            ActuatorError::Signal(_) => "signal",
        }
    }
}

pub type ActuatorResult<T> = Result<T, ActuatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkError;
    use crate::locator::validate_locator;

    #[test]
    fn test_from_conversions() {
        let err: ActuatorError = validate_locator("nonsense").unwrap_err().into();
        assert_eq!(err.kind(), "locator");

        let err: ActuatorError = LinkError::RetriesExhausted { max_retries: 5 }.into();
        assert_eq!(err.kind(), "link");
        assert_eq!(
            err.to_string(),
            "Link error: Link retries exhausted after 5 attempts"
        );
    }
}
