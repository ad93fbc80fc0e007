//! Signal classification by out-of-band attachment tag
//!
//! Every message on the signal's key-expression carries an attachment that
//! says whether it is a request to change the actuator (`targetValue`) or a
//! report of the actuator's present state (`currentValue`). The provider
//! publishes its own confirmations on the same key-expression, so telling the
//! two apart is what keeps it from re-actuating on its own echo.

use std::fmt;

/// Attachment tag carried by state reports
pub const CURRENT_VALUE_TAG: &str = "currentValue";

/// Attachment tag carried by actuation requests
pub const TARGET_VALUE_TAG: &str = "targetValue";

/// Classification of an inbound signal message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Echo of present actuator state; never actuated on
    CurrentValue,
    /// Requested state change
    TargetValue,
    /// Missing or unrecognized attachment
    Unknown,
}

impl SignalKind {
    /// Classify a message from its attachment bytes.
    ///
    /// Comparison is over the full attachment slice, so a tag sharing a
    /// prefix with a known literal (`currentValueX`, `current`) is Unknown.
    pub fn classify(attachment: Option<&[u8]>) -> Self {
        match attachment {
            Some(tag) if tag == CURRENT_VALUE_TAG.as_bytes() => SignalKind::CurrentValue,
            Some(tag) if tag == TARGET_VALUE_TAG.as_bytes() => SignalKind::TargetValue,
            _ => SignalKind::Unknown,
        }
    }

    /// Wire literal for this kind, if it has one
    pub fn as_tag(&self) -> Option<&'static str> {
        match self {
            SignalKind::CurrentValue => Some(CURRENT_VALUE_TAG),
            SignalKind::TargetValue => Some(TARGET_VALUE_TAG),
            SignalKind::Unknown => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag().unwrap_or("unknown"))
    }
}

/// Parse an actuation payload. Only the exact literals `true` and `false`
/// are commands.
pub fn parse_command(payload: &[u8]) -> Option<bool> {
    match payload {
        b"true" => Some(true),
        b"false" => Some(false),
        _ => None,
    }
}

/// Wire payload for a boolean actuator state
pub fn state_payload(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
