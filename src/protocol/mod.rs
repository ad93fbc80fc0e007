//! Signal protocol for the actuator provider
//!
//! Message shapes, attachment classification, and key-expression rules for
//! a single boolean VSS actuator.

pub mod key_expr;
pub mod messages;
pub mod signal;

pub use key_expr::{validate_key_expr, KeyExprError, DEFAULT_KEY_EXPR};
pub use messages::{InboundMessage, OutboundMessage, ENCODING_TEXT_UTF8};
pub use signal::{parse_command, SignalKind, CURRENT_VALUE_TAG, TARGET_VALUE_TAG};
