//! Key-expression validation for the signal topic
//!
//! The provider serves exactly one VSS signal. Its key-expression doubles as
//! the MQTT topic, so it must be a concrete topic name: no wildcards and no
//! empty levels.

use thiserror::Error;

/// VSS path of the horn actuator, in slash-separated form
pub const DEFAULT_KEY_EXPR: &str = "Vehicle/Body/Horn/IsActive";

/// Key-expression validation errors
#[derive(Debug, Error, PartialEq)]
pub enum KeyExprError {
    #[error("Key-expression cannot be empty")]
    Empty,
    #[error("Key-expression '{0}' contains a wildcard")]
    Wildcard(String),
    #[error("Key-expression '{0}' contains an empty level")]
    EmptyLevel(String),
}

pub fn validate_key_expr(key_expr: &str) -> Result<(), KeyExprError> {
    if key_expr.is_empty() {
        return Err(KeyExprError::Empty);
    }

    if key_expr.contains(['+', '#', '*']) {
        return Err(KeyExprError::Wildcard(key_expr.to_string()));
    }

    if key_expr.split('/').any(str::is_empty) {
        return Err(KeyExprError::EmptyLevel(key_expr.to_string()));
    }

    Ok(())
}

/// Exact key-expression match for a concrete topic
pub fn matches(declared: &str, received: &str) -> bool {
    declared == received
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_key_expr_is_valid() {
        assert!(validate_key_expr(DEFAULT_KEY_EXPR).is_ok());
    }

    #[test]
    fn test_rejects_wildcards() {
        assert!(matches!(
            validate_key_expr("Vehicle/+/Horn"),
            Err(KeyExprError::Wildcard(_))
        ));
        assert!(matches!(
            validate_key_expr("Vehicle/#"),
            Err(KeyExprError::Wildcard(_))
        ));
        assert!(matches!(
            validate_key_expr("Vehicle/**"),
            Err(KeyExprError::Wildcard(_))
        ));
    }

    #[test]
    fn test_rejects_empty_levels() {
        assert_eq!(validate_key_expr(""), Err(KeyExprError::Empty));
        assert!(matches!(
            validate_key_expr("/Vehicle/Body"),
            Err(KeyExprError::EmptyLevel(_))
        ));
        assert!(matches!(
            validate_key_expr("Vehicle//Body"),
            Err(KeyExprError::EmptyLevel(_))
        ));
        assert!(matches!(
            validate_key_expr("Vehicle/Body/"),
            Err(KeyExprError::EmptyLevel(_))
        ));
    }

    #[test]
    fn test_matches_is_exact() {
        assert!(super::matches(DEFAULT_KEY_EXPR, "Vehicle/Body/Horn/IsActive"));
        assert!(!super::matches(DEFAULT_KEY_EXPR, "Vehicle/Body/Horn"));
        assert!(!super::matches(DEFAULT_KEY_EXPR, "vehicle/body/horn/isactive"));
    }

    proptest! {
        #[test]
        fn concrete_paths_validate(levels in prop::collection::vec("[A-Za-z0-9_]{1,12}", 1..6)) {
            let key_expr = levels.join("/");
            prop_assert!(validate_key_expr(&key_expr).is_ok());
        }
    }
}
