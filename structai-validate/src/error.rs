//! Error types for payload decoding and shape construction.

use thiserror::Error;

/// Error decoding a generator payload into a [`Value`](structai_core::Value).
#[derive(Debug, Error)]
pub enum OutputParseError {
    /// Failed to parse JSON.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The payload was empty.
    #[error("Output is empty")]
    Empty,

    /// No JSON found in the output.
    #[error("No JSON object or array found in output")]
    NoJsonFound,
}

/// Error building a [`Shape`](crate::Shape) from its declaration.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// A rule that needs a parameter was declared without one.
    #[error("Rule '{rule}' requires a parameter")]
    MissingRuleParam {
        /// Rule name.
        rule: String,
    },

    /// A rule parameter could not be parsed.
    #[error("Invalid parameter '{param}' for rule '{rule}': {reason}")]
    InvalidRuleParam {
        /// Rule name.
        rule: String,
        /// The raw parameter.
        param: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Regex compilation error for a `pattern` rule.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Two fields share an external name.
    #[error("Duplicate field '{field}' in shape '{shape}'")]
    DuplicateField {
        /// Shape name.
        shape: String,
        /// Field name.
        field: String,
    },

    /// A rule was declared on a field of a shape and failed to build.
    #[error("Field '{field}': {source}")]
    Field {
        /// Field name.
        field: String,
        /// Underlying error.
        #[source]
        source: Box<ShapeError>,
    },
}

impl ShapeError {
    /// Create an invalid parameter error.
    pub fn invalid_param(
        rule: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRuleParam {
            rule: rule.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing parameter error.
    pub fn missing_param(rule: impl Into<String>) -> Self {
        Self::MissingRuleParam { rule: rule.into() }
    }

    /// Attach the field name.
    #[must_use]
    pub fn in_field(self, field: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_message() {
        let err = ShapeError::invalid_param("min", "abc", "not a number");
        let msg = err.to_string();
        assert!(msg.contains("min"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("not a number"));
    }

    #[test]
    fn test_in_field_wraps() {
        let err = ShapeError::missing_param("oneof").in_field("status");
        assert_eq!(
            err.to_string(),
            "Field 'status': Rule 'oneof' requires a parameter"
        );
    }

    #[test]
    fn test_parse_error_display() {
        assert_eq!(
            OutputParseError::NoJsonFound.to_string(),
            "No JSON object or array found in output"
        );
    }
}
