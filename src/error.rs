//! Error taxonomy for path extraction, assertions and step execution.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by path-expression parsing and extraction.
///
/// A malformed expression is a configuration bug and fails the step;
/// a well-formed expression that resolves nowhere is a data-dependent
/// condition reported as [`PathError::NoMatch`] only by callers that
/// require at least one match.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("malformed path expression '{expr}': {reason}")]
    Syntax { expr: String, reason: String },

    #[error("path '{path}' matched nothing in the document")]
    NoMatch { path: String },
}

/// A single failed expectation.
///
/// Every variant names the location it failed at, plus the expected
/// and actual values where they exist.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssertionError {
    #[error("status code mismatch: expected {expected}, actual {actual}")]
    StatusCode { expected: u16, actual: u16 },

    #[error("field '{path}' not found in response")]
    MissingField { path: String },

    #[error("value mismatch at '{path}': expected {expected}, actual {actual}")]
    ValueMismatch {
        path: String,
        expected: Value,
        actual: Value,
    },

    #[error("type mismatch at '{path}': expected {expected}, actual {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("length mismatch at '{path}': expected {expected}, actual {actual}")]
    LengthMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("array at '{path}' does not contain expected item {item}")]
    ContainmentFailure { path: String, item: Value },

    #[error("no element of array at '{path}' satisfies the predicate")]
    NoPredicateMatch { path: String },

    #[error("value at '{path}' is not an array (actual: {actual})")]
    NotAnArray { path: String, actual: String },

    #[error("response body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Errors from the HTTP collaborator.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no base URL configured for service '{service}'")]
    UnknownService { service: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// A step-level failure. Any of these aborts the remaining steps of
/// the current scenario.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("token refresh failed: login step '{step}' did not succeed: {reason}")]
    TokenRefresh { step: String, reason: String },

    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("failed to capture variable '{name}' from '{path}': {source}")]
    Capture {
        name: String,
        path: String,
        source: PathError,
    },

    #[error("assertion failures: {}", format_failures(.0))]
    Assertions(Vec<AssertionError>),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn format_failures(failures: &[AssertionError]) -> String {
    failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assertion_messages_name_path_expected_and_actual() {
        let err = AssertionError::ValueMismatch {
            path: "$.data.user.id".into(),
            expected: json!(42),
            actual: json!(7),
        };
        let msg = err.to_string();
        assert!(msg.contains("$.data.user.id"));
        assert!(msg.contains("42"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn step_error_joins_all_assertion_failures() {
        let err = StepError::Assertions(vec![
            AssertionError::StatusCode {
                expected: 200,
                actual: 500,
            },
            AssertionError::MissingField {
                path: "data.token".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("expected 200"));
        assert!(msg.contains("data.token"));
    }
}
