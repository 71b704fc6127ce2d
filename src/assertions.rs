//! Declarative assertion engine.
//!
//! Each assertion kind is an independent check returning the first
//! failure it finds (standard assert semantics within a kind).
//! [`evaluate`] runs every declared kind as a separate guarded call
//! and collects all failures, so one failing kind does not hide an
//! unrelated failure in the same step.

use crate::error::AssertionError;
use crate::model::{ArrayAssertion, Expected, KindTag};
use crate::path;
use serde_json::Value;
use tracing::debug;

/// Exact status-code equality.
pub fn assert_status_code(expected: u16, actual: u16) -> Result<(), AssertionError> {
    if actual != expected {
        return Err(AssertionError::StatusCode { expected, actual });
    }
    debug!("status code assertion passed: {}", actual);
    Ok(())
}

/// The path must match at least once in the body.
pub fn assert_contains_field(body: &Value, field: &str) -> Result<(), AssertionError> {
    let matches = path::extract(body, field)?;
    if matches.is_empty() {
        return Err(AssertionError::MissingField {
            path: field.to_string(),
        });
    }
    debug!("field existence assertion passed: {}", field);
    Ok(())
}

/// First match of the path must equal the expected value.
///
/// Mapping/sequence expectations compare structurally (subset for
/// mappings), so a partial expected structure validates nested data
/// without restating the full actual structure.
pub fn assert_field_value(
    body: &Value,
    path_expr: &str,
    expected: &Value,
) -> Result<(), AssertionError> {
    let actual = path::extract_first(body, path_expr)?;
    match expected {
        Value::Object(_) | Value::Array(_) => {
            compare_structural(expected, actual, path_expr)?
        }
        _ => {
            if actual != expected {
                return Err(AssertionError::ValueMismatch {
                    path: path_expr.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }
    debug!("field value assertion passed: {}", path_expr);
    Ok(())
}

/// First match of the path must carry the expected kind tag.
pub fn assert_field_type(
    body: &Value,
    path_expr: &str,
    expected: KindTag,
) -> Result<(), AssertionError> {
    let actual = path::extract_first(body, path_expr)?;
    let actual_kind = KindTag::of(actual);
    if actual_kind != expected {
        return Err(AssertionError::TypeMismatch {
            path: path_expr.to_string(),
            expected: expected.to_string(),
            actual: actual_kind.to_string(),
        });
    }
    debug!("field type assertion passed: {} is {}", path_expr, expected);
    Ok(())
}

/// Evaluate one array rule: length, containment, element predicate.
pub fn assert_array(
    body: &Value,
    path_expr: &str,
    rule: &ArrayAssertion,
) -> Result<(), AssertionError> {
    let value = path::extract_first(body, path_expr)?;
    let array = value.as_array().ok_or_else(|| AssertionError::NotAnArray {
        path: path_expr.to_string(),
        actual: KindTag::of(value).to_string(),
    })?;

    if let Some(expected_len) = rule.length {
        if array.len() != expected_len {
            return Err(AssertionError::LengthMismatch {
                path: path_expr.to_string(),
                expected: expected_len,
                actual: array.len(),
            });
        }
    }

    for item in &rule.contains {
        if !array_contains(array, item) {
            return Err(AssertionError::ContainmentFailure {
                path: path_expr.to_string(),
                item: item.clone(),
            });
        }
    }

    if let Some(match_rule) = &rule.match_rule {
        assert_array_matches(body, path_expr, |element| {
            element.get(&match_rule.field) == Some(&match_rule.value)
        })?;
    }

    debug!("array assertion passed: {}", path_expr);
    Ok(())
}

/// At least one element of the array at `path_expr` must satisfy the
/// supplied predicate.
pub fn assert_array_matches<F>(
    body: &Value,
    path_expr: &str,
    predicate: F,
) -> Result<(), AssertionError>
where
    F: Fn(&Value) -> bool,
{
    let value = path::extract_first(body, path_expr)?;
    let array = value.as_array().ok_or_else(|| AssertionError::NotAnArray {
        path: path_expr.to_string(),
        actual: KindTag::of(value).to_string(),
    })?;

    if !array.iter().any(predicate) {
        return Err(AssertionError::NoPredicateMatch {
            path: path_expr.to_string(),
        });
    }
    Ok(())
}

/// Full response-body structural check, rooted at `$`.
///
/// This is a subset comparison: every key present in `expected` must
/// be present in `actual` with an equal value; extra keys in
/// `actual` are permitted and ignored.
pub fn assert_response_body(
    actual: &Value,
    expected: &Value,
) -> Result<(), AssertionError> {
    compare_structural(expected, actual, "$")?;
    debug!("response body structural assertion passed");
    Ok(())
}

/// Recursive subset comparison reporting the exact failing location.
///
/// Type mismatches (expected object vs. actual scalar and the like)
/// are reported distinctly from value mismatches; both carry the
/// JSONPath-style location they occurred at.
fn compare_structural(
    expected: &Value,
    actual: &Value,
    at: &str,
) -> Result<(), AssertionError> {
    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            for (key, expected_value) in expected_map {
                let child = format!("{at}.{key}");
                match actual_map.get(key) {
                    Some(actual_value) => {
                        compare_structural(expected_value, actual_value, &child)?
                    }
                    None => {
                        return Err(AssertionError::MissingField { path: child });
                    }
                }
            }
            Ok(())
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if expected_items.len() != actual_items.len() {
                return Err(AssertionError::LengthMismatch {
                    path: at.to_string(),
                    expected: expected_items.len(),
                    actual: actual_items.len(),
                });
            }
            for (idx, (expected_item, actual_item)) in
                expected_items.iter().zip(actual_items).enumerate()
            {
                compare_structural(expected_item, actual_item, &format!("{at}[{idx}]"))?;
            }
            Ok(())
        }
        _ => {
            let expected_kind = KindTag::of(expected);
            let actual_kind = KindTag::of(actual);
            if expected_kind != actual_kind {
                return Err(AssertionError::TypeMismatch {
                    path: at.to_string(),
                    expected: expected_kind.to_string(),
                    actual: actual_kind.to_string(),
                });
            }
            if expected != actual {
                return Err(AssertionError::ValueMismatch {
                    path: at.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
            Ok(())
        }
    }
}

/// Scalars count as contained by direct membership; an object counts
/// as contained when some element carries every key of the expected
/// object with an equal value (extra element keys ignored).
fn array_contains(array: &[Value], item: &Value) -> bool {
    match item {
        Value::Object(expected_map) => array.iter().any(|element| {
            element.as_object().is_some_and(|element_map| {
                expected_map
                    .iter()
                    .all(|(key, value)| element_map.get(key) == Some(value))
            })
        }),
        _ => array.contains(item),
    }
}

/// Run every declared assertion kind as an independent guarded call
/// and collect all failures. `body` is `None` when the response did
/// not parse as JSON; body-dependent kinds then fail with a single
/// invalid-JSON diagnostic.
pub fn evaluate(
    expected: &Expected,
    status: u16,
    body: Option<&Value>,
) -> Vec<AssertionError> {
    let mut failures = Vec::new();

    if let Some(code) = expected.status_code {
        if let Err(err) = assert_status_code(code, status) {
            failures.push(err);
        }
    }

    let needs_body = !expected.contains_fields.is_empty()
        || !expected.field_values.is_empty()
        || !expected.field_types.is_empty()
        || !expected.array_assertions.is_empty()
        || expected.response_body.is_some();

    let body = match (body, needs_body) {
        (Some(body), _) => body,
        (None, true) => {
            failures.push(AssertionError::InvalidJson(
                "response body could not be parsed".to_string(),
            ));
            return failures;
        }
        (None, false) => return failures,
    };

    for field in &expected.contains_fields {
        if let Err(err) = assert_contains_field(body, field) {
            failures.push(err);
        }
    }

    for (path_expr, value) in &expected.field_values {
        if let Err(err) = assert_field_value(body, path_expr, value) {
            failures.push(err);
        }
    }

    for (path_expr, kind) in &expected.field_types {
        if let Err(err) = assert_field_type(body, path_expr, *kind) {
            failures.push(err);
        }
    }

    for (path_expr, rule) in &expected.array_assertions {
        if let Err(err) = assert_array(body, path_expr, rule) {
            failures.push(err);
        }
    }

    if let Some(template) = &expected.response_body {
        if let Err(err) = assert_response_body(body, template) {
            failures.push(err);
        }
    }

    failures
}
