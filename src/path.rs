//! Path-expression extraction over JSON documents.
//!
//! Two surface dialects are accepted and unified into one segment
//! list before evaluation:
//!
//! - legacy dotted form: `a.b.c` (numeric segments index arrays)
//! - root-anchored form: `$.a.b[0].c`
//!
//! Malformed expressions are a configuration bug and fail with
//! [`PathError::Syntax`]. A well-formed path that resolves nowhere
//! yields an empty match set, not an error; callers that require a
//! match use [`extract_first`].

use crate::error::PathError;
use serde_json::Value;

/// One step of a parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse a path expression in either dialect into segments.
pub fn parse(expr: &str) -> Result<Vec<Segment>, PathError> {
    if expr.trim().is_empty() {
        return Err(syntax(expr, "empty expression"));
    }
    if let Some(rest) = expr.strip_prefix('$') {
        parse_rooted(expr, rest)
    } else {
        parse_dotted(expr)
    }
}

/// Extract every value matched by `expr` in `document`.
///
/// The result is ordered and possibly empty; with the supported
/// wildcard-free dialects it holds at most one value. How many
/// matches are required is the caller's decision.
pub fn extract<'a>(
    document: &'a Value,
    expr: &str,
) -> Result<Vec<&'a Value>, PathError> {
    let segments = parse(expr)?;
    let mut current = document;

    for segment in &segments {
        let next = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            // Legacy dotted paths address array elements with a
            // numeric segment.
            (Segment::Key(key), Value::Array(array)) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| array.get(idx)),
            (Segment::Index(idx), Value::Array(array)) => array.get(*idx),
            _ => None,
        };

        match next {
            Some(value) => current = value,
            None => return Ok(Vec::new()),
        }
    }

    Ok(vec![current])
}

/// Extract the first match of `expr`, failing with
/// [`PathError::NoMatch`] when the match set is empty.
pub fn extract_first<'a>(
    document: &'a Value,
    expr: &str,
) -> Result<&'a Value, PathError> {
    extract(document, expr)?
        .into_iter()
        .next()
        .ok_or_else(|| PathError::NoMatch {
            path: expr.to_string(),
        })
}

fn syntax(expr: &str, reason: &str) -> PathError {
    PathError::Syntax {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_dotted(expr: &str) -> Result<Vec<Segment>, PathError> {
    let mut segments = Vec::new();
    for part in expr.split('.') {
        if part.is_empty() {
            return Err(syntax(expr, "empty segment"));
        }
        segments.push(Segment::Key(part.to_string()));
    }
    Ok(segments)
}

/// Parse the root-anchored form: `$`, then any sequence of `.key`
/// and `[index]`.
fn parse_rooted(expr: &str, rest: &str) -> Result<Vec<Segment>, PathError> {
    let mut segments = Vec::new();
    let mut chars = rest.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                let mut key = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '.' || next == '[' {
                        break;
                    }
                    key.push(next);
                    chars.next();
                }
                if key.is_empty() {
                    return Err(syntax(expr, "empty key after '.'"));
                }
                segments.push(Segment::Key(key));
            }
            '[' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        Some(other) => {
                            return Err(syntax(
                                expr,
                                &format!("unexpected '{other}' inside brackets"),
                            ));
                        }
                        None => {
                            return Err(syntax(expr, "unterminated '['"));
                        }
                    }
                }
                let idx = digits.parse::<usize>().map_err(|_| {
                    syntax(expr, "empty or invalid array index")
                })?;
                segments.push(Segment::Index(idx));
            }
            other => {
                return Err(syntax(
                    expr,
                    &format!("unexpected '{other}' after '$'"),
                ));
            }
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "data": {
                "user": {"id": 42, "name": "alice"},
                "items": [
                    {"id": "item-1"},
                    {"id": "item-2"}
                ]
            },
            "token": "abc123"
        })
    }

    #[test]
    fn dotted_path_reaches_nested_scalar() {
        let d = doc();
        let matches = extract(&d, "data.user.id").unwrap();
        assert_eq!(matches, vec![&json!(42)]);
    }

    #[test]
    fn dotted_numeric_segment_indexes_arrays() {
        let d = doc();
        let matches = extract(&d, "data.items.1.id").unwrap();
        assert_eq!(matches, vec![&json!("item-2")]);
    }

    #[test]
    fn rooted_path_with_brackets() {
        let d = doc();
        let matches = extract(&d, "$.data.items[0].id").unwrap();
        assert_eq!(matches, vec![&json!("item-1")]);
    }

    #[test]
    fn root_alone_matches_whole_document() {
        let d = doc();
        let matches = extract(&d, "$").unwrap();
        assert_eq!(matches, vec![&d]);
    }

    #[test]
    fn missing_path_yields_empty_not_error() {
        assert!(extract(&doc(), "data.missing.key").unwrap().is_empty());
        assert!(extract(&doc(), "$.data.items[9]").unwrap().is_empty());
    }

    #[test]
    fn descending_into_scalar_yields_empty() {
        assert!(extract(&doc(), "token.inner").unwrap().is_empty());
    }

    #[test]
    fn malformed_expressions_are_syntax_errors() {
        for expr in ["", "a..b", ".a", "a.", "$.a[", "$.a[x]", "$.a[]", "$a", "$."] {
            match parse(expr) {
                Err(PathError::Syntax { .. }) => {}
                other => panic!("expected syntax error for '{expr}', got {other:?}"),
            }
        }
    }

    #[test]
    fn extract_first_requires_a_match() {
        assert_eq!(extract_first(&doc(), "token").unwrap(), &json!("abc123"));

        let err = extract_first(&doc(), "$.nope").unwrap_err();
        assert_eq!(
            err,
            PathError::NoMatch {
                path: "$.nope".into()
            }
        );
    }

    #[test]
    fn both_dialects_agree_on_the_same_location() {
        let d = doc();
        assert_eq!(
            extract(&d, "data.user.name").unwrap(),
            extract(&d, "$.data.user.name").unwrap()
        );
    }
}
