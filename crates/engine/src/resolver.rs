//! Dependent-string parsing and resolution.
//!
//! A dependent string is a literal that may contain `${{ … }}`
//! placeholders of one of two shapes:
//!   - `id.outputs.field`  — the output field `field` of state `id`.
//!   - `store.key`         — the run's store entry for `key`.
//!
//! Parsing never touches the database; resolution is handed a pair of
//! lookup closures so it can be used both at template-validation time
//! (checking a placeholder exists) and at materialization time (fetching
//! the actual value).

use std::fmt;

use crate::error::EngineError;

/// What a single placeholder refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderRef {
    Output { identifier: String, field: String },
    Store { key: String },
}

impl fmt::Display for PlaceholderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output { identifier, field } => write!(f, "{identifier}.outputs.{field}"),
            Self::Store { key } => write!(f, "store.{key}"),
        }
    }
}

/// One placeholder plus the literal text that follows it (up to the next
/// placeholder, or the end of the string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub reference: PlaceholderRef,
    pub tail: String,
}

/// A fully parsed dependent string: literal prefix, then an ordered list of
/// placeholder segments. The resolved value is `head · (value · tail)*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentString {
    pub head: String,
    pub segments: Vec<Segment>,
}

impl DependentString {
    /// The distinct `(identifier, field)` pairs this string depends on —
    /// used by the graph validator for ancestor-reachability checks.
    pub fn output_references(&self) -> Vec<(&str, &str)> {
        self.segments
            .iter()
            .filter_map(|s| match &s.reference {
                PlaceholderRef::Output { identifier, field } => {
                    Some((identifier.as_str(), field.as_str()))
                }
                PlaceholderRef::Store { .. } => None,
            })
            .collect()
    }

    /// The distinct store keys this string depends on.
    pub fn store_references(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match &s.reference {
                PlaceholderRef::Store { key } => Some(key.as_str()),
                PlaceholderRef::Output { .. } => None,
            })
            .collect()
    }
}

/// Parse a literal into head + segments. A literal with no `${{ }}`
/// produces an empty segment list.
pub fn parse(literal: &str) -> Result<DependentString, EngineError> {
    const OPEN: &str = "${{";
    const CLOSE: &str = "}}";

    let mut head = String::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut cursor = literal;

    loop {
        match cursor.find(OPEN) {
            None => {
                push_literal(&mut head, &mut segments, cursor);
                break;
            }
            Some(open_idx) => {
                push_literal(&mut head, &mut segments, &cursor[..open_idx]);

                let after_open = &cursor[open_idx + OPEN.len()..];
                let close_idx = after_open.find(CLOSE).ok_or_else(|| {
                    EngineError::MalformedDependentString(format!(
                        "unterminated placeholder in: {literal}"
                    ))
                })?;

                let inner_raw = &after_open[..close_idx];
                if inner_raw.contains(OPEN) {
                    return Err(EngineError::MalformedDependentString(format!(
                        "unbalanced '${{{{' in: {literal}"
                    )));
                }

                let reference = parse_placeholder(inner_raw.trim(), literal)?;
                segments.push(Segment {
                    reference,
                    tail: String::new(),
                });

                cursor = &after_open[close_idx + CLOSE.len()..];
            }
        }
    }

    Ok(DependentString { head, segments })
}

/// Append literal text either to `head` (no placeholder seen yet) or to the
/// tail of the last-opened segment.
fn push_literal(head: &mut String, segments: &mut [Segment], text: &str) {
    if let Some(last) = segments.last_mut() {
        last.tail.push_str(text);
    } else {
        head.push_str(text);
    }
}

fn parse_placeholder(inner: &str, literal: &str) -> Result<PlaceholderRef, EngineError> {
    let parts: Vec<&str> = inner.split('.').map(str::trim).collect();
    match parts.as_slice() {
        [identifier, "outputs", field]
            if !identifier.is_empty() && !field.is_empty() =>
        {
            Ok(PlaceholderRef::Output {
                identifier: identifier.to_string(),
                field: field.to_string(),
            })
        }
        ["store", key] if !key.is_empty() => Ok(PlaceholderRef::Store {
            key: key.to_string(),
        }),
        _ => Err(EngineError::MalformedDependentString(format!(
            "placeholder '{inner}' in '{literal}' is neither 'id.outputs.field' nor 'store.key'"
        ))),
    }
}

/// Resolve a parsed dependent string to its final value, given closures
/// that answer "what is `identifier`'s output `field`?" and "what is the
/// store's value for `key`?". Either closure returning `None` resolves to
/// an `UnresolvedPlaceholder` error naming the offending reference.
pub fn resolve(
    parsed: &DependentString,
    mut lookup_output: impl FnMut(&str, &str) -> Option<String>,
    mut lookup_store: impl FnMut(&str) -> Option<String>,
) -> Result<String, EngineError> {
    let mut out = parsed.head.clone();
    for segment in &parsed.segments {
        let value = match &segment.reference {
            PlaceholderRef::Output { identifier, field } => {
                lookup_output(identifier, field).ok_or_else(|| {
                    EngineError::UnresolvedPlaceholder(segment.reference.to_string())
                })?
            }
            PlaceholderRef::Store { key } => lookup_store(key).ok_or_else(|| {
                EngineError::UnresolvedPlaceholder(segment.reference.to_string())
            })?,
        };
        out.push_str(&value);
        out.push_str(&segment.tail);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_with_no_placeholders() {
        let parsed = parse("just text").unwrap();
        assert_eq!(parsed.head, "just text");
        assert!(parsed.segments.is_empty());
    }

    #[test]
    fn parses_single_output_placeholder() {
        let parsed = parse("${{ a.outputs.url }}").unwrap();
        assert_eq!(parsed.head, "");
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(
            parsed.segments[0].reference,
            PlaceholderRef::Output {
                identifier: "a".into(),
                field: "url".into()
            }
        );
        assert_eq!(parsed.segments[0].tail, "");
    }

    #[test]
    fn parses_store_placeholder_with_surrounding_text() {
        let parsed = parse("${{ store.region }}-${{ store.tier }}").unwrap();
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(
            parsed.segments[0].reference,
            PlaceholderRef::Store { key: "region".into() }
        );
        assert_eq!(parsed.segments[0].tail, "-");
        assert_eq!(
            parsed.segments[1].reference,
            PlaceholderRef::Store { key: "tier".into() }
        );
    }

    #[test]
    fn resolves_store_defaults_example() {
        let parsed = parse("${{ store.region }}-${{ store.tier }}").unwrap();
        let resolved = resolve(
            &parsed,
            |_, _| None,
            |key| match key {
                "region" => Some("eu".to_string()),
                "tier" => Some("standard".to_string()),
                _ => None,
            },
        )
        .unwrap();
        assert_eq!(resolved, "eu-standard");
    }

    #[test]
    fn unterminated_placeholder_is_malformed() {
        assert!(matches!(
            parse("${{ a.outputs.url"),
            Err(EngineError::MalformedDependentString(_))
        ));
    }

    #[test]
    fn unrecognized_shape_is_malformed() {
        assert!(matches!(
            parse("${{ a.b.c.d }}"),
            Err(EngineError::MalformedDependentString(_))
        ));
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let parsed = parse("${{ a.outputs.missing }}").unwrap();
        let err = resolve(&parsed, |_, _| None, |_| None).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedPlaceholder(_)));
    }
}
