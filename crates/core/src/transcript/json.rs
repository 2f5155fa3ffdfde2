//! Span indexing of JSON documents.
//!
//! Documents are parsed with `spansy`, and every object member and array
//! element is recorded under its dotted path. Keys containing a `.` can not be
//! told apart from nested paths, so they are left out of the index together
//! with everything below them.

use std::ops::Range;

use rangeset::RangeSet;
use spansy::{
    json::{self, JsonValue},
    Spanned,
};

use super::http::JsonSpan;

#[derive(Debug, thiserror::Error)]
#[error("json index error: {0}")]
pub(crate) struct JsonIndexError(String);

/// Indexes the members of the JSON document in `data`.
///
/// Returned ranges are shifted by `offset`.
pub(crate) fn index(data: &[u8], offset: usize) -> Result<Vec<JsonSpan>, JsonIndexError> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);

    let value =
        json::parse_slice(&data[start..end]).map_err(|err| JsonIndexError(err.to_string()))?;

    let mut spans = Vec::new();
    visit(&value, "", offset + start, &mut spans);

    Ok(spans)
}

fn visit(value: &JsonValue, path: &str, offset: usize, spans: &mut Vec<JsonSpan>) {
    match value {
        JsonValue::Object(object) => {
            for kv in &object.elems {
                let key = kv.key.span().as_str().trim_matches('"');
                if key.contains('.') {
                    continue;
                }

                let child = child_path(path, key);
                if let Some(range) = bounds(&kv.without_separator()) {
                    push(spans, child.clone(), range, offset);
                }

                visit(&kv.value, &child, offset, spans);
            }
        }
        JsonValue::Array(array) => {
            for (idx, elem) in array.elems.iter().enumerate() {
                let child = child_path(path, &idx.to_string());
                if let Some(range) = value_range(elem) {
                    push(spans, child.clone(), range, offset);
                }

                visit(elem, &child, offset, spans);
            }
        }
        _ => {}
    }
}

/// Returns the range of a value, including the quotes of strings.
fn value_range(value: &JsonValue) -> Option<Range<usize>> {
    let range = bounds(value.span().indices())?;

    match value {
        JsonValue::String(_) => Some(range.start.checked_sub(1)?..range.end + 1),
        _ => Some(range),
    }
}

fn bounds(indices: &RangeSet<usize>) -> Option<Range<usize>> {
    Some(indices.min()?..indices.end()?)
}

fn push(spans: &mut Vec<JsonSpan>, path: String, range: Range<usize>, offset: usize) {
    spans.push(JsonSpan {
        path,
        range: offset + range.start..offset + range.end,
    });
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn member<'a>(data: &'a str, spans: &[JsonSpan], path: &str) -> &'a str {
        let span = spans.iter().find(|span| span.path == path).unwrap();
        &data[span.range.clone()]
    }

    #[test]
    fn test_index_nested() {
        let data = r#"{"a": 1, "b": {"c": "x\"y", "d": [true, null, {"e": -1.5e3}]}}"#;
        let spans = index(data.as_bytes(), 0).unwrap();

        assert_eq!(member(data, &spans, "a"), r#""a": 1"#);
        assert_eq!(member(data, &spans, "b.c"), r#""c": "x\"y""#);
        assert_eq!(member(data, &spans, "b.d.0"), "true");
        assert_eq!(member(data, &spans, "b.d.1"), "null");
        assert_eq!(member(data, &spans, "b.d.2.e"), r#""e": -1.5e3"#);
    }

    #[test]
    fn test_index_string_elements() {
        let data = r#"{"tags": ["red", "blue"]}"#;
        let spans = index(data.as_bytes(), 0).unwrap();

        assert_eq!(member(data, &spans, "tags.1"), r#""blue""#);
    }

    #[test]
    fn test_index_offset() {
        let data = br#"{"k":"v"}"#;
        let spans = index(data, 100).unwrap();

        assert_eq!(spans[0].range, 101..108);
    }

    #[test]
    fn test_index_surrounding_whitespace() {
        let data = "\r\n  {\"k\": 1}\n";
        let spans = index(data.as_bytes(), 0).unwrap();

        assert_eq!(member(data, &spans, "k"), r#""k": 1"#);
    }

    #[test]
    fn test_index_document_order() {
        let data = r#"{"z": 0, "a": 1}"#;
        let spans = index(data.as_bytes(), 0).unwrap();

        let paths: Vec<_> = spans.iter().map(|span| span.path.as_str()).collect();
        assert_eq!(paths, ["z", "a"]);
    }

    #[test]
    fn test_index_skips_dotted_keys() {
        let data = r#"{"a.b": 1, "a": {"b": 2}}"#;
        let spans = index(data.as_bytes(), 0).unwrap();

        let matches: Vec<_> = spans.iter().filter(|span| span.path == "a.b").collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(member(data, &spans, "a.b"), r#""b": 2"#);
    }

    #[rstest]
    #[case::unterminated(r#"{"a": "b"#)]
    #[case::missing_colon(r#"{"a" 1}"#)]
    #[case::bad_literal(r#"{"a": tru}"#)]
    #[case::empty("")]
    fn test_index_invalid(#[case] data: &str) {
        assert!(index(data.as_bytes(), 0).is_err());
    }
}
