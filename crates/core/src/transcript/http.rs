use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::json;

/// Maximum number of headers parsed in a single message.
const MAX_HEADERS: usize = 64;

/// Byte range of a header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpan {
    /// Lowercase header name.
    pub name: String,
    /// Range of `name: value`, excluding the line break.
    pub range: Range<usize>,
}

/// Byte range of a JSON member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonSpan {
    /// Dotted path of the member, e.g. `data.items.0`.
    pub path: String,
    /// Range of the key-value pair for object members, or of the value for
    /// array elements.
    pub range: Range<usize>,
}

/// Semantic index of an HTTP message.
///
/// All ranges are absolute offsets into the data of the direction the
/// message was parsed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageIndex {
    info: Option<Range<usize>>,
    headers: Vec<HeaderSpan>,
    line_breaks: Vec<Range<usize>>,
    body: Option<Range<usize>>,
    json: Vec<JsonSpan>,
}

impl MessageIndex {
    /// Parses an HTTP request.
    pub fn parse_request(data: &[u8]) -> Result<Self, HttpParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);

        let head_len = match request.parse(data)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Err(HttpParseError::Incomplete),
        };

        Self::from_head(data, head_len, request.headers)
    }

    /// Parses an HTTP response.
    pub fn parse_response(data: &[u8]) -> Result<Self, HttpParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut headers);

        let head_len = match response.parse(data)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Err(HttpParseError::Incomplete),
        };

        Self::from_head(data, head_len, response.headers)
    }

    fn from_head(
        data: &[u8],
        head_len: usize,
        headers: &[httparse::Header<'_>],
    ) -> Result<Self, HttpParseError> {
        let head = &data[..head_len];

        let line_breaks: Vec<_> = crlf_positions(head).map(|pos| pos..pos + 2).collect();
        let info = line_breaks
            .first()
            .map(|crlf| 0..crlf.start)
            .filter(|range| !range.is_empty());

        let mut spans = Vec::with_capacity(headers.len());
        for header in headers {
            let start = offset_of(data, header.name.as_bytes()).ok_or(HttpParseError::Offset)?;
            let end = line_breaks
                .iter()
                .find(|crlf| crlf.start >= start)
                .map(|crlf| crlf.start)
                .ok_or(HttpParseError::Offset)?;

            spans.push(HeaderSpan {
                name: header.name.to_ascii_lowercase(),
                range: start..end,
            });
        }

        let body = (head_len < data.len()).then_some(head_len..data.len());

        let is_chunked = headers.iter().any(|header| {
            header.name.eq_ignore_ascii_case("transfer-encoding")
                && std::str::from_utf8(header.value)
                    .map(|value| value.to_ascii_lowercase().contains("chunked"))
                    .unwrap_or(false)
        });

        let json = match &body {
            Some(body) if !is_chunked && looks_like_json(&data[body.clone()]) => {
                json::index(&data[body.clone()], body.start).unwrap_or_else(|err| {
                    tracing::debug!("body is not indexable json: {err}");
                    Vec::new()
                })
            }
            _ => Vec::new(),
        };

        Ok(Self {
            info,
            headers: spans,
            line_breaks,
            body,
            json,
        })
    }

    /// Returns the range of the start line (request line or status line),
    /// excluding the line break.
    pub fn info(&self) -> Option<Range<usize>> {
        self.info.clone()
    }

    /// Returns all header spans in transcript order.
    pub fn headers(&self) -> &[HeaderSpan] {
        &self.headers
    }

    /// Returns the ranges of all headers with the given name, compared
    /// case-insensitively.
    pub fn headers_with_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = Range<usize>> + 'a {
        self.headers
            .iter()
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.range.clone())
    }

    /// Returns the ranges of every CRLF in the message head.
    pub fn line_breaks(&self) -> &[Range<usize>] {
        &self.line_breaks
    }

    /// Returns the range of the body, if any.
    pub fn body(&self) -> Option<Range<usize>> {
        self.body.clone()
    }

    /// Returns all JSON member spans, in document order.
    pub fn json(&self) -> &[JsonSpan] {
        &self.json
    }

    /// Returns the range of the JSON member at `path`.
    pub fn json_member(&self, path: &str) -> Option<Range<usize>> {
        self.json
            .iter()
            .find(|span| span.path == path)
            .map(|span| span.range.clone())
    }

    /// Returns whether the index contains no semantic ranges.
    pub fn is_empty(&self) -> bool {
        self.info.is_none() && self.headers.is_empty() && self.body.is_none()
    }
}

/// Error for [`MessageIndex`] parsing.
#[derive(Debug, thiserror::Error)]
pub enum HttpParseError {
    /// The data is not a valid HTTP message.
    #[error("invalid http message: {0}")]
    Invalid(#[from] httparse::Error),
    /// The message head is incomplete.
    #[error("incomplete http message head")]
    Incomplete,
    /// A parsed element could not be located in the data.
    #[error("parsed element is not contained in the message")]
    Offset,
}

fn crlf_positions(data: &[u8]) -> impl Iterator<Item = usize> + '_ {
    data.windows(2)
        .enumerate()
        .filter(|(_, window)| *window == b"\r\n")
        .map(|(pos, _)| pos)
}

/// Returns the offset of `part` within `data`, if `part` is a subslice of it.
fn offset_of(data: &[u8], part: &[u8]) -> Option<usize> {
    let start = (part.as_ptr() as usize).checked_sub(data.as_ptr() as usize)?;

    (start + part.len() <= data.len()).then_some(start)
}

fn looks_like_json(body: &[u8]) -> bool {
    matches!(
        body.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'{') | Some(b'[')
    )
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::fixtures::http::{request, response};

    fn slice(data: &[u8], range: Range<usize>) -> &str {
        std::str::from_utf8(&data[range]).unwrap()
    }

    #[test]
    fn test_parse_request_info_and_headers() {
        let data = request::GET_WITH_HEADER;
        let index = MessageIndex::parse_request(data).unwrap();

        assert_eq!(slice(data, index.info().unwrap()), "GET /api/widget HTTP/1.1");

        let host: Vec<_> = index.headers_with_name("Host").collect();
        assert_eq!(host.len(), 1);
        assert_eq!(slice(data, host[0].clone()), "host: example.test");

        let content_type: Vec<_> = index.headers_with_name("content-type").collect();
        assert_eq!(
            slice(data, content_type[0].clone()),
            "content-type: application/json"
        );

        assert!(index.body().is_none());
    }

    #[test]
    fn test_parse_request_line_breaks() {
        let data = request::GET_WITH_HEADER;
        let index = MessageIndex::parse_request(data).unwrap();

        // One per header line, one for the start line and one ending the head.
        assert_eq!(index.line_breaks().len(), index.headers().len() + 2);
        for range in index.line_breaks() {
            assert_eq!(&data[range.clone()], b"\r\n");
        }
    }

    #[test]
    fn test_parse_response_json_body() {
        let data = response::OK_JSON;
        let index = MessageIndex::parse_response(data).unwrap();

        assert_eq!(slice(data, index.info().unwrap()), "HTTP/1.1 200 OK");

        let body = index.body().unwrap();
        assert!(slice(data, body).starts_with('{'));

        assert_eq!(
            slice(data, index.json_member("name").unwrap()),
            "\"name\": \"sprocket\""
        );
        assert_eq!(
            slice(data, index.json_member("dimensions.width").unwrap()),
            "\"width\": 12"
        );
        assert_eq!(slice(data, index.json_member("tags.1").unwrap()), "\"blue\"");
    }

    #[test]
    fn test_parse_post_with_json_body() {
        let data = request::POST_JSON;
        let index = MessageIndex::parse_request(data).unwrap();

        assert!(index.json_member("quantity").is_some());
        assert_eq!(index.headers_with_name("content-length").count(), 1);
    }

    #[rstest]
    #[case::garbage(b"\x00\x01\x02")]
    #[case::incomplete(b"GET / HTTP/1.1\r\nhost: example.test\r\n")]
    fn test_parse_request_invalid(#[case] data: &[u8]) {
        assert!(MessageIndex::parse_request(data).is_err());
    }

    #[test]
    fn test_repeated_headers() {
        let data = b"HTTP/1.1 200 OK\r\nset-cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n";
        let index = MessageIndex::parse_response(data).unwrap();

        let ranges: Vec<_> = index.headers_with_name("set-cookie").collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(slice(data, ranges[1].clone()), "Set-Cookie: b=2");
    }
}
