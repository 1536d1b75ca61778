//! Raw HTTP response messages: `STATUS-LINE CRLF (Name: value CRLF)* CRLF BODY`.
//!
//! Only the numeric status code is read from the status line; the protocol
//! version and reason phrase are ignored. Bare LF line endings are accepted.

use super::spec::{BodySource, ResponseSpec};
use crate::error::ConstructionError;
use bytes::Bytes;
use hyper::http::{HeaderName, HeaderValue};
use hyper::HeaderMap;

const MAX_HEADER_COUNT: usize = 128;

pub(super) struct RawMessage {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Locate the blank line separating head from body.
///
/// Returns `(end_of_head, start_of_body)`; whichever of CRLF CRLF or LF LF
/// appears first wins.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = buf.windows(2).position(|w| w == b"\n\n");
    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => Some((l + 1, l + 2)),
        (Some(c), _) => Some((c + 2, c + 4)),
        (None, Some(l)) => Some((l + 1, l + 2)),
        (None, None) => None,
    }
}

fn parse_status_line(line: &[u8]) -> Result<u16, ConstructionError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| ConstructionError::MalformedMessage("status line is not UTF-8".into()))?;
    let line = line.trim_end_matches('\r');
    let mut parts = line.split_whitespace();
    let _version = parts.next();
    let code = parts.next().ok_or_else(|| {
        ConstructionError::MalformedMessage(format!("status line has no status code: {line:?}"))
    })?;
    if code.len() != 3 {
        return Err(ConstructionError::MalformedMessage(format!(
            "invalid status code {code:?}"
        )));
    }
    code.parse::<u16>()
        .map_err(|_| ConstructionError::MalformedMessage(format!("invalid status code {code:?}")))
}

pub(super) fn parse_raw_message(buf: &[u8]) -> Result<RawMessage, ConstructionError> {
    let (head_end, body_start) = find_head_end(buf).ok_or_else(|| {
        ConstructionError::MalformedMessage("no blank line between headers and body".into())
    })?;
    let head = &buf[..head_end];

    let status_end = head.iter().position(|b| *b == b'\n').unwrap_or(head.len());
    let status = parse_status_line(&head[..status_end])?;

    // header lines plus the terminating blank line, as httparse expects
    let header_block = &buf[(status_end + 1).min(head_end)..body_start];
    let mut storage = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
    let parsed = httparse::parse_headers(header_block, &mut storage)
        .map_err(|e| ConstructionError::MalformedMessage(format!("invalid header block: {e}")))?;
    let raw_headers = match parsed {
        httparse::Status::Complete((_, headers)) => headers,
        httparse::Status::Partial => {
            return Err(ConstructionError::MalformedMessage(
                "incomplete header block".into(),
            ))
        }
    };

    let mut headers = HeaderMap::with_capacity(raw_headers.len());
    for header in raw_headers {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
            ConstructionError::MalformedMessage(format!("invalid header name {:?}: {e}", header.name))
        })?;
        let value = HeaderValue::from_bytes(header.value).map_err(|e| {
            ConstructionError::MalformedMessage(format!("invalid value for {:?}: {e}", header.name))
        })?;
        headers.append(name, value);
    }

    Ok(RawMessage {
        status,
        headers,
        body: Bytes::copy_from_slice(&buf[body_start..]),
    })
}

impl ResponseSpec {
    /// Serialize back into the raw message format.
    ///
    /// Returns `None` for file and stream bodies, which would need I/O to inline.
    pub fn to_raw_message(&self) -> Option<Vec<u8>> {
        let body = match &self.body {
            BodySource::Bytes(bytes) => bytes,
            BodySource::File { .. } | BodySource::Stream { .. } => return None,
        };
        let mut out = Vec::with_capacity(64 + body.len());
        out.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        Some(out)
    }
}
