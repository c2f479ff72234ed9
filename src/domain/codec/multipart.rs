use bytes::{BufMut, Bytes, BytesMut};

use crate::domain::errors::DomainError;

/// Boundary shared by the service, its devices and the upstream mutator.
pub const MULTIPART_BOUNDARY: &str = "48ak7ccb9mwm26sa2uoavaat";

pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

const CRLF: &[u8] = b"\r\n";
const NAMESPACE_HEADER: &str = "namespace";
const ETAG_HEADER: &str = "etag";

/// One `(name, version, payload)` part of a multipart document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub version: String,
    pub payload: Bytes,
}

impl MultipartPart {
    pub fn new(name: impl Into<String>, version: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            payload: payload.into(),
        }
    }
}

/// `Content-Type` value announcing the fixed boundary.
pub fn multipart_content_type() -> String {
    format!("multipart/mixed; boundary={}", MULTIPART_BOUNDARY)
}

/// Extract the `boundary` parameter of a multipart content type.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Encode parts into a `multipart/mixed` body using the fixed boundary.
pub fn encode(parts: &[MultipartPart]) -> Bytes {
    let delimiter = format!("--{}", MULTIPART_BOUNDARY);
    let capacity = parts
        .iter()
        .map(|p| p.payload.len() + p.name.len() + p.version.len() + 128)
        .sum::<usize>()
        + delimiter.len()
        + 4;

    let mut buf = BytesMut::with_capacity(capacity);
    for part in parts {
        buf.put_slice(delimiter.as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(format!("Content-Type: {}", MSGPACK_CONTENT_TYPE).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(format!("Namespace: {}", part.name).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(format!("Etag: {}", part.version).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(CRLF);
        buf.put_slice(&part.payload);
        buf.put_slice(CRLF);
    }
    buf.put_slice(delimiter.as_bytes());
    buf.put_slice(b"--");
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Decode a body produced with the fixed boundary.
pub fn decode(body: &[u8]) -> Result<Vec<MultipartPart>, DomainError> {
    decode_with_boundary(body, MULTIPART_BOUNDARY)
}

/// Decode a `multipart/mixed` body.
///
/// Parts without a `Namespace` header are skipped; a missing `Etag` yields an
/// empty version. Only a broken envelope is an error.
pub fn decode_with_boundary(body: &[u8], boundary: &str) -> Result<Vec<MultipartPart>, DomainError> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut inner_delimiter = CRLF.to_vec();
    inner_delimiter.extend_from_slice(delimiter);

    let start = find(body, delimiter, 0)
        .ok_or_else(|| DomainError::MalformedMultipart("missing opening boundary".to_string()))?;
    let mut pos = start + delimiter.len();
    let mut parts = Vec::new();

    loop {
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        pos = skip_line_break(body, pos).ok_or_else(|| {
            DomainError::MalformedMultipart("boundary not followed by a line break".to_string())
        })?;

        let end = find(body, &inner_delimiter, pos)
            .ok_or_else(|| DomainError::MalformedMultipart("unterminated part".to_string()))?;

        if let Some(part) = parse_part(&body[pos..end]) {
            parts.push(part);
        }
        pos = end + inner_delimiter.len();
    }
}

fn parse_part(raw: &[u8]) -> Option<MultipartPart> {
    let (header_block, payload) = if raw.starts_with(CRLF) {
        (&raw[..0], &raw[CRLF.len()..])
    } else {
        let split = find(raw, b"\r\n\r\n", 0)?;
        (&raw[..split], &raw[split + 4..])
    };

    let headers = String::from_utf8_lossy(header_block);
    let mut name = None;
    let mut version = String::new();
    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        match key.as_str() {
            NAMESPACE_HEADER => name = Some(value.trim().to_string()),
            ETAG_HEADER => version = value.trim().trim_matches('"').to_string(),
            _ => {}
        }
    }

    let name = name.filter(|n| !n.is_empty())?;
    Some(MultipartPart {
        name,
        version,
        payload: Bytes::copy_from_slice(payload),
    })
}

fn skip_line_break(body: &[u8], pos: usize) -> Option<usize> {
    let rest = &body[pos..];
    if rest.starts_with(CRLF) {
        Some(pos + 2)
    } else if rest.starts_with(b"\n") {
        Some(pos + 1)
    } else {
        None
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}
