use chrono::{DateTime, Utc};

/// RFC 7231 `Date` header value.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Wrap a body into a complete HTTP/1.1 response, for transports that carry
/// whole responses as opaque bytes. `Content-Length` and `Date` are computed.
pub fn frame_http_response(
    status: u16,
    headers: &[(String, String)],
    body: &[u8],
    now: DateTime<Utc>,
) -> Vec<u8> {
    let reason = axum::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");

    let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason);
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("date") {
            continue;
        }
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str(&format!("Date: {}\r\n\r\n", http_date(now)));

    let mut framed = head.into_bytes();
    framed.extend_from_slice(body);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(http_date(now), "Tue, 05 Mar 2024 07:08:09 GMT");
    }

    #[test]
    fn test_frame_computes_length_and_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let headers = vec![
            ("Content-Type".to_string(), "multipart/mixed".to_string()),
            ("Content-Length".to_string(), "999".to_string()),
        ];
        let framed = frame_http_response(200, &headers, b"hello", now);
        let text = String::from_utf8(framed).unwrap();

        assert_eq!(
            text,
            "HTTP/1.1 200 OK\r\nContent-Type: multipart/mixed\r\nContent-Length: 5\r\nDate: Tue, 05 Mar 2024 07:08:09 GMT\r\n\r\nhello"
        );
    }

    #[test]
    fn test_frame_not_modified_has_empty_body() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let text = String::from_utf8(frame_http_response(304, &[], b"", now)).unwrap();
        assert!(text.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
