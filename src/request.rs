//! Bulk tracking request serialization.
//!
//! The batch goes out as one `POST` with a `{"requests":[...]}` body. Each
//! encoded visit already carries its own surrounding quotes; every visit after
//! the first is wrapped in one more pair. Collectors in the field accept this
//! layout, so it is kept byte for byte.

use crate::event::PendingEvent;

pub const USER_AGENT: &str = "C/1.0";

/// Build the JSON body for `batch`.
pub fn build_body(batch: &[PendingEvent]) -> String {
    let mut body = String::from("{\"requests\":[");
    if let Some((first, rest)) = batch.split_first() {
        body.push_str(first.as_str());
        for event in rest {
            body.push_str(",\"");
            body.push_str(event.as_str());
            body.push('"');
        }
    }
    body.push_str("]}");
    body
}

/// Build the full HTTP/1.1 request for `batch`.
pub fn build(batch: &[PendingEvent], endpoint: &str, host: &str) -> Vec<u8> {
    let body = build_body(batch);

    let mut request = String::with_capacity(body.len() + 256);
    request.push_str(&format!("POST {endpoint} HTTP/1.1\r\n"));
    request.push_str(&format!("Host: {host}\r\n"));
    request.push_str(&format!("User-Agent: {USER_AGENT}\r\n"));
    request.push_str("Content-Type: application/json; charset=utf-8\r\n");
    request.push_str("Accept: */*\r\n");
    request.push_str(&format!("Content-Length: {}\r\n", body.len()));
    request.push_str("Connection: close\r\n\r\n");
    request.push_str(&body);

    request.into_bytes()
}
