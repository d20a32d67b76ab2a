//! # Reply Encoding
//!
//! Encodes evaluator results as RESP2 replies. Requests are read as plain
//! whitespace-tokenized lines (see [`crate::connection`]), but replies go
//! out in RESP so any off-the-shelf Redis client library can read them.

use bytes::Bytes;

/// Appends a RESP Simple String (`+OK\r\n`) to `out`.
pub fn simple(out: &mut Vec<u8>, text: &str) {
    out.push(b'+');
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Appends a RESP Error (`-WRONGTYPE ...\r\n`) to `out`.
pub fn error(out: &mut Vec<u8>, text: &str) {
    out.push(b'-');
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Appends a RESP Integer (`:42\r\n`) to `out`.
pub fn integer(out: &mut Vec<u8>, value: i64) {
    out.push(b':');
    out.extend_from_slice(value.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Appends a RESP Bulk String to `out`, or the null bulk string if `value`
/// is `None`.
pub fn bulk(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            out.push(b'$');
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
        }
        None => null_bulk(out),
    }
}

/// Appends the RESP null bulk string (`$-1\r\n`) to `out`.
pub fn null_bulk(out: &mut Vec<u8>) {
    out.extend_from_slice(b"$-1\r\n");
}

/// Appends a RESP Array of bulk strings to `out`.
pub fn array(out: &mut Vec<u8>, items: &[Bytes]) {
    out.push(b'*');
    out.extend_from_slice(items.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    for item in items {
        bulk(out, Some(item));
    }
}

/// Appends the RESP Array framing a pub/sub message to `out`: `["message",
/// topic, payload]`, mirroring the three-element array real Redis clients
/// expect for subscription pushes.
pub fn pubsub_message(out: &mut Vec<u8>, topic: &str, payload: &[u8]) {
    out.extend_from_slice(b"*3\r\n");
    bulk(out, Some(b"message"));
    bulk(out, Some(topic.as_bytes()));
    bulk(out, Some(payload));
}

/// Appends the RESP Array confirming a subscription: `["subscribe", topic,
/// 1]`, with the trailing element as a RESP Integer rather than a bulk
/// string.
pub fn subscribe_confirmation(out: &mut Vec<u8>, topic: &str) {
    out.extend_from_slice(b"*3\r\n");
    bulk(out, Some(b"subscribe"));
    bulk(out, Some(topic.as_bytes()));
    integer(out, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_simple() {
        let mut out = Vec::new();
        simple(&mut out, "OK");
        assert_eq!(out, b"+OK\r\n");
    }

    #[test]
    fn encodes_error() {
        let mut out = Vec::new();
        error(&mut out, "WRONGTYPE bad");
        assert_eq!(out, b"-WRONGTYPE bad\r\n");
    }

    #[test]
    fn encodes_integer() {
        let mut out = Vec::new();
        integer(&mut out, -3);
        assert_eq!(out, b":-3\r\n");
    }

    #[test]
    fn encodes_bulk_and_null() {
        let mut out = Vec::new();
        bulk(&mut out, Some(b"hi"));
        bulk(&mut out, None);
        assert_eq!(out, b"$2\r\nhi\r\n$-1\r\n");
    }

    #[test]
    fn encodes_array() {
        let mut out = Vec::new();
        array(&mut out, &[Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert_eq!(out, b"*2\r\n$1\r\na\r\n$1\r\nb\r\n");
    }

    #[test]
    fn encodes_pubsub_message() {
        let mut out = Vec::new();
        pubsub_message(&mut out, "news", b"hi");
        assert_eq!(out, b"*3\r\n$7\r\nmessage\r\n$4\r\nnews\r\n$2\r\nhi\r\n");
    }

    #[test]
    fn encodes_subscribe_confirmation() {
        let mut out = Vec::new();
        subscribe_confirmation(&mut out, "news");
        assert_eq!(out, b"*3\r\n$9\r\nsubscribe\r\n$4\r\nnews\r\n:1\r\n");
    }
}
