//! # Connection Handling
//!
//! Reads whitespace-tokenized, newline-terminated request lines from a
//! client socket, dispatches each through [`eval::dispatch`], and writes
//! back the RESP reply. A successful write command is appended to the
//! append-only log only after the store has already applied it — the
//! durability gate described in [`fkv_engine::aol`].
//!
//! `SUBSCRIBE` permanently switches a connection into push mode: once
//! entered, the loop stops reading further commands from the socket and
//! instead forwards published messages until the client disconnects,
//! matching how a real pub/sub client behaves (it gives up its request
//! turn once subscribed).

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use fkv_engine::{Aol, Broker, Store};

use crate::eval::{self, Outcome};
use crate::metrics::Metrics;
use crate::resp;

/// Shared state every connection needs a handle to.
pub struct Shared {
    pub store: Arc<Store>,
    pub broker: Arc<Broker>,
    pub aol: Option<Arc<Aol>>,
    pub metrics: Arc<Metrics>,
}

/// Drives one client connection end-to-end until disconnect or error.
pub async fn handle_connection(stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let mut stream = stream;
    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        let Some(line) = read_line(&mut stream, &mut buffer).await? else {
            return Ok(());
        };

        if line.is_empty() {
            continue;
        }

        let tokens = tokenize(&line);
        if tokens.is_empty() {
            continue;
        }

        shared.metrics.record_request_start();
        let started = std::time::Instant::now();

        let is_write = eval::is_write_op(&tokens[0].to_ascii_uppercase());
        let outcome = eval::dispatch(&tokens, &shared.store, &shared.broker, &shared.metrics);

        match outcome {
            Outcome::Reply(reply) => {
                let is_error = reply.first() == Some(&b'-');
                if is_error {
                    shared.metrics.record_error();
                } else if is_write {
                    if let Some(aol) = &shared.aol {
                        if let Err(err) = aol.append(&line) {
                            tracing::warn!(error = %err, "failed to append to log");
                        }
                    }
                }
                shared.metrics.record_request_end(started.elapsed());
                stream.write_all(&reply).await?;
            }
            Outcome::EnterSubscribeMode { topic, id, mut subscription } => {
                shared.metrics.record_request_end(started.elapsed());
                let mut confirm = Vec::new();
                resp::subscribe_confirmation(&mut confirm, &topic);
                stream.write_all(&confirm).await?;

                while let Some(payload) = subscription.recv().await {
                    let mut out = Vec::new();
                    resp::pubsub_message(&mut out, &topic, &payload);
                    if stream.write_all(&out).await.is_err() {
                        break;
                    }
                }

                shared.broker.unsubscribe(&topic, id);
                return Ok(());
            }
        }
    }
}

/// Splits a request line on ASCII whitespace into owned `Bytes` tokens.
///
/// Shared with log replay at startup, which applies the exact same
/// tokenizer to each stored line before re-dispatching it.
pub fn tokenize(line: &[u8]) -> Vec<Bytes> {
    line.split(|&b| b == b' ' || b == b'\t')
        .filter(|token| !token.is_empty())
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Reads one `\n`-terminated line from `stream`, buffering leftovers in
/// `buffer` across calls. Returns `Ok(None)` on clean EOF with no partial
/// line pending.
async fn read_line(stream: &mut TcpStream, buffer: &mut BytesMut) -> std::io::Result<Option<Vec<u8>>> {
    loop {
        if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let mut line = buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            return Ok(Some(line.to_vec()));
        }

        let read = stream.read_buf(buffer).await?;
        if read == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            let line = buffer.split_to(buffer.len()).to_vec();
            return Ok(Some(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_whitespace() {
        let tokens = tokenize(b"SET  key   value");
        assert_eq!(
            tokens,
            vec![Bytes::from_static(b"SET"), Bytes::from_static(b"key"), Bytes::from_static(b"value")]
        );
    }

    #[test]
    fn tokenize_empty_line_yields_nothing() {
        assert!(tokenize(b"").is_empty());
        assert!(tokenize(b"   ").is_empty());
    }
}
