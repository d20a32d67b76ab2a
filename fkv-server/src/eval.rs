//! # Command Evaluator
//!
//! Parses a tokenized request line and applies it against the [`Store`] and
//! [`Broker`], producing a RESP reply. This is the single place that knows
//! both the command surface and how each command's errors map onto RESP.
//!
//! Arity and unknown-command errors never touch the store, so they can
//! never be mistaken for a write worth persisting; see
//! [`is_write_op`] for the predicate the connection loop uses to decide
//! what to hand the append-only log.

use bytes::Bytes;

use fkv_common::FkvError;
use fkv_common::duration::parse_duration;
use fkv_engine::{Broker, Store, Subscription, SubscriptionId};

use crate::metrics::Metrics;
use crate::resp;

/// Result of dispatching one request line.
pub enum Outcome {
    /// A complete RESP reply ready to write back to the client.
    Reply(Vec<u8>),
    /// The client issued `SUBSCRIBE`; the connection loop should stop
    /// reading further commands on this socket and instead forward
    /// messages from `subscription` until the client disconnects.
    EnterSubscribeMode {
        topic: String,
        id: SubscriptionId,
        subscription: Subscription,
    },
}

/// True if `cmd_name` (already uppercased) is a command that mutates the
/// store and therefore belongs in the append-only log once it succeeds.
///
/// `PUBLISH` is deliberately excluded: it fans a message out to current
/// subscribers but changes nothing a replay needs to reconstruct.
pub fn is_write_op(cmd_name: &[u8]) -> bool {
    matches!(
        cmd_name,
        b"SET" | b"DEL" | b"HSET" | b"LPUSH" | b"LPOP" | b"SADD"
    )
}

/// Dispatches one already-tokenized request line.
///
/// `tokens[0]` is the command name; RESP-reply errors (wrong arity,
/// unknown command, `WRONGTYPE`) are encoded here rather than propagated,
/// since every failure mode still has to produce *something* to write back
/// to the client.
pub fn dispatch(tokens: &[Bytes], store: &Store, broker: &Broker, metrics: &Metrics) -> Outcome {
    let Some(name) = tokens.first() else {
        return Outcome::Reply(reply_error("ERR empty command"));
    };
    let upper = name.to_ascii_uppercase();
    let args = &tokens[1..];

    let reply = match upper.as_slice() {
        b"PING" => cmd_ping(args).unwrap_or_else(|reply| reply),
        b"SET" => cmd_set_store(args, store),
        b"GET" => cmd_get(args, store),
        b"DEL" => cmd_del(args, store),
        b"HSET" => cmd_hset(args, store),
        b"HGET" => cmd_hget(args, store),
        b"LPUSH" => cmd_lpush(args, store),
        b"LPOP" => cmd_lpop(args, store),
        b"LRANGE" => cmd_lrange(args, store),
        b"SADD" => cmd_sadd(args, store),
        b"SMEMBERS" => cmd_smembers(args, store),
        b"SISMEMBER" => cmd_sismember(args, store),
        b"PUBLISH" => return Outcome::Reply(cmd_publish(args, broker)),
        b"SUBSCRIBE" => return cmd_subscribe(args, broker),
        b"INFO" => cmd_info(args, store, metrics),
        other => reply_error(&format!(
            "ERR unknown command '{}'",
            String::from_utf8_lossy(other)
        )),
    };

    Outcome::Reply(reply)
}

fn arity_error(cmd: &str) -> Vec<u8> {
    reply_error(&format!("ERR wrong number of arguments for '{cmd}' command"))
}

fn reply_error(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    resp::error(&mut out, text);
    out
}

fn reply_simple(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    resp::simple(&mut out, text);
    out
}

fn reply_integer(value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    resp::integer(&mut out, value);
    out
}

fn reply_bulk(value: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    resp::bulk(&mut out, value);
    out
}

fn reply_array(items: &[Bytes]) -> Vec<u8> {
    let mut out = Vec::new();
    resp::array(&mut out, items);
    out
}

fn wrong_type_reply() -> Vec<u8> {
    reply_error(&FkvError::WrongType.to_string())
}

/// Parses a trailing optional TTL token (e.g. `10s`), reporting a RESP
/// error via `Err` on malformed input rather than silently ignoring it —
/// unlike `JANITOR_INTERVAL`, a bad TTL on a command is the client's
/// mistake to fix, not ours to paper over.
fn parse_optional_ttl(token: Option<&Bytes>) -> Result<std::time::Duration, Vec<u8>> {
    match token {
        None => Ok(std::time::Duration::ZERO),
        Some(raw) => parse_duration(raw)
            .map_err(|_| reply_error("ERR invalid expire time")),
    }
}

/// `PING` with no argument replies `+PONG`; `PING <message>` echoes the
/// message back as a bulk reply instead.
fn cmd_ping(args: &[Bytes]) -> Result<Vec<u8>, Vec<u8>> {
    match args.len() {
        0 => Ok(reply_simple("PONG")),
        1 => Ok(reply_bulk(Some(&args[0]))),
        _ => Err(arity_error("PING")),
    }
}

fn cmd_set_store(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() < 2 || args.len() > 3 {
        return arity_error("SET");
    }
    let ttl = match parse_optional_ttl(args.get(2)) {
        Ok(ttl) => ttl,
        Err(reply) => return reply,
    };
    store.set(args[0].clone(), args[1].clone(), ttl);
    reply_simple("OK")
}

fn cmd_get(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 1 {
        return arity_error("GET");
    }
    match store.get(&args[0]) {
        Ok(value) => reply_bulk(value.as_deref()),
        Err(FkvError::WrongType) => wrong_type_reply(),
    }
}

fn cmd_del(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 1 {
        return arity_error("DEL");
    }
    store.delete(&args[0]);
    reply_integer(1)
}

fn cmd_hset(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() < 3 || args.len() > 4 {
        return arity_error("HSET");
    }
    let ttl = match parse_optional_ttl(args.get(3)) {
        Ok(ttl) => ttl,
        Err(reply) => return reply,
    };
    match store.hset(args[0].clone(), args[1].clone(), args[2].clone(), ttl) {
        Ok(created) => reply_integer(created as i64),
        Err(FkvError::WrongType) => wrong_type_reply(),
    }
}

fn cmd_hget(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 2 {
        return arity_error("HGET");
    }
    reply_bulk(store.hget(&args[0], &args[1]).as_deref())
}

fn cmd_lpush(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() < 2 || args.len() > 3 {
        return arity_error("LPUSH");
    }
    let ttl = match parse_optional_ttl(args.get(2)) {
        Ok(ttl) => ttl,
        Err(reply) => return reply,
    };
    match store.lpush(args[0].clone(), args[1].clone(), ttl) {
        Ok(len) => reply_integer(len),
        Err(FkvError::WrongType) => wrong_type_reply(),
    }
}

fn cmd_lpop(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 1 {
        return arity_error("LPOP");
    }
    reply_bulk(store.lpop(&args[0]).as_deref())
}

fn cmd_lrange(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 3 {
        return arity_error("LRANGE");
    }
    let (start, stop) = match (parse_i64(&args[1]), parse_i64(&args[2])) {
        (Some(start), Some(stop)) => (start, stop),
        _ => return reply_error("ERR value is not an integer or out of range"),
    };
    reply_array(&store.lrange(&args[0], start, stop))
}

fn cmd_sadd(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() < 2 {
        return arity_error("SADD");
    }
    match store.sadd(args[0].clone(), args[1..].to_vec()) {
        Ok(added) => reply_integer(added),
        Err(FkvError::WrongType) => wrong_type_reply(),
    }
}

fn cmd_smembers(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 1 {
        return arity_error("SMEMBERS");
    }
    reply_array(&store.smembers(&args[0]))
}

fn cmd_sismember(args: &[Bytes], store: &Store) -> Vec<u8> {
    if args.len() != 2 {
        return arity_error("SISMEMBER");
    }
    reply_integer(store.sismember(&args[0], &args[1]) as i64)
}

fn cmd_publish(args: &[Bytes], broker: &Broker) -> Vec<u8> {
    if args.len() != 2 {
        return arity_error("PUBLISH");
    }
    let topic = String::from_utf8_lossy(&args[0]).into_owned();
    let delivered = broker.publish(&topic, args[1].clone());
    reply_integer(delivered as i64)
}

fn cmd_subscribe(args: &[Bytes], broker: &Broker) -> Outcome {
    if args.len() != 1 {
        return Outcome::Reply(arity_error("SUBSCRIBE"));
    }
    let topic = String::from_utf8_lossy(&args[0]).into_owned();
    let (id, subscription) = broker.subscribe(&topic);
    Outcome::EnterSubscribeMode { topic, id, subscription }
}

/// Renders a point-in-time metrics snapshot as an `field:value\r\n`-per-line
/// bulk string, in the style of Redis's own `INFO` output.
fn cmd_info(args: &[Bytes], store: &Store, metrics: &Metrics) -> Vec<u8> {
    if !args.is_empty() {
        return arity_error("INFO");
    }
    let snapshot = metrics.snapshot();
    let latency = &snapshot.latency;
    let avg_us = if latency.samples > 0 {
        latency.sum_us / latency.samples
    } else {
        0
    };

    let body = format!(
        "shards:{}\r\nrequests_total:{}\r\nerrors_total:{}\r\ninflight:{}\r\nlatency_samples:{}\r\nlatency_avg_us:{}\r\n",
        store.shard_count(),
        snapshot.requests_total,
        snapshot.errors_total,
        snapshot.inflight,
        latency.samples,
        avg_us,
    );
    reply_bulk(Some(body.as_bytes()))
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
