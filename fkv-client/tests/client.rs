use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use fkv_client::{ClientConfig, KVClient};

fn spawn_server(expected_commands: usize, handler: fn(usize, Vec<Vec<u8>>, &mut TcpStream)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let args = read_command(&mut reader).expect("read command");
            handler(idx, args, &mut stream);
        }
    });

    addr
}

/// Reads one whitespace-tokenized, newline-terminated request line — the
/// same ingress dialect `fkv-server` reads.
fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    Ok(line
        .trim_end_matches(['\n', '\r'])
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| token.as_bytes().to_vec())
        .collect())
}

fn write_simple(stream: &mut TcpStream, msg: &str) {
    let _ = stream.write_all(b"+");
    let _ = stream.write_all(msg.as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let _ = stream.write_all(b"$");
    let _ = stream.write_all(data.len().to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn write_integer(stream: &mut TcpStream, value: i64) {
    let _ = stream.write_all(b":");
    let _ = stream.write_all(value.to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn write_array(stream: &mut TcpStream, items: &[&[u8]]) {
    let _ = stream.write_all(b"*");
    let _ = stream.write_all(items.len().to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    for item in items {
        write_bulk_no_flush(stream, item);
    }
    let _ = stream.flush();
}

fn write_bulk_no_flush(stream: &mut TcpStream, data: &[u8]) {
    let _ = stream.write_all(b"$");
    let _ = stream.write_all(data.len().to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\r\n");
}

fn client_with_addr(addr: String) -> KVClient {
    let config = ClientConfig {
        addr,
        max_idle: 1,
        max_total: 1,
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
    };
    KVClient::with_config(config).expect("client")
}

#[test]
fn client_set_get_roundtrip() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"SET");
            assert_eq!(args[1], b"key");
            assert_eq!(args[2], b"value");
            write_simple(stream, "OK");
        } else {
            assert_eq!(args[0], b"GET");
            assert_eq!(args[1], b"key");
            write_bulk(stream, b"value");
        }
    });

    let client = client_with_addr(addr);
    client.set(b"key", b"value").expect("set");
    let value = client.get(b"key").expect("get");
    assert_eq!(value, Some(b"value".to_vec()));
}

#[test]
fn client_set_with_ttl_sends_compact_duration() {
    let addr = spawn_server(1, |_idx, args, stream| {
        assert_eq!(args[0], b"SET");
        assert_eq!(args[1], b"key");
        assert_eq!(args[2], b"value");
        assert_eq!(args[3], b"10s");
        write_simple(stream, "OK");
    });

    let client = client_with_addr(addr);
    client.set_with_ttl(b"key", b"value", b"10s").expect("set_with_ttl");
}

#[test]
fn client_delete_reports_removal() {
    let addr = spawn_server(1, |_idx, args, stream| {
        assert_eq!(args[0], b"DEL");
        assert_eq!(args[1], b"key");
        write_integer(stream, 1);
    });

    let client = client_with_addr(addr);
    assert!(client.delete(b"key").expect("delete"));
}

#[test]
fn client_hash_roundtrip() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"HSET");
            assert_eq!(args[1], b"h");
            assert_eq!(args[2], b"f");
            assert_eq!(args[3], b"v");
            write_integer(stream, 1);
        } else {
            assert_eq!(args[0], b"HGET");
            write_bulk(stream, b"v");
        }
    });

    let client = client_with_addr(addr);
    assert!(client.hset(b"h", b"f", b"v").expect("hset"));
    assert_eq!(client.hget(b"h", b"f").expect("hget"), Some(b"v".to_vec()));
}

#[test]
fn client_list_roundtrip() {
    let addr = spawn_server(3, |idx, args, stream| match idx {
        0 => {
            assert_eq!(args[0], b"LPUSH");
            write_integer(stream, 1);
        }
        1 => {
            assert_eq!(args[0], b"LRANGE");
            assert_eq!(args[2], b"0");
            assert_eq!(args[3], b"-1");
            write_array(stream, &[b"a"]);
        }
        _ => {
            assert_eq!(args[0], b"LPOP");
            write_bulk(stream, b"a");
        }
    });

    let client = client_with_addr(addr);
    assert_eq!(client.lpush(b"l", b"a").expect("lpush"), 1);
    assert_eq!(client.lrange(b"l", 0, -1).expect("lrange"), vec![b"a".to_vec()]);
    assert_eq!(client.lpop(b"l").expect("lpop"), Some(b"a".to_vec()));
}

#[test]
fn client_set_commands_roundtrip() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"SADD");
            write_integer(stream, 1);
        } else {
            assert_eq!(args[0], b"SISMEMBER");
            write_integer(stream, 1);
        }
    });

    let client = client_with_addr(addr);
    assert_eq!(client.sadd(b"s", &[b"a"]).expect("sadd"), 1);
    assert!(client.sismember(b"s", b"a").expect("sismember"));
}

#[test]
fn client_publish_reports_subscriber_count() {
    let addr = spawn_server(1, |_idx, args, stream| {
        assert_eq!(args[0], b"PUBLISH");
        assert_eq!(args[1], b"news");
        assert_eq!(args[2], b"hi");
        write_integer(stream, 2);
    });

    let client = client_with_addr(addr);
    assert_eq!(client.publish(b"news", b"hi").expect("publish"), 2);
}

#[test]
fn client_ping() {
    let addr = spawn_server(1, |_idx, args, stream| {
        assert_eq!(args[0], b"PING");
        write_simple(stream, "PONG");
    });

    let client = client_with_addr(addr);
    assert_eq!(client.ping().expect("ping"), b"PONG".to_vec());
}

#[test]
fn client_ping_with_payload_echoes_it() {
    let addr = spawn_server(1, |_idx, args, stream| {
        assert_eq!(args[0], b"PING");
        assert_eq!(args[1], b"hello");
        write_bulk(stream, b"hello");
    });

    let client = client_with_addr(addr);
    assert_eq!(client.ping_with_payload(b"hello").expect("ping"), b"hello".to_vec());
}
