//! End-to-end tests that bind a real `Reactor` on an ephemeral port, drive it
//! over blocking `std::net::TcpStream`s, and exercise the scenarios
//! described in the command-family design notes: PING/ECHO, SET/GET with
//! expiry, the ZADD/ZCOUNT/ZRANGEBYSCORE/ZRANK walk, XADD/XRANGE ordering,
//! and an XREAD BLOCK client unblocked by another client's XADD.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use hexagondb::reactor::Reactor;
use hexagondb::resp::{RespHandler, RespValue};

fn spawn_server() -> SocketAddr {
    let reactor = Reactor::bind("127.0.0.1:0".parse().unwrap(), 50, 64).expect("bind");
    let addr = reactor.local_addr().expect("local_addr");
    thread::spawn(move || {
        let mut reactor = reactor;
        let _ = reactor.run();
    });
    // Give the background thread a moment to reach poll() before the first connect.
    thread::sleep(Duration::from_millis(50));
    addr
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
    stream
}

fn send(stream: &mut TcpStream, line: &str) {
    stream.write_all(format!("{line}\r\n").as_bytes()).expect("write");
}

/// Read bytes off the socket until one complete RESP frame has arrived.
fn read_reply(stream: &mut TcpStream) -> RespValue {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Ok(Some((value, _))) = RespHandler::parse_request(&buf) {
            return value;
        }
        let n = stream.read(&mut chunk).expect("read");
        assert!(n > 0, "connection closed before a full reply arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn bulk_strings(value: &RespValue) -> Vec<String> {
    match value {
        RespValue::Array(Some(items)) => items
            .iter()
            .map(|v| match v {
                RespValue::BulkString(Some(s)) => s.clone(),
                other => panic!("expected bulk string, got {other:?}"),
            })
            .collect(),
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn ping_and_echo_roundtrip() {
    let addr = spawn_server();
    let mut stream = connect(addr);

    send(&mut stream, "PING");
    assert_eq!(read_reply(&mut stream), RespValue::SimpleString("PONG".into()));

    send(&mut stream, "COMMAND");
    assert_eq!(read_reply(&mut stream), RespValue::SimpleString("PONG".into()));

    send(&mut stream, "ECHO hello");
    assert_eq!(read_reply(&mut stream), RespValue::BulkString(Some("hello".into())));
}

/// Scenario 6: `SET k v EX 1`, wait past expiry, `GET k` is nil, then
/// `SET k v1 NX` succeeds now that the key is gone.
#[test]
fn set_get_expiry_then_nx_scenario() {
    let addr = spawn_server();
    let mut stream = connect(addr);

    send(&mut stream, "SET k v EX 1");
    assert_eq!(read_reply(&mut stream), RespValue::SimpleString("OK".into()));

    thread::sleep(Duration::from_millis(1500));

    send(&mut stream, "GET k");
    assert_eq!(read_reply(&mut stream), RespValue::BulkString(None));

    send(&mut stream, "SET k v1 NX");
    assert_eq!(read_reply(&mut stream), RespValue::SimpleString("OK".into()));

    send(&mut stream, "GET k");
    assert_eq!(read_reply(&mut stream), RespValue::BulkString(Some("v1".into())));
}

/// Scenario 4: after the given ZADD, ZCOUNT/ZRANGEBYSCORE/ZRANK report the
/// documented results.
#[test]
fn zset_walk_scenario() {
    let addr = spawn_server();
    let mut stream = connect(addr);

    send(&mut stream, "ZADD k 1 a 3 b 5 c 8 d 12 e 14 f");
    assert_eq!(read_reply(&mut stream), RespValue::Integer(6));

    send(&mut stream, "ZCOUNT k 4 13");
    assert_eq!(read_reply(&mut stream), RespValue::Integer(3));

    send(&mut stream, "ZRANGEBYSCORE k 5 12");
    let reply = read_reply(&mut stream);
    assert_eq!(bulk_strings(&reply), vec!["c", "d", "e"]);

    send(&mut stream, "ZRANK k c");
    assert_eq!(read_reply(&mut stream), RespValue::Integer(3));
}

/// Scenario 5: two auto-ID XADDs land in insertion order with strictly
/// ascending IDs under XRANGE - +.
#[test]
fn xadd_xrange_ordering_scenario() {
    let addr = spawn_server();
    let mut stream = connect(addr);

    send(&mut stream, "XADD s * f1 v1");
    let first_id = match read_reply(&mut stream) {
        RespValue::BulkString(Some(id)) => id,
        other => panic!("expected bulk string id, got {other:?}"),
    };

    send(&mut stream, "XADD s * f2 v2");
    let second_id = match read_reply(&mut stream) {
        RespValue::BulkString(Some(id)) => id,
        other => panic!("expected bulk string id, got {other:?}"),
    };

    send(&mut stream, "XRANGE s - +");
    let entries = match read_reply(&mut stream) {
        RespValue::Array(Some(items)) => items,
        other => panic!("expected array, got {other:?}"),
    };
    assert_eq!(entries.len(), 2);

    let entry_id = |entry: &RespValue| match entry {
        RespValue::Array(Some(pair)) => match &pair[0] {
            RespValue::BulkString(Some(id)) => id.clone(),
            other => panic!("expected id bulk string, got {other:?}"),
        },
        other => panic!("expected entry array, got {other:?}"),
    };
    assert_eq!(entry_id(&entries[0]), first_id);
    assert_eq!(entry_id(&entries[1]), second_id);

    fn parse_id(id: &str) -> (i64, u64) {
        let (ms, seq) = id.split_once('-').unwrap();
        (ms.parse().unwrap(), seq.parse().unwrap())
    }
    assert!(parse_id(&first_id) < parse_id(&second_id));
}

/// Scenario 7: a client blocked on `XREAD BLOCK 5000 STREAMS s $` is woken
/// by another client's `XADD` within one loop iteration, well under the
/// block deadline.
#[test]
fn xread_block_unblocks_on_xadd_from_another_client() {
    let addr = spawn_server();
    let mut reader = connect(addr);
    let mut writer = connect(addr);

    send(&mut reader, "XREAD BLOCK 5000 STREAMS s $");

    // Give the reader's request a moment to register as blocked before the
    // writer's XADD fires the notification.
    thread::sleep(Duration::from_millis(100));
    send(&mut writer, "XADD s * f v");
    let add_reply = read_reply(&mut writer);
    assert!(matches!(add_reply, RespValue::BulkString(Some(_))));

    let reply = read_reply(&mut reader);
    let streams = match reply {
        RespValue::Array(Some(items)) => items,
        other => panic!("expected array of streams, got {other:?}"),
    };
    assert_eq!(streams.len(), 1);
    match &streams[0] {
        RespValue::Array(Some(pair)) => {
            assert_eq!(pair[0], RespValue::BulkString(Some("s".to_string())));
        }
        other => panic!("expected (key, entries) pair, got {other:?}"),
    }
}
