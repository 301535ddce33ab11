//! Command parsing and dispatch. Requests are decoded to a tagged-sum
//! `Command` up front; the reactor never branches on a command name string
//! past `parse_command`, and execution never uses dynamic dispatch.

pub mod control;
pub mod geocmd;
pub mod strings;
pub mod stream;
pub mod zset;

use crate::block::{BlockManager, ClientId};
use crate::error::ServerError;
use crate::event::EventBus;
use crate::resp::RespValue;
use crate::store::Store;

pub enum Command {
    Ping(Option<String>),
    Echo(String),
    Set(strings::SetArgs),
    Get(String),
    ZAdd(zset::ZAddArgs),
    ZRem(String, Vec<String>),
    ZScore(String, String),
    ZCount(String, i64, i64),
    ZRange(zset::ZRangeArgs),
    ZRangeByScore(zset::ZRangeByScoreArgs),
    ZRank(zset::ZRankArgs),
    XAdd(String, Vec<(String, String)>),
    XRange(String, String, String, Option<usize>),
    XRead(stream::XReadArgs),
    GeoAdd(String, Vec<(f64, f64, String)>),
    GeoDist(String, String, String, String),
    GeoHash(String, Vec<String>),
    GeoRadius(String, f64, f64, f64),
}

/// Unwrap a parsed RESP request into the flat argument vector every parser
/// below expects. Inline commands already arrive shaped this way (see
/// `resp.rs`'s inline-command fallback).
pub fn request_to_tokens(value: &RespValue) -> Result<Vec<String>, ServerError> {
    match value {
        RespValue::Array(Some(items)) => items
            .iter()
            .map(|item| match item {
                RespValue::BulkString(Some(s)) => Ok(s.clone()),
                _ => Err(ServerError::ArgumentError("command arguments must be bulk strings".into())),
            })
            .collect(),
        _ => Err(ServerError::ArgumentError("command must be an array of bulk strings".into())),
    }
}

/// Parse a command name plus its arguments into a `Command`. Unknown
/// command names surface as `ServerError::LookupError`.
pub fn parse_command(tokens: &[String]) -> Result<Command, ServerError> {
    let Some(name) = tokens.first() else {
        return Err(ServerError::ArgumentError("empty command".into()));
    };
    let args = &tokens[1..];
    match name.to_uppercase().as_str() {
        "PING" => Ok(Command::Ping(args.first().cloned())),
        "COMMAND" => Ok(Command::Ping(None)),
        "ECHO" => Ok(Command::Echo(control::parse_echo(args)?)),
        "SET" => Ok(Command::Set(strings::parse_set(args)?)),
        "GET" => Ok(Command::Get(strings::parse_get(args)?)),
        "ZADD" => Ok(Command::ZAdd(zset::parse_zadd(args)?)),
        "ZREM" => {
            let (key, members) = zset::parse_zrem(args)?;
            Ok(Command::ZRem(key, members))
        }
        "ZSCORE" => {
            let (key, member) = zset::parse_zscore(args)?;
            Ok(Command::ZScore(key, member))
        }
        "ZCOUNT" => {
            let (key, min, max) = zset::parse_zcount(args)?;
            Ok(Command::ZCount(key, min, max))
        }
        "ZRANGE" => Ok(Command::ZRange(zset::parse_zrange(args)?)),
        "ZRANGEBYSCORE" => Ok(Command::ZRangeByScore(zset::parse_zrangebyscore(args)?)),
        "ZRANK" => Ok(Command::ZRank(zset::parse_zrank(args)?)),
        "XADD" => {
            let (key, fields) = stream::parse_xadd(args)?;
            Ok(Command::XAdd(key, fields))
        }
        "XRANGE" => {
            let (key, start, end, count) = stream::parse_xrange(args)?;
            Ok(Command::XRange(key, start, end, count))
        }
        "XREAD" => Ok(Command::XRead(stream::parse_xread(args)?)),
        "GEOADD" => {
            let (key, triples) = geocmd::parse_geoadd(args)?;
            Ok(Command::GeoAdd(key, triples))
        }
        "GEODIST" => {
            let (key, m1, m2, unit) = geocmd::parse_geodist(args)?;
            Ok(Command::GeoDist(key, m1, m2, unit))
        }
        "GEOHASH" => {
            let (key, members) = geocmd::parse_geohash(args)?;
            Ok(Command::GeoHash(key, members))
        }
        "GEORADIUS" => {
            let (key, lon, lat, radius) = geocmd::parse_georadius(args)?;
            Ok(Command::GeoRadius(key, lon, lat, radius))
        }
        _ => Err(ServerError::LookupError),
    }
}

pub enum DispatchOutcome {
    Replied,
    Blocked,
}

/// Run `command` to completion, writing its reply (or error) to `events`.
/// The only case that doesn't produce an immediate reply is `XREAD ...
/// BLOCK` finding nothing to read: the caller is responsible for marking
/// the client blocked when this returns `Blocked`.
pub fn dispatch(
    store: &mut Store,
    block_mgr: &mut BlockManager,
    events: &mut EventBus,
    client: ClientId,
    command: Command,
    now_ms: i64,
) -> DispatchOutcome {
    let result: Result<DispatchOutcome, ServerError> = match command {
        Command::Ping(arg) => {
            control::execute_ping(events, client, &arg);
            Ok(DispatchOutcome::Replied)
        }
        Command::Echo(arg) => {
            control::execute_echo(events, client, &arg);
            Ok(DispatchOutcome::Replied)
        }
        Command::Set(args) => {
            strings::execute_set(store, events, client, args, now_ms);
            Ok(DispatchOutcome::Replied)
        }
        Command::Get(key) => {
            strings::execute_get(store, events, client, &key, now_ms);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZAdd(args) => {
            zset::execute_zadd(store, events, client, args);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZRem(key, members) => {
            zset::execute_zrem(store, events, client, &key, &members);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZScore(key, member) => {
            zset::execute_zscore(store, events, client, &key, &member);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZCount(key, min, max) => {
            zset::execute_zcount(store, events, client, &key, min, max);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZRange(args) => {
            zset::execute_zrange(store, events, client, args);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZRangeByScore(args) => {
            zset::execute_zrangebyscore(store, events, client, args);
            Ok(DispatchOutcome::Replied)
        }
        Command::ZRank(args) => {
            zset::execute_zrank(store, events, client, args);
            Ok(DispatchOutcome::Replied)
        }
        Command::XAdd(key, fields) => {
            stream::execute_xadd(store, block_mgr, events, client, key, fields, now_ms).map(|_| DispatchOutcome::Replied)
        }
        Command::XRange(key, start, end, count) => {
            stream::execute_xrange(store, events, client, &key, &start, &end, count).map(|_| DispatchOutcome::Replied)
        }
        Command::XRead(args) => stream::execute_xread(store, block_mgr, events, client, &args, now_ms).map(|outcome| match outcome {
            stream::XReadOutcome::Replied => DispatchOutcome::Replied,
            stream::XReadOutcome::Blocked => DispatchOutcome::Blocked,
        }),
        Command::GeoAdd(key, triples) => {
            geocmd::execute_geoadd(store, events, client, key, triples);
            Ok(DispatchOutcome::Replied)
        }
        Command::GeoDist(key, m1, m2, unit) => {
            geocmd::execute_geodist(store, events, client, &key, &m1, &m2, &unit);
            Ok(DispatchOutcome::Replied)
        }
        Command::GeoHash(key, members) => {
            geocmd::execute_geohash(store, events, client, &key, &members);
            Ok(DispatchOutcome::Replied)
        }
        Command::GeoRadius(key, lon, lat, radius) => {
            geocmd::execute_georadius(store, events, client, &key, lon, lat, radius);
            Ok(DispatchOutcome::Replied)
        }
    };

    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            events.push_error(client, err.to_resp_error());
            DispatchOutcome::Replied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_lookup_error() {
        let err = parse_command(&["NOPE".into()]).unwrap_err();
        assert!(matches!(err, ServerError::LookupError));
    }

    #[test]
    fn command_is_treated_identically_to_ping() {
        let cmd = parse_command(&["COMMAND".into()]).unwrap();
        assert!(matches!(cmd, Command::Ping(None)));
    }

    #[test]
    fn request_to_tokens_rejects_non_array() {
        assert!(request_to_tokens(&RespValue::Integer(1)).is_err());
    }

    #[test]
    fn dispatch_set_then_get_roundtrip() {
        let mut store = Store::new();
        let mut block_mgr = BlockManager::new();
        let mut events = EventBus::new();

        let set_cmd = parse_command(&["SET".into(), "k".into(), "v".into()]).unwrap();
        dispatch(&mut store, &mut block_mgr, &mut events, 1, set_cmd, 0);
        events.drain();

        let get_cmd = parse_command(&["GET".into(), "k".into()]).unwrap();
        dispatch(&mut store, &mut block_mgr, &mut events, 1, get_cmd, 0);
        let drained = events.drain();
        assert_eq!(drained[0].value, RespValue::BulkString(Some("v".to_string())));
    }

    #[test]
    fn dispatch_argument_error_becomes_error_reply() {
        let mut events = EventBus::new();
        events.push_error(1, ServerError::ArgumentError("bad".into()).to_resp_error());
        let drained = events.drain();
        assert!(matches!(drained[0].value, RespValue::Error(_)));
    }

    #[test]
    fn dispatch_xread_block_reports_blocked_without_reply() {
        let mut store = Store::new();
        let mut block_mgr = BlockManager::new();
        let mut events = EventBus::new();
        let cmd = parse_command(&["XREAD".into(), "BLOCK".into(), "1000".into(), "STREAMS".into(), "s".into(), "$".into()]).unwrap();
        let outcome = dispatch(&mut store, &mut block_mgr, &mut events, 3, cmd, 0);
        assert!(matches!(outcome, DispatchOutcome::Blocked));
        assert!(events.is_empty());
    }
}
