//! Stream family: `XADD`, `XRANGE`, `XREAD` (with `BLOCK`), backed by a
//! per-stream radix tree keyed by zero-padded `(ms, seq)` IDs. Only
//! auto-generated `XADD key * field value [...]` entries are supported; the
//! source's custom-ID path is out of scope here.

use crate::block::{BlockKey, BlockManager, ClientId};
use crate::error::ServerError;
use crate::event::EventBus;
use crate::resp::RespValue;
use crate::store::{Store, StreamId};

/// `XADD key * field value [field value ...]`
pub fn parse_xadd(args: &[String]) -> Result<(String, Vec<(String, String)>), ServerError> {
    if args.len() < 4 {
        return Err(ServerError::ArgumentError("XADD requires key, *, and at least one field/value pair".into()));
    }
    if args[1] != "*" {
        return Err(ServerError::ArgumentError("XADD only supports auto-generated IDs ('*')".into()));
    }
    let rest = &args[2..];
    if rest.len() % 2 != 0 {
        return Err(ServerError::ArgumentError("XADD field/value arguments must come in pairs".into()));
    }
    let fields = rest.chunks(2).map(|c| (c[0].clone(), c[1].clone())).collect();
    Ok((args[0].clone(), fields))
}

/// Assign the next ID for `key` at `now_ms` and store `fields` under it.
/// Wakes any client blocked on this stream via `XREAD ... BLOCK`.
pub fn execute_xadd(
    store: &mut Store,
    block_mgr: &mut BlockManager,
    events: &mut EventBus,
    client: ClientId,
    key: String,
    fields: Vec<(String, String)>,
    now_ms: i64,
) -> Result<(), ServerError> {
    let stream = store.streams.entry(key.clone()).or_default();
    let new_id = match stream.last_id {
        Some(last) if last.ms == now_ms => {
            let seq = last
                .seq
                .checked_add(1)
                .ok_or_else(|| ServerError::Overflow("stream sequence exhausted for this millisecond".into()))?;
            StreamId { ms: now_ms, seq }
        }
        _ => StreamId { ms: now_ms, seq: 0 },
    };
    stream.radix.insert(&new_id.render(), fields);
    stream.last_id = Some(new_id);
    events.push_bulk_string(client, new_id.public());
    block_mgr.notify("stream", &key);
    Ok(())
}

/// `XRANGE key start end [COUNT n]`. `start`/`end` may be `-`/`+` or an
/// explicit `ms-seq` ID.
pub fn parse_xrange(args: &[String]) -> Result<(String, String, String, Option<usize>), ServerError> {
    if args.len() < 3 {
        return Err(ServerError::ArgumentError("XRANGE requires key, start, end".into()));
    }
    let count = match args.get(3) {
        None => None,
        Some(tok) if tok.to_uppercase() == "COUNT" => Some(
            args.get(4)
                .ok_or_else(|| ServerError::ArgumentError("COUNT requires a value".into()))?
                .parse()
                .map_err(|_| ServerError::ArgumentError("COUNT value must be an integer".into()))?,
        ),
        Some(other) => return Err(ServerError::ArgumentError(format!("unrecognized XRANGE modifier: {other}"))),
    };
    Ok((args[0].clone(), args[1].clone(), args[2].clone(), count))
}

fn render_range_bound(raw: &str, is_end: bool) -> Result<String, ServerError> {
    match raw {
        "-" => Ok(StreamId { ms: 0, seq: 0 }.render()),
        "+" => Ok(":".to_string()),
        explicit => StreamId::parse(explicit)
            .map(|id| id.render())
            .ok_or_else(|| {
                let side = if is_end { "end" } else { "start" };
                ServerError::ArgumentError(format!("invalid XRANGE {side} ID: {explicit}"))
            }),
    }
}

pub fn execute_xrange(
    store: &Store,
    events: &mut EventBus,
    client: ClientId,
    key: &str,
    start: &str,
    end: &str,
    count: Option<usize>,
) -> Result<(), ServerError> {
    let start_key = render_range_bound(start, false)?;
    let end_key = render_range_bound(end, true)?;
    let limit = count.unwrap_or(usize::MAX);

    let results = match store.streams.get(key) {
        Some(stream) => stream.radix.search_range(&start_key, &end_key, limit),
        None => Vec::new(),
    };

    let items = results
        .into_iter()
        .map(|(internal_id, fields)| entry_reply(&internal_id, fields))
        .collect();
    events.push_array(client, items);
    Ok(())
}

fn entry_reply(internal_id: &str, fields: &[(String, String)]) -> RespValue {
    let public_id = StreamId::parse(internal_id).map(|id| id.public()).unwrap_or_else(|| internal_id.to_string());
    let mut flat = Vec::with_capacity(fields.len() * 2);
    for (f, v) in fields {
        flat.push(RespValue::BulkString(Some(f.clone())));
        flat.push(RespValue::BulkString(Some(v.clone())));
    }
    RespValue::Array(Some(vec![RespValue::BulkString(Some(public_id)), RespValue::Array(Some(flat))]))
}

pub struct XReadArgs {
    pub keys: Vec<String>,
    pub start_ids: Vec<String>,
    pub count: Option<usize>,
    pub block_ms: Option<u64>,
}

/// `XREAD [COUNT n] [BLOCK ms] STREAMS key [key ...] id [id ...]`
pub fn parse_xread(args: &[String]) -> Result<XReadArgs, ServerError> {
    let mut count = None;
    let mut block_ms = None;
    let mut i = 0;
    loop {
        let Some(tok) = args.get(i) else {
            return Err(ServerError::ArgumentError("XREAD requires STREAMS".into()));
        };
        match tok.to_uppercase().as_str() {
            "COUNT" => {
                count = Some(
                    args.get(i + 1)
                        .ok_or_else(|| ServerError::ArgumentError("COUNT requires a value".into()))?
                        .parse()
                        .map_err(|_| ServerError::ArgumentError("COUNT value must be an integer".into()))?,
                );
                i += 2;
            }
            "BLOCK" => {
                block_ms = Some(
                    args.get(i + 1)
                        .ok_or_else(|| ServerError::ArgumentError("BLOCK requires a value".into()))?
                        .parse()
                        .map_err(|_| ServerError::ArgumentError("BLOCK value must be an integer".into()))?,
                );
                i += 2;
            }
            "STREAMS" => {
                i += 1;
                break;
            }
            other => return Err(ServerError::ArgumentError(format!("unrecognized XREAD modifier: {other}"))),
        }
    }

    let rest = &args[i..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(ServerError::ArgumentError("XREAD STREAMS requires matching keys and IDs".into()));
    }
    let n = rest.len() / 2;
    Ok(XReadArgs {
        keys: rest[..n].to_vec(),
        start_ids: rest[n..].to_vec(),
        count,
        block_ms,
    })
}

pub enum XReadOutcome {
    Replied,
    Blocked,
}

/// Resolve each key's exclusive start ID into the next candidate ID, scan
/// every stream, and reply with whichever streams produced entries. If none
/// did and `BLOCK` was given, park the client instead of replying.
pub fn execute_xread(
    store: &Store,
    block_mgr: &mut BlockManager,
    events: &mut EventBus,
    client: ClientId,
    args: &XReadArgs,
    now_ms: i64,
) -> Result<XReadOutcome, ServerError> {
    let mut next_ids = Vec::with_capacity(args.keys.len());
    for (key, start_raw) in args.keys.iter().zip(args.start_ids.iter()) {
        let base = if start_raw == "$" {
            store.streams.get(key).and_then(|s| s.last_id).unwrap_or(StreamId { ms: 0, seq: 0 })
        } else if start_raw == "0" {
            StreamId { ms: 0, seq: 0 }
        } else {
            StreamId::parse(start_raw)
                .ok_or_else(|| ServerError::ArgumentError(format!("invalid XREAD start ID: {start_raw}")))?
        };
        let next_seq = base
            .seq
            .checked_add(1)
            .ok_or_else(|| ServerError::Overflow("stream sequence exhausted for this millisecond".into()))?;
        next_ids.push(StreamId { ms: base.ms, seq: next_seq });
    }

    let mut out = Vec::new();
    for (key, start) in args.keys.iter().zip(next_ids.iter()) {
        let Some(stream) = store.streams.get(key) else { continue };
        let results = stream.radix.search_range(&start.render(), ":", args.count.unwrap_or(usize::MAX));
        if results.is_empty() {
            continue;
        }
        let entries = results.into_iter().map(|(id, fields)| entry_reply(&id, fields)).collect();
        out.push(RespValue::Array(Some(vec![RespValue::BulkString(Some(key.clone())), RespValue::Array(Some(entries))])));
    }

    if out.is_empty() {
        if let Some(block_ms) = args.block_ms {
            let keys: Vec<BlockKey> = args.keys.iter().map(|k| ("stream".to_string(), k.clone())).collect();
            block_mgr.block(client, &keys, now_ms + block_ms as i64);
            return Ok(XReadOutcome::Blocked);
        }
        events.push_array(client, Vec::new());
        return Ok(XReadOutcome::Replied);
    }

    events.push_array(client, out);
    Ok(XReadOutcome::Replied)
}
