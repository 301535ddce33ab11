//! String family: `SET key value [NX] [EX s | PX ms]`, `GET key`. TTLs are
//! tracked against the reactor's monotonic millisecond clock and lazily
//! expired on lookup (see `Store::expire_if_due`).

use crate::error::ServerError;
use crate::event::EventBus;
use crate::block::ClientId;
use crate::store::Store;

pub struct SetArgs {
    pub key: String,
    pub value: String,
    pub nx: bool,
    pub expire_in_ms: Option<i64>,
}

pub fn parse_set(args: &[String]) -> Result<SetArgs, ServerError> {
    if args.len() < 2 {
        return Err(ServerError::ArgumentError("SET requires key and value".into()));
    }
    let key = args[0].clone();
    let value = args[1].clone();
    let mut nx = false;
    let mut expire_in_ms = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].to_uppercase().as_str() {
            "NX" => {
                nx = true;
                i += 1;
            }
            "EX" => {
                let secs: i64 = args
                    .get(i + 1)
                    .ok_or_else(|| ServerError::ArgumentError("EX requires a value".into()))?
                    .parse()
                    .map_err(|_| ServerError::ArgumentError("EX value must be an integer".into()))?;
                expire_in_ms = Some(secs * 1000);
                i += 2;
            }
            "PX" => {
                let ms: i64 = args
                    .get(i + 1)
                    .ok_or_else(|| ServerError::ArgumentError("PX requires a value".into()))?
                    .parse()
                    .map_err(|_| ServerError::ArgumentError("PX value must be an integer".into()))?;
                expire_in_ms = Some(ms);
                i += 2;
            }
            other => {
                return Err(ServerError::ArgumentError(format!("unrecognized SET modifier: {other}")));
            }
        }
    }

    Ok(SetArgs {
        key,
        value,
        nx,
        expire_in_ms,
    })
}

pub fn execute_set(store: &mut Store, events: &mut EventBus, client: ClientId, args: SetArgs, now_ms: i64) {
    if args.nx && store.expire_if_due(&args.key, now_ms) {
        events.push_nil(client);
        return;
    }
    let expire_at_ms = args.expire_in_ms.map(|delta| now_ms + delta);
    store.set_string(args.key, args.value, expire_at_ms);
    events.push_simple_string(client, "OK");
}

pub fn parse_get(args: &[String]) -> Result<String, ServerError> {
    if args.len() != 1 {
        return Err(ServerError::ArgumentError("GET requires exactly one key".into()));
    }
    Ok(args[0].clone())
}

pub fn execute_get(store: &mut Store, events: &mut EventBus, client: ClientId, key: &str, now_ms: i64) {
    match store.get_string(key, now_ms).map(|s| s.to_string()) {
        Some(value) => events.push_bulk_string(client, value),
        None => events.push_nil(client),
    }
}
