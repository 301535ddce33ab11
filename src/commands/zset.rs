//! Sorted-set family: `ZADD`, `ZREM`, `ZSCORE`, `ZCOUNT`, `ZRANGE`,
//! `ZRANGEBYSCORE`, `ZRANK`, backed by the indexable skip list.

use crate::block::ClientId;
use crate::error::ServerError;
use crate::event::EventBus;
use crate::resp::RespValue;
use crate::skiplist::SkipList;
use crate::store::Store;

pub struct ZAddArgs {
    pub key: String,
    pub nx: bool,
    pub pairs: Vec<(i64, String)>,
}

/// `ZADD key [NX] score member [score member ...]`
pub fn parse_zadd(args: &[String]) -> Result<ZAddArgs, ServerError> {
    if args.is_empty() {
        return Err(ServerError::ArgumentError("ZADD requires a key".into()));
    }
    let key = args[0].clone();
    let mut nx = false;
    let mut rest = &args[1..];
    if rest.first().map(|s| s.to_uppercase()) == Some("NX".to_string()) {
        nx = true;
        rest = &rest[1..];
    }
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(ServerError::ArgumentError("ZADD requires score/member pairs".into()));
    }
    let mut pairs = Vec::with_capacity(rest.len() / 2);
    for chunk in rest.chunks(2) {
        let score: i64 = chunk[0]
            .parse()
            .map_err(|_| ServerError::ArgumentError(format!("invalid score: {}", chunk[0])))?;
        pairs.push((score, chunk[1].clone()));
    }
    Ok(ZAddArgs { key, nx, pairs })
}

pub fn execute_zadd(store: &mut Store, events: &mut EventBus, client: ClientId, args: ZAddArgs) {
    let zset = store.zsets.entry(args.key).or_insert_with(SkipList::new);
    let mut added = 0i64;
    for (score, member) in args.pairs {
        if zset.add(&member, score, args.nx) {
            added += 1;
        }
    }
    events.push_integer(client, added);
}

pub fn parse_zrem(args: &[String]) -> Result<(String, Vec<String>), ServerError> {
    if args.len() < 2 {
        return Err(ServerError::ArgumentError("ZREM requires key and at least one member".into()));
    }
    Ok((args[0].clone(), args[1..].to_vec()))
}

pub fn execute_zrem(store: &mut Store, events: &mut EventBus, client: ClientId, key: &str, members: &[String]) {
    let removed = match store.zsets.get_mut(key) {
        Some(zset) => members.iter().filter(|m| zset.remove(m)).count(),
        None => 0,
    };
    events.push_integer(client, removed as i64);
}

pub fn parse_zscore(args: &[String]) -> Result<(String, String), ServerError> {
    if args.len() != 2 {
        return Err(ServerError::ArgumentError("ZSCORE requires key and member".into()));
    }
    Ok((args[0].clone(), args[1].clone()))
}

pub fn execute_zscore(store: &Store, events: &mut EventBus, client: ClientId, key: &str, member: &str) {
    match store.zsets.get(key).and_then(|z| z.get_score(member)) {
        Some(score) => events.push_bulk_string(client, score.to_string()),
        None => events.push_nil(client),
    }
}

pub fn parse_zcount(args: &[String]) -> Result<(String, i64, i64), ServerError> {
    if args.len() != 3 {
        return Err(ServerError::ArgumentError("ZCOUNT requires key, min, max".into()));
    }
    let min = args[1].parse().map_err(|_| ServerError::ArgumentError("invalid min".into()))?;
    let max = args[2].parse().map_err(|_| ServerError::ArgumentError("invalid max".into()))?;
    Ok((args[0].clone(), min, max))
}

pub fn execute_zcount(store: &Store, events: &mut EventBus, client: ClientId, key: &str, min: i64, max: i64) {
    let count = store.zsets.get(key).map(|z| z.count_in_score_range(min, max)).unwrap_or(0);
    events.push_integer(client, count as i64);
}

pub struct ZRangeArgs {
    pub key: String,
    pub start: i64,
    pub stop: i64,
    pub withscores: bool,
}

/// `ZRANGE key start stop [WITHSCORES]`, with start/stop as 1-based
/// inclusive rank indices.
pub fn parse_zrange(args: &[String]) -> Result<ZRangeArgs, ServerError> {
    if args.len() < 3 {
        return Err(ServerError::ArgumentError("ZRANGE requires key, start, stop".into()));
    }
    let start = args[1].parse().map_err(|_| ServerError::ArgumentError("invalid start".into()))?;
    let stop = args[2].parse().map_err(|_| ServerError::ArgumentError("invalid stop".into()))?;
    let withscores = args.get(3).map(|s| s.to_uppercase() == "WITHSCORES").unwrap_or(false);
    Ok(ZRangeArgs {
        key: args[0].clone(),
        start,
        stop,
        withscores,
    })
}

pub fn execute_zrange(store: &Store, events: &mut EventBus, client: ClientId, args: ZRangeArgs) {
    let items = match store.zsets.get(&args.key) {
        Some(z) if args.start >= 1 && args.stop >= 1 => {
            z.nodes_in_rank_range(args.start as u64, args.stop as u64)
        }
        _ => Vec::new(),
    };
    reply_members(events, client, &items, args.withscores);
}

pub struct ZRangeByScoreArgs {
    pub key: String,
    pub min: i64,
    pub max: i64,
    pub withscores: bool,
}

pub fn parse_zrangebyscore(args: &[String]) -> Result<ZRangeByScoreArgs, ServerError> {
    if args.len() < 3 {
        return Err(ServerError::ArgumentError("ZRANGEBYSCORE requires key, min, max".into()));
    }
    let min = args[1].parse().map_err(|_| ServerError::ArgumentError("invalid min".into()))?;
    let max = args[2].parse().map_err(|_| ServerError::ArgumentError("invalid max".into()))?;
    let withscores = args.get(3).map(|s| s.to_uppercase() == "WITHSCORES").unwrap_or(false);
    Ok(ZRangeByScoreArgs {
        key: args[0].clone(),
        min,
        max,
        withscores,
    })
}

pub fn execute_zrangebyscore(store: &Store, events: &mut EventBus, client: ClientId, args: ZRangeByScoreArgs) {
    let items = store
        .zsets
        .get(&args.key)
        .map(|z| z.nodes_in_score_range(args.min, args.max))
        .unwrap_or_default();
    reply_members(events, client, &items, args.withscores);
}

fn reply_members(events: &mut EventBus, client: ClientId, items: &[(&str, i64)], withscores: bool) {
    let mut out = Vec::with_capacity(items.len() * if withscores { 2 } else { 1 });
    for (member, score) in items {
        out.push(RespValue::BulkString(Some(member.to_string())));
        if withscores {
            out.push(RespValue::BulkString(Some(score.to_string())));
        }
    }
    events.push_array(client, out);
}

pub struct ZRankArgs {
    pub key: String,
    pub member: String,
    pub withscore: bool,
}

pub fn parse_zrank(args: &[String]) -> Result<ZRankArgs, ServerError> {
    if args.len() < 2 {
        return Err(ServerError::ArgumentError("ZRANK requires key and member".into()));
    }
    let withscore = args.get(2).map(|s| s.to_uppercase() == "WITHSCORE").unwrap_or(false);
    Ok(ZRankArgs {
        key: args[0].clone(),
        member: args[1].clone(),
        withscore,
    })
}

pub fn execute_zrank(store: &Store, events: &mut EventBus, client: ClientId, args: ZRankArgs) {
    let Some(zset) = store.zsets.get(&args.key) else {
        events.push_nil(client);
        return;
    };
    match zset.rank(&args.member) {
        Some(rank) => {
            if args.withscore {
                let score = zset.get_score(&args.member).unwrap_or(0);
                events.push_array(
                    client,
                    vec![
                        RespValue::Integer(rank as i64),
                        RespValue::BulkString(Some(score.to_string())),
                    ],
                );
            } else {
                events.push_integer(client, rank as i64);
            }
        }
        None => events.push_nil(client),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(store: &mut Store) {
        let args = parse_zadd(&[
            "k".into(), "1".into(), "a".into(), "3".into(), "b".into(), "5".into(), "c".into(),
            "8".into(), "d".into(), "12".into(), "e".into(), "14".into(), "f".into(),
        ])
        .unwrap();
        let mut events = EventBus::new();
        execute_zadd(store, &mut events, 1, args);
    }

    #[test]
    fn zadd_zcount_zrangebyscore_zrank_scenario() {
        let mut store = Store::new();
        populate(&mut store);

        let mut events = EventBus::new();
        execute_zcount(&store, &mut events, 1, "k", 4, 13);
        let drained = events.drain();
        assert!(matches!(drained[0].value, RespValue::Integer(3)));

        let mut events = EventBus::new();
        let args = parse_zrangebyscore(&["k".into(), "5".into(), "12".into()]).unwrap();
        execute_zrangebyscore(&store, &mut events, 1, args);
        let drained = events.drain();
        match &drained[0].value {
            RespValue::Array(Some(items)) => {
                let names: Vec<&str> = items
                    .iter()
                    .map(|v| match v {
                        RespValue::BulkString(Some(s)) => s.as_str(),
                        _ => panic!(),
                    })
                    .collect();
                assert_eq!(names, vec!["c", "d", "e"]);
            }
            _ => panic!(),
        }

        let mut events = EventBus::new();
        let args = parse_zrank(&["k".into(), "c".into()]).unwrap();
        execute_zrank(&store, &mut events, 1, args);
        let drained = events.drain();
        assert!(matches!(drained[0].value, RespValue::Integer(3)));
    }

    #[test]
    fn zadd_nx_suppresses_update_but_not_count() {
        let mut store = Store::new();
        let mut events = EventBus::new();
        execute_zadd(&mut store, &mut events, 1, parse_zadd(&["k".into(), "1".into(), "a".into()]).unwrap());
        events.drain();

        execute_zadd(
            &mut store,
            &mut events,
            1,
            parse_zadd(&["k".into(), "NX".into(), "99".into(), "a".into()]).unwrap(),
        );
        let drained = events.drain();
        assert!(matches!(drained[0].value, RespValue::Integer(0)));
        assert_eq!(store.zsets.get("k").unwrap().get_score("a"), Some(1));
    }

    #[test]
    fn zrem_counts_only_existing_members() {
        let mut store = Store::new();
        populate(&mut store);
        let mut events = EventBus::new();
        execute_zrem(&mut store, &mut events, 1, "k", &["a".to_string(), "zzz".to_string()]);
        let drained = events.drain();
        assert!(matches!(drained[0].value, RespValue::Integer(1)));
    }
}
