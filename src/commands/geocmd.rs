//! Geo family: `GEOADD`, `GEODIST`, `GEOHASH`, `GEORADIUS`. Each key owns a
//! flat member->coordinate map; `GEORADIUS` is a linear scan over it, same
//! as the source (Redis itself backs this with a sorted set, which is out
//! of scope here).

use crate::block::ClientId;
use crate::error::ServerError;
use crate::event::EventBus;
use crate::geo::{self, Coord};
use crate::resp::RespValue;
use crate::store::{GeoValue, Store};

/// `GEOADD key longitude latitude member [longitude latitude member ...]`
pub fn parse_geoadd(args: &[String]) -> Result<(String, Vec<(f64, f64, String)>), ServerError> {
    if args.len() < 4 || (args.len() - 1) % 3 != 0 {
        return Err(ServerError::ArgumentError("GEOADD requires key and lon/lat/member triples".into()));
    }
    let key = args[0].clone();
    let mut triples = Vec::with_capacity((args.len() - 1) / 3);
    for chunk in args[1..].chunks(3) {
        let lon: f64 = chunk[0].parse().map_err(|_| ServerError::ArgumentError(format!("invalid longitude: {}", chunk[0])))?;
        let lat: f64 = chunk[1].parse().map_err(|_| ServerError::ArgumentError(format!("invalid latitude: {}", chunk[1])))?;
        triples.push((lon, lat, chunk[2].clone()));
    }
    Ok((key, triples))
}

pub fn execute_geoadd(store: &mut Store, events: &mut EventBus, client: ClientId, key: String, triples: Vec<(f64, f64, String)>) {
    let set = store.geo.entry(key).or_default();
    let count = triples.len();
    for (lon, lat, member) in triples {
        let coord = Coord { lat, lon };
        let hash = geo::encode(coord, geo::MAX_PRECISION);
        set.insert(member, GeoValue { coord, hash });
    }
    events.push_integer(client, count as i64);
}

/// `GEODIST key member1 member2 [M | KM]`, default unit `KM`.
pub fn parse_geodist(args: &[String]) -> Result<(String, String, String, String), ServerError> {
    if args.len() < 3 || args.len() > 4 {
        return Err(ServerError::ArgumentError("GEODIST requires key, member1, member2, [unit]".into()));
    }
    let unit = match args.get(3) {
        None => "KM".to_string(),
        Some(u) => {
            let upper = u.to_uppercase();
            if upper != "M" && upper != "KM" {
                return Err(ServerError::ArgumentError(format!("unrecognized GEODIST unit: {u}")));
            }
            upper
        }
    };
    Ok((args[0].clone(), args[1].clone(), args[2].clone(), unit))
}

pub fn execute_geodist(store: &Store, events: &mut EventBus, client: ClientId, key: &str, m1: &str, m2: &str, unit: &str) {
    let Some(set) = store.geo.get(key) else {
        events.push_nil(client);
        return;
    };
    let (Some(v1), Some(v2)) = (set.get(m1), set.get(m2)) else {
        events.push_nil(client);
        return;
    };
    let mut dist = geo::haversine(v1.coord, v2.coord);
    if unit == "KM" {
        dist /= 1000.0;
    }
    events.push_bulk_string(client, format!("{dist}"));
}

/// `GEOHASH key member [member ...]`
pub fn parse_geohash(args: &[String]) -> Result<(String, Vec<String>), ServerError> {
    if args.len() < 2 {
        return Err(ServerError::ArgumentError("GEOHASH requires key and at least one member".into()));
    }
    Ok((args[0].clone(), args[1..].to_vec()))
}

pub fn execute_geohash(store: &Store, events: &mut EventBus, client: ClientId, key: &str, members: &[String]) {
    let set = store.geo.get(key);
    let items = members
        .iter()
        .map(|m| match set.and_then(|s| s.get(m)) {
            Some(v) => RespValue::BulkString(Some(v.hash.clone())),
            None => RespValue::nil(),
        })
        .collect();
    events.push_array(client, items);
}

/// `GEORADIUS key longitude latitude radius`, radius in meters.
pub fn parse_georadius(args: &[String]) -> Result<(String, f64, f64, f64), ServerError> {
    if args.len() < 4 {
        return Err(ServerError::ArgumentError("GEORADIUS requires key, longitude, latitude, radius".into()));
    }
    let lon: f64 = args[1].parse().map_err(|_| ServerError::ArgumentError("invalid longitude".into()))?;
    let lat: f64 = args[2].parse().map_err(|_| ServerError::ArgumentError("invalid latitude".into()))?;
    let radius: f64 = args[3].parse().map_err(|_| ServerError::ArgumentError("invalid radius".into()))?;
    Ok((args[0].clone(), lon, lat, radius))
}

/// Linear scan: `O(members in key)`, same as the source this is grounded
/// on. A production server would back this with the sorted-set index
/// instead; out of scope here.
pub fn execute_georadius(store: &Store, events: &mut EventBus, client: ClientId, key: &str, lon: f64, lat: f64, radius: f64) {
    let origin = Coord { lat, lon };
    let items = match store.geo.get(key) {
        Some(set) => set
            .iter()
            .filter(|(_, v)| geo::haversine(v.coord, origin) < radius)
            .map(|(member, _)| RespValue::BulkString(Some(member.clone())))
            .collect(),
        None => Vec::new(),
    };
    events.push_array(client, items);
}
