//! The process-wide key space: four disjoint maps from string key to a
//! typed value, exactly as described by the data model (dict, sorted sets,
//! streams, geo sets). Owned and threaded explicitly through the reactor
//! loop rather than reached via global/ambient state, so tests can
//! instantiate fresh stores.

use crate::geo::Coord;
use crate::radix::RadixTree;
use crate::skiplist::SkipList;
use std::collections::HashMap;

/// A string value with an optional expiry, expressed in the same monotonic
/// millisecond clock the reactor hands to every executor call.
pub struct DictEntry {
    pub value: String,
    pub expire_at_ms: Option<i64>,
}

/// `(ms, seq)` stream entry identifier, rendered `"<ms>-<seq>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: i64,
    pub seq: u64,
}

/// Width `ms` is zero-padded to when rendered as a radix-tree key, wide
/// enough to hold any `i64` millisecond timestamp without truncation.
const STREAM_ID_MS_WIDTH: usize = 19;

impl StreamId {
    /// Render the ID as a radix-tree key. Both `ms` and `seq` are zero-padded
    /// (19 and 20 digits respectively) so that lexicographic order over the
    /// whole rendered string matches numeric `(ms, seq)` order even across a
    /// decimal digit-width crossing of either field (see design notes on
    /// stream ID canonicalization).
    pub fn render(&self) -> String {
        format!("{:0mw$}-{:020}", self.ms.max(0), self.seq, mw = STREAM_ID_MS_WIDTH)
    }

    /// The client-facing form, `"<ms>-<seq>"` with no padding.
    pub fn public(&self) -> String {
        format!("{}-{}", self.ms, self.seq)
    }

    /// Parse either the client-facing form or a zero-padded radix key back
    /// into a `StreamId`.
    pub fn parse(raw: &str) -> Option<StreamId> {
        let (ms_part, seq_part) = raw.split_once('-')?;
        let ms: i64 = ms_part.parse().ok()?;
        let seq: u64 = seq_part.parse().ok()?;
        Some(StreamId { ms, seq })
    }
}

pub struct Stream {
    pub radix: RadixTree<Vec<(String, String)>>,
    pub last_id: Option<StreamId>,
}

impl Default for Stream {
    fn default() -> Self {
        Stream {
            radix: RadixTree::new(),
            last_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoValue {
    pub coord: Coord,
    pub hash: String,
}

#[derive(Default)]
pub struct Store {
    pub dict: HashMap<String, DictEntry>,
    pub zsets: HashMap<String, SkipList>,
    pub streams: HashMap<String, Stream>,
    pub geo: HashMap<String, HashMap<String, GeoValue>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Lazily expire `key` in `dict` if its expiry has already passed, per
    /// `now_ms`. Returns whether the key is (still) present afterward.
    pub fn expire_if_due(&mut self, key: &str, now_ms: i64) -> bool {
        let expired = match self.dict.get(key) {
            Some(entry) => matches!(entry.expire_at_ms, Some(exp) if exp <= now_ms),
            None => return false,
        };
        if expired {
            self.dict.remove(key);
            false
        } else {
            true
        }
    }

    pub fn get_string(&mut self, key: &str, now_ms: i64) -> Option<&str> {
        if !self.expire_if_due(key, now_ms) {
            return None;
        }
        self.dict.get(key).map(|e| e.value.as_str())
    }

    pub fn set_string(&mut self, key: String, value: String, expire_at_ms: Option<i64>) {
        self.dict.insert(key, DictEntry { value, expire_at_ms });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_expiry_on_get() {
        let mut store = Store::new();
        store.set_string("k".into(), "v".into(), Some(1000));
        assert_eq!(store.get_string("k", 500), Some("v"));
        assert_eq!(store.get_string("k", 1000), None);
        assert!(!store.dict.contains_key("k"));
    }

    #[test]
    fn no_expiry_means_persistent() {
        let mut store = Store::new();
        store.set_string("k".into(), "v".into(), None);
        assert_eq!(store.get_string("k", i64::MAX), Some("v"));
    }

    #[test]
    fn stream_id_render_orders_numerically_within_ms() {
        let a = StreamId { ms: 5, seq: 1 };
        let b = StreamId { ms: 5, seq: 2 };
        assert!(a.render() < b.render());
    }

    #[test]
    fn stream_id_render_orders_numerically_across_ms_digit_width_crossing() {
        let a = StreamId { ms: 9, seq: 0 };
        let b = StreamId { ms: 10, seq: 0 };
        assert!(a.render() < b.render());
    }
}
