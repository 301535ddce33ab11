//! Block manager: tracks clients parked on `XREAD ... BLOCK` until either a
//! key-space notification fires or their deadline passes. Grounded on the
//! source's `block.go`, with one deliberate fix: deadlines are rendered as
//! fixed-width (19-digit) zero-padded decimal strings so lexicographic order
//! in the timeout radix tree always equals numeric order (the source
//! renders unpadded decimal, which breaks range search once the millisecond
//! count crosses a digit-width boundary).

use crate::radix::RadixTree;
use std::collections::HashMap;

pub type ClientId = usize;

/// `(source tag, key)` identifying what a client is waiting on, e.g.
/// `("stream", "mystream")`.
pub type BlockKey = (String, String);

const DEADLINE_WIDTH: usize = 19;

fn render_deadline(ms: i64) -> String {
    format!("{:0width$}", ms.max(0), width = DEADLINE_WIDTH)
}

#[derive(Default)]
pub struct BlockManager {
    clients_by_key: HashMap<BlockKey, Vec<ClientId>>,
    timeout_index: RadixTree<ClientId>,
    blocked_fds: HashMap<ClientId, String>,
    /// Clients woken by a notification, queued for the reactor to re-run
    /// their stored request on the next loop iteration.
    pub pending_reprocess: Vec<ClientId>,
}

impl BlockManager {
    pub fn new() -> Self {
        BlockManager::default()
    }

    /// Register `client` as blocked on each of `keys` until `deadline_ms`.
    /// Idempotent in fd: a second call for an already-blocked client is a
    /// no-op.
    pub fn block(&mut self, client: ClientId, keys: &[BlockKey], deadline_ms: i64) {
        if self.blocked_fds.contains_key(&client) {
            return;
        }
        for key in keys {
            self.clients_by_key.entry(key.clone()).or_default().push(client);
        }
        let deadline_key = render_deadline(deadline_ms);
        self.timeout_index.insert(&deadline_key, client);
        self.blocked_fds.insert(client, deadline_key);
    }

    /// Remove `client` from the deadline index and the fd set. Waiter-list
    /// entries are left in place and scrubbed lazily at pop time by
    /// `notify`, since `clients_by_key` may reference fds for several keys.
    pub fn unblock(&mut self, client: ClientId) {
        if let Some(deadline_key) = self.blocked_fds.remove(&client) {
            self.timeout_index.remove(&deadline_key);
        }
    }

    pub fn is_blocked(&self, client: ClientId) -> bool {
        self.blocked_fds.contains_key(&client)
    }

    /// Pop every client waiting on `(source, key)` into `pending_reprocess`.
    /// Does not touch the deadline index: the woken client either completes
    /// non-blockingly (and is then explicitly unblocked) or re-registers a
    /// fresh block.
    pub fn notify(&mut self, source: &str, key: &str) {
        let block_key = (source.to_string(), key.to_string());
        if let Some(waiters) = self.clients_by_key.remove(&block_key) {
            for client in waiters {
                if self.blocked_fds.contains_key(&client) {
                    self.pending_reprocess.push(client);
                }
            }
        }
    }

    /// Range-scan deadlines at or before `now_ms`, unblocking each and
    /// returning the unblocked client ids (the caller emits a nil-bulk reply
    /// event for each).
    pub fn expire_deadlines(&mut self, now_ms: i64) -> Vec<ClientId> {
        let now_key = render_deadline(now_ms);
        let expired: Vec<(String, ClientId)> = self
            .timeout_index
            .search_range("0", &now_key, usize::MAX)
            .into_iter()
            .map(|(k, v)| (k, *v))
            .collect();

        let mut unblocked = Vec::with_capacity(expired.len());
        for (_, client) in expired {
            self.unblock(client);
            unblocked.push(client);
        }
        unblocked
    }

    /// Milliseconds until the earliest deadline at or after `now_ms`, or -1
    /// if no client is blocked.
    pub fn earliest_deadline_ms(&self, now_ms: i64) -> i64 {
        let now_key = render_deadline(now_ms);
        let max_key = render_deadline(i64::MAX);
        match self.timeout_index.search_range(&now_key, &max_key, 1).first() {
            Some((key, _)) => {
                let deadline: i64 = key.parse().unwrap_or(now_ms);
                (deadline - now_ms).max(0)
            }
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_idempotent_on_fd() {
        let mut mgr = BlockManager::new();
        mgr.block(1, &[("stream".into(), "s".into())], 1000);
        mgr.block(1, &[("stream".into(), "s".into())], 5000);
        assert_eq!(mgr.timeout_index.len(), 1);
        mgr.unblock(1);
        assert_eq!(mgr.timeout_index.len(), 0);
    }

    #[test]
    fn notify_wakes_waiters() {
        let mut mgr = BlockManager::new();
        mgr.block(1, &[("stream".into(), "s".into())], 5000);
        mgr.block(2, &[("stream".into(), "s".into())], 5000);
        mgr.notify("stream", "s");
        assert_eq!(mgr.pending_reprocess, vec![1, 2]);
    }

    #[test]
    fn expire_deadlines_unblocks_due_clients() {
        let mut mgr = BlockManager::new();
        mgr.block(1, &[("stream".into(), "s".into())], 100);
        mgr.block(2, &[("stream".into(), "s".into())], 5000);
        let expired = mgr.expire_deadlines(100);
        assert_eq!(expired, vec![1]);
        assert!(!mgr.is_blocked(1));
        assert!(mgr.is_blocked(2));
    }

    #[test]
    fn earliest_deadline_crosses_digit_widths_correctly() {
        let mut mgr = BlockManager::new();
        // One deadline with fewer decimal digits than "now", one with more;
        // padding must keep range search correct across the boundary.
        mgr.block(1, &[("stream".into(), "s".into())], 9);
        mgr.block(2, &[("stream".into(), "s".into())], 10_000_000_000);
        assert_eq!(mgr.earliest_deadline_ms(0), 9);
    }

    #[test]
    fn earliest_deadline_is_negative_one_when_empty() {
        let mgr = BlockManager::new();
        assert_eq!(mgr.earliest_deadline_ms(0), -1);
    }
}
