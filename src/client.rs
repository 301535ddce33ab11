//! Per-connection protocol state. One `Client` exists per accepted TCP
//! connection and is addressed by its reactor-assigned fd/token; the socket
//! itself, the read buffer, and the write buffer live alongside it in the
//! reactor's connection table (see reactor.rs) since mio's `TcpStream` isn't
//! `Clone` and has no business living inside command-dispatch code.

use crate::block::{BlockKey, ClientId};
use std::collections::HashSet;

pub struct Client {
    pub id: ClientId,
    /// The last parsed request's tokens, kept so a blocked `XREAD` can be
    /// re-run verbatim once a notification or deadline wakes the client.
    pub pending_request: Option<Vec<String>>,
    pub blocked_on: HashSet<BlockKey>,
    pub block_deadline_ms: Option<i64>,
}

impl Client {
    pub fn new(id: ClientId) -> Self {
        Client {
            id,
            pending_request: None,
            blocked_on: HashSet::new(),
            block_deadline_ms: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.block_deadline_ms.is_some()
    }

    pub fn mark_blocked(&mut self, keys: &[BlockKey], deadline_ms: i64) {
        self.blocked_on = keys.iter().cloned().collect();
        self.block_deadline_ms = Some(deadline_ms);
    }

    pub fn clear_block(&mut self) {
        self.blocked_on.clear();
        self.block_deadline_ms = None;
    }
}
