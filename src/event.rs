//! Event queue: deferred replies produced by command execution. Executors
//! never write to a socket directly; they only enqueue events here, which
//! the reactor drains once per iteration after dispatch (see reactor.rs).

use crate::block::ClientId;
use crate::resp::RespValue;

pub struct ReplyEvent {
    pub client: ClientId,
    pub value: RespValue,
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<ReplyEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn push_reply(&mut self, client: ClientId, value: RespValue) {
        self.events.push(ReplyEvent { client, value });
    }

    pub fn push_simple_string(&mut self, client: ClientId, msg: impl Into<String>) {
        self.push_reply(client, RespValue::SimpleString(msg.into()));
    }

    pub fn push_bulk_string(&mut self, client: ClientId, msg: impl Into<String>) {
        self.push_reply(client, RespValue::BulkString(Some(msg.into())));
    }

    pub fn push_nil(&mut self, client: ClientId) {
        self.push_reply(client, RespValue::nil());
    }

    pub fn push_integer(&mut self, client: ClientId, value: i64) {
        self.push_reply(client, RespValue::Integer(value));
    }

    pub fn push_error(&mut self, client: ClientId, msg: impl Into<String>) {
        self.push_reply(client, RespValue::Error(msg.into()));
    }

    pub fn push_array(&mut self, client: ClientId, items: Vec<RespValue>) {
        self.push_reply(client, RespValue::Array(Some(items)));
    }

    /// Drain every queued event in FIFO order. Called once per reactor
    /// iteration; replies for one client are emitted in the order their
    /// commands arrived, because nothing reorders this vector.
    pub fn drain(&mut self) -> Vec<ReplyEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
