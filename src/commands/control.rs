//! Control family: `PING`, `COMMAND`, `ECHO`.

use crate::error::ServerError;
use crate::event::EventBus;
use crate::block::ClientId;

pub fn execute_ping(events: &mut EventBus, client: ClientId, arg: &Option<String>) {
    match arg {
        None => events.push_simple_string(client, "PONG"),
        Some(msg) => events.push_bulk_string(client, msg.clone()),
    }
}

pub fn execute_echo(events: &mut EventBus, client: ClientId, arg: &str) {
    events.push_bulk_string(client, arg.to_string());
}

pub fn parse_echo(args: &[String]) -> Result<String, ServerError> {
    if args.len() != 1 {
        return Err(ServerError::ArgumentError("ECHO takes exactly one argument".into()));
    }
    Ok(args[0].clone())
}
