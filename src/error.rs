//! Error taxonomy for the server core.
//!
//! Mirrors the five-kind taxonomy the dispatcher and reactor rely on: argument
//! errors never mutate the store, lookup errors are plain `-ERR` replies,
//! overflow is a dedicated condition (stream sequence exhaustion), and IO/system
//! errors are logged rather than surfaced to the client that didn't cause them.

use thiserror::Error;

/// Errors produced by command parsing, execution, and the reactor loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid args: {0}")]
    ArgumentError(String),

    #[error("overflow: {0}")]
    Overflow(String),

    #[error("failed to look up command")]
    LookupError,

    #[error("io error: {0}")]
    IoError(String),

    #[error("system error: {0}")]
    SystemError(String),
}

impl ServerError {
    /// Render the exact RESP error reply text for this error's Surface column.
    pub fn to_resp_error(&self) -> String {
        match self {
            ServerError::ArgumentError(_) => "ERR invalid args".to_string(),
            ServerError::Overflow(_) => "ERR overflow".to_string(),
            ServerError::LookupError => "ERR failed to look up command".to_string(),
            ServerError::IoError(msg) => format!("ERR io error: {msg}"),
            ServerError::SystemError(msg) => format!("ERR system error: {msg}"),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
