//! Error types for the runtime

use crate::events::EventKind;
use thiserror::Error;

/// Errors surfaced by the router, its drivers, and the tooling handlers.
///
/// The enum is `Clone` because the terminal cause is distributed to every
/// observer over the done channel; I/O failures carry their message instead
/// of the original `std::io::Error` for that reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("event queue is full")]
    QueueFull,

    #[error("router is not accepting events")]
    Closed,

    #[error("{kind} slot cannot hold a {handler} handler")]
    HandlerShape {
        kind: EventKind,
        handler: &'static str,
    },

    #[error("no handler installed for {0} events")]
    NoHandler(EventKind),

    #[error("cancelled")]
    Cancelled,

    #[error("end of stream")]
    EndOfStream,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("malformed tick record at index {0}")]
    MalformedRecord(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("strategy error: {0}")]
    Strategy(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
