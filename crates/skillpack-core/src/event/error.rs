//! # Skillpack Core Event System Errors
//!
//! [`EventSystemError`] describes handler failures. Dispatch never returns
//! these to the emitting operation; they are logged and collected for
//! inspection only.
use crate::event::EventId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("Handler {handler_id} for event '{event_name}' failed: {reason}")]
    HandlerFailed {
        event_name: String,
        handler_id: EventId,
        reason: String,
    },

    #[error("Handler {handler_id} for event '{event_name}' panicked: {message}")]
    HandlerPanicked {
        event_name: String,
        handler_id: EventId,
        message: String,
    },

    #[error("Unknown event name: {0}")]
    UnknownEvent(String),
}
