//! # Skillpack Core Event System
//!
//! An observer registry for plugin lifecycle events. Handlers are registered
//! per event name and run in registration order; a failing or panicking
//! handler is logged and skipped, and never aborts the operation that emitted
//! the event.
pub mod dispatcher;
pub mod error;
pub mod types;

/// Type for event handler identifiers
pub type EventId = u64;

/// Re-export important types
pub use dispatcher::{
    AsyncEventHandler, BoxFuture, EventDispatcher, HandlerResult, SharedEventDispatcher,
    create_dispatcher, sync_event_handler,
};
pub use types::{PluginEvent, PluginEventKind};

// Test module declaration
#[cfg(test)]
mod tests;
