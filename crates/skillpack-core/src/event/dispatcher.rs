use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Mutex; // Use tokio's Mutex

use crate::event::error::EventSystemError;
use crate::event::{EventId, PluginEvent, PluginEventKind};

/// Outcome of a single handler invocation
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

// This type represents an owned future that returns HandlerResult
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

/// Asynchronous event handler trait
#[async_trait]
pub trait AsyncEventHandler: Send + Sync {
    async fn handle(&self, event: &PluginEvent) -> HandlerResult;
}

/// Closure-backed handler (Internal Helper)
struct FnHandler {
    handler: Box<dyn Fn(&PluginEvent) -> BoxFuture<'_> + Send + Sync>,
}

#[async_trait]
impl AsyncEventHandler for FnHandler {
    async fn handle(&self, event: &PluginEvent) -> HandlerResult {
        (self.handler)(event).await
    }
}

//--------------------------------------------------
// EventDispatcher (Internal, wrapped by SharedEventDispatcher)
//--------------------------------------------------

/// Observer registry: event name to handlers, in registration order
pub struct EventDispatcher {
    handlers: HashMap<&'static str, Vec<(EventId, Arc<dyn AsyncEventHandler>)>>,
    next_handler_id: EventId,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handler_count: usize = self.handlers.values().map(|v| v.len()).sum();
        f.debug_struct("EventDispatcher")
            .field("handlers_count", &handler_count)
            .field("next_handler_id", &self.next_handler_id)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_handler_id: 1,
        }
    }

    /// Register a trait-object handler for `kind`
    pub fn register(&mut self, kind: PluginEventKind, handler: Box<dyn AsyncEventHandler>) -> EventId {
        let id = self.next_handler_id;
        self.next_handler_id += 1;
        self.handlers.entry(kind.as_str()).or_default().push((id, Arc::from(handler)));
        id
    }

    /// Register a closure returning a boxed future
    pub fn register_handler(
        &mut self,
        kind: PluginEventKind,
        handler: Box<dyn Fn(&PluginEvent) -> BoxFuture<'_> + Send + Sync>,
    ) -> EventId {
        self.register(kind, Box::new(FnHandler { handler }))
    }

    pub fn unregister_handler(&mut self, id: EventId) -> bool {
        let mut found = false;
        self.handlers.values_mut().for_each(|handlers| {
            let len_before = handlers.len();
            handlers.retain(|(h_id, _)| *h_id != id);
            if handlers.len() < len_before {
                found = true;
            }
        });
        found
    }

    pub fn handler_count(&self, kind: PluginEventKind) -> usize {
        self.handlers.get(kind.as_str()).map_or(0, Vec::len)
    }

    /// Handlers currently registered for `name`, in registration order
    pub fn handlers_for(&self, name: &str) -> Vec<(EventId, Arc<dyn AsyncEventHandler>)> {
        self.handlers.get(name).cloned().unwrap_or_default()
    }

    /// Deliver `event` to every handler registered for its name
    pub async fn dispatch_internal(&self, event: &PluginEvent) -> Vec<EventSystemError> {
        deliver(event, &self.handlers_for(event.name())).await
    }
}

/// Run each handler in turn.
///
/// Each handler is isolated: an error or a panic is logged and recorded,
/// and delivery continues with the next handler.
async fn deliver(event: &PluginEvent, handlers: &[(EventId, Arc<dyn AsyncEventHandler>)]) -> Vec<EventSystemError> {
    let mut failures = Vec::new();

    for (id, handler) in handlers {
        let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
        let failure = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => EventSystemError::HandlerFailed {
                event_name: event.name().to_string(),
                handler_id: *id,
                reason: e.to_string(),
            },
            Err(panic) => EventSystemError::HandlerPanicked {
                event_name: event.name().to_string(),
                handler_id: *id,
                message: panic_message(panic.as_ref()),
            },
        };
        log::error!("Event handler error for {} ({}): {}", event.name(), event.plugin, failure);
        failures.push(failure);
    }

    failures
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//--------------------------------------------------
// SharedEventDispatcher (Public API)
//--------------------------------------------------

/// Thread-safe shared event dispatcher using Tokio Mutex
#[derive(Clone)]
pub struct SharedEventDispatcher {
    dispatcher: Arc<Mutex<EventDispatcher>>,
}

impl fmt::Debug for SharedEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEventDispatcher").finish_non_exhaustive()
    }
}

impl SharedEventDispatcher {
    pub fn new() -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(EventDispatcher::new())),
        }
    }

    /// Deliver to the handlers registered when the call starts.
    ///
    /// The lock is released before delivery, so handlers may register or
    /// unregister handlers; such changes apply from the next dispatch on.
    pub async fn dispatch(&self, event: &PluginEvent) -> Vec<EventSystemError> {
        let handlers = self.dispatcher.lock().await.handlers_for(event.name());
        deliver(event, &handlers).await
    }

    pub async fn register(&self, kind: PluginEventKind, handler: Box<dyn AsyncEventHandler>) -> EventId {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.register(kind, handler)
    }

    pub async fn register_handler(
        &self,
        kind: PluginEventKind,
        handler: Box<dyn Fn(&PluginEvent) -> BoxFuture<'_> + Send + Sync>,
    ) -> EventId {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.register_handler(kind, handler)
    }

    pub async fn unregister_handler(&self, id: EventId) -> bool {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.unregister_handler(id)
    }

    pub async fn handler_count(&self, kind: PluginEventKind) -> usize {
        self.dispatcher.lock().await.handler_count(kind)
    }
}

impl Default for SharedEventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------
// Helper Functions
//--------------------------------------------------

/// Create a new event dispatcher instance
pub fn create_dispatcher() -> SharedEventDispatcher {
    SharedEventDispatcher::new()
}

/// Helper function to create synchronous handlers that are compatible with async system
pub fn sync_event_handler<F>(f: F) -> Box<dyn Fn(&PluginEvent) -> BoxFuture<'_> + Send + Sync>
where
    F: Fn(&PluginEvent) -> HandlerResult + Send + Sync + 'static,
{
    Box::new(move |event| {
        let result = f(event);
        Box::pin(async move { result })
    })
}
