//! Event handler trait and utilities

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

use tether_protocol::EventEnvelope;
use tether_utils::{Result, TetherError};

/// Trait for handling pushed events
///
/// Handlers may be synchronous or asynchronous; both return a future the
/// delivery task awaits before handing over the next event.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, event: EventEnvelope) -> BoxFuture<'static, Result<()>>;
}

/// Synchronous callback-based handler
pub struct CallbackHandler<F>
where
    F: Fn(&EventEnvelope) -> Result<()> + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(&EventEnvelope) -> Result<()> + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(&EventEnvelope) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, event: EventEnvelope) -> BoxFuture<'static, Result<()>> {
        let outcome = (self.callback)(&event);
        futures::future::ready(outcome).boxed()
    }
}

/// Asynchronous callback-based handler
pub struct AsyncCallbackHandler<F> {
    callback: F,
}

impl<F, Fut> AsyncCallbackHandler<F>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F, Fut> EventHandler for AsyncCallbackHandler<F>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn handle(&self, event: EventEnvelope) -> BoxFuture<'static, Result<()>> {
        (self.callback)(event).boxed()
    }
}

/// Wrap a synchronous closure as a shareable handler
pub fn handler_fn<F>(callback: F) -> Arc<dyn EventHandler>
where
    F: Fn(&EventEnvelope) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(CallbackHandler::new(callback))
}

/// Wrap an asynchronous closure as a shareable handler
pub fn async_handler_fn<F, Fut>(callback: F) -> Arc<dyn EventHandler>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(AsyncCallbackHandler::new(callback))
}

/// Run a handler on one event, turning a panic into an error
pub async fn invoke_handler(handler: &dyn EventHandler, event: EventEnvelope) -> Result<()> {
    let name = event.event.clone();
    let future = std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event)))
        .map_err(|_| TetherError::internal(format!("event handler panicked on {}", name)))?;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => Err(TetherError::internal(format!(
            "event handler panicked on {}",
            name
        ))),
    }
}

/// Per-subscriber delivery loop
///
/// Events are handled strictly one after another; a failing handler is
/// logged and the loop moves on to the next event.
pub(crate) async fn deliver(
    handler: Arc<dyn EventHandler>,
    target: String,
    mut queue: mpsc::UnboundedReceiver<EventEnvelope>,
) {
    while let Some(event) = queue.recv().await {
        let name = event.event.clone();
        if let Err(e) = invoke_handler(handler.as_ref(), event).await {
            tracing::warn!(subscription = %target, event = %name, "Event handler failed: {}", e);
        }
    }
    tracing::trace!(subscription = %target, "Subscriber queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(name: &str) -> EventEnvelope {
        EventEnvelope::new(name, json!({}))
    }

    #[tokio::test]
    async fn test_callback_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler = CallbackHandler::new(move |_event| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        handler.handle(event("a")).await.unwrap();
        handler.handle(event("b")).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_async_callback_handler() {
        let handler = AsyncCallbackHandler::new(|event: EventEnvelope| async move {
            if event.event == "bad" {
                Err(TetherError::internal("bad event"))
            } else {
                Ok(())
            }
        });

        assert!(handler.handle(event("good")).await.is_ok());
        assert!(handler.handle(event("bad")).await.is_err());
    }

    #[tokio::test]
    async fn test_invoke_handler_catches_sync_panic() {
        let handler = handler_fn(|_event| panic!("boom"));
        let err = invoke_handler(handler.as_ref(), event("x")).await.unwrap_err();
        assert!(matches!(err, TetherError::Internal(_)));
    }

    #[tokio::test]
    async fn test_invoke_handler_catches_async_panic() {
        let handler = async_handler_fn(|event: EventEnvelope| async move {
            if event.event == "x" {
                panic!("boom");
            }
            Ok(())
        });
        let err = invoke_handler(handler.as_ref(), event("x")).await.unwrap_err();
        assert!(matches!(err, TetherError::Internal(_)));
    }

    #[tokio::test]
    async fn test_deliver_preserves_order_and_survives_failures() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |event| {
            sink.lock().push(event.event.clone());
            if event.event == "two" {
                return Err(TetherError::internal("handler failure"));
            }
            Ok(())
        });

        let (tx, rx) = mpsc::unbounded_channel();
        for name in ["one", "two", "three"] {
            tx.send(event(name)).unwrap();
        }
        drop(tx);

        deliver(handler, "*".into(), rx).await;
        assert_eq!(*seen.lock(), vec!["one", "two", "three"]);
    }
}
