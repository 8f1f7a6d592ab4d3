//! Event fan-out
//!
//! Every pushed event goes, in order, to the state cache, the pull buffer,
//! matching subscribers, and then matching waiters. All tables sit behind a
//! single lock that is never held across an `.await`.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use tether_protocol::EventEnvelope;
use tether_utils::{Result, TetherError};

use super::state::StateCache;
use crate::connection::{deliver, EventHandler};

/// Fallible match condition for [`EventMultiplexer::wait_for`]
///
/// Runs while the multiplexer lock is held, so it must not call back into
/// the session.
pub type EventPredicate = Box<dyn FnMut(&EventEnvelope) -> Result<bool> + Send>;

/// Build an [`EventPredicate`] from a plain boolean check
pub fn predicate<F>(check: F) -> EventPredicate
where
    F: Fn(&EventEnvelope) -> bool + Send + 'static,
{
    Box::new(move |event| Ok(check(event)))
}

struct Waiter {
    id: u64,
    target: String,
    predicate: Option<EventPredicate>,
    slot: oneshot::Sender<Result<EventEnvelope>>,
}

struct Subscriber {
    id: u64,
    target: String,
    handler: Arc<dyn EventHandler>,
    queue: mpsc::UnboundedSender<EventEnvelope>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Tables {
    buffer: VecDeque<EventEnvelope>,
    waiters: Vec<Waiter>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    closed: bool,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Fans pushed events out to the buffer, waiters and subscribers
pub struct EventMultiplexer {
    tables: Mutex<Tables>,
    arrived: Notify,
    state: StateCache,
    runtime: Handle,
    dispatch: Dispatch,
}

impl EventMultiplexer {
    /// Create a multiplexer whose subscriber tasks run on `runtime` under `dispatch`
    pub fn new(runtime: Handle, dispatch: Dispatch) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            arrived: Notify::new(),
            state: StateCache::new(),
            runtime,
            dispatch,
        }
    }

    pub fn state(&self) -> &StateCache {
        &self.state
    }

    /// Route one incoming event
    pub fn dispatch(&self, envelope: EventEnvelope) {
        self.state.apply(&envelope);

        {
            let mut tables = self.tables.lock();
            if tables.closed {
                return;
            }

            tables.buffer.push_back(envelope.clone());

            for subscriber in tables
                .subscribers
                .iter()
                .filter(|s| envelope.matches(&s.target))
            {
                if subscriber.queue.send(envelope.clone()).is_err() {
                    tracing::debug!(subscription = subscriber.id, "Subscriber queue already closed");
                }
            }

            let mut index = 0;
            while index < tables.waiters.len() {
                let waiter = &mut tables.waiters[index];
                if !envelope.matches(&waiter.target) {
                    index += 1;
                    continue;
                }
                match check(waiter.predicate.as_mut(), &envelope) {
                    Ok(false) => index += 1,
                    Ok(true) => {
                        let waiter = tables.waiters.remove(index);
                        let _ = waiter.slot.send(Ok(envelope.clone()));
                    }
                    Err(e) => {
                        let waiter = tables.waiters.remove(index);
                        let _ = waiter.slot.send(Err(e));
                    }
                }
            }
        }

        self.arrived.notify_waiters();
    }

    /// Pull the oldest buffered event, waiting for one if the buffer is empty
    ///
    /// `None` or a zero timeout waits indefinitely. Buffered events are still
    /// handed out after close; once the buffer is empty a closed multiplexer
    /// fails with `ConnectionClosed`.
    pub async fn next_event(&self, timeout: Option<Duration>) -> Result<EventEnvelope> {
        bounded(timeout, || "next event".to_string(), async {
            loop {
                let notified = self.arrived.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                {
                    let mut tables = self.tables.lock();
                    if let Some(envelope) = tables.buffer.pop_front() {
                        return Ok(envelope);
                    }
                    if tables.closed {
                        return Err(TetherError::ConnectionClosed);
                    }
                }

                notified.await;
            }
        })
        .await
    }

    /// Wait for the first event matching `target` (or `*`) and `predicate`
    ///
    /// Already-buffered events are checked first and a match is removed from
    /// the buffer. The scan and the waiter registration happen under one
    /// lock, so nothing dispatched in between can be missed.
    pub async fn wait_for(
        &self,
        target: &str,
        mut predicate: Option<EventPredicate>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        let (id, slot) = {
            let mut tables = self.tables.lock();

            let mut found = None;
            for (index, envelope) in tables.buffer.iter().enumerate() {
                if !envelope.matches(target) {
                    continue;
                }
                match check(predicate.as_mut(), envelope) {
                    Ok(false) => {}
                    Ok(true) => {
                        found = Some(index);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            if let Some(envelope) = found.and_then(|index| tables.buffer.remove(index)) {
                return Ok(envelope);
            }

            if tables.closed {
                return Err(TetherError::ConnectionClosed);
            }

            let id = tables.next_id();
            let (tx, rx) = oneshot::channel();
            tables.waiters.push(Waiter {
                id,
                target: target.to_string(),
                predicate,
                slot: tx,
            });
            (id, rx)
        };

        let _guard = WaiterGuard { events: self, id };
        bounded(timeout, || format!("event {}", target), async {
            slot.await.map_err(|_| TetherError::ConnectionClosed)?
        })
        .await
    }

    /// Register `handler` for events named `target` (or `*` for all)
    ///
    /// Registering the same handler under the same target again returns the
    /// existing subscription.
    pub fn subscribe(
        self: &Arc<Self>,
        target: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Subscription> {
        let mut tables = self.tables.lock();
        if tables.closed {
            return Err(TetherError::ConnectionClosed);
        }

        if let Some(existing) = tables
            .subscribers
            .iter()
            .find(|s| s.target == target && same_handler(&s.handler, &handler))
        {
            return Ok(Subscription {
                id: existing.id,
                target: existing.target.clone(),
                events: Arc::downgrade(self),
            });
        }

        let id = tables.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(
            deliver(handler.clone(), target.to_string(), rx).with_subscriber(self.dispatch.clone()),
        );
        tables.subscribers.push(Subscriber {
            id,
            target: target.to_string(),
            handler,
            queue: tx,
            task,
        });
        tracing::debug!(subscription = id, target, "Subscribed");

        Ok(Subscription {
            id,
            target: target.to_string(),
            events: Arc::downgrade(self),
        })
    }

    /// Remove a subscription; queued events are still delivered
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut tables = self.tables.lock();
        let before = tables.subscribers.len();
        tables.subscribers.retain(|s| s.id != id);
        before != tables.subscribers.len()
    }

    /// Fail all waiters, wake all pullers, and cancel subscriber tasks
    ///
    /// Idempotent.
    pub fn close(&self) {
        let (waiters, subscribers) = {
            let mut tables = self.tables.lock();
            if tables.closed {
                return;
            }
            tables.closed = true;
            (
                std::mem::take(&mut tables.waiters),
                std::mem::take(&mut tables.subscribers),
            )
        };

        tracing::debug!(
            waiters = waiters.len(),
            subscribers = subscribers.len(),
            "Closing event multiplexer"
        );
        for waiter in waiters {
            let _ = waiter.slot.send(Err(TetherError::ConnectionClosed));
        }
        for subscriber in subscribers {
            subscriber.task.abort();
        }
        self.arrived.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.tables.lock().closed
    }

    pub fn buffered(&self) -> usize {
        self.tables.lock().buffer.len()
    }

    pub fn waiter_count(&self) -> usize {
        self.tables.lock().waiters.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tables.lock().subscribers.len()
    }
}

impl Drop for EventMultiplexer {
    fn drop(&mut self) {
        for subscriber in self.tables.get_mut().subscribers.drain(..) {
            subscriber.task.abort();
        }
    }
}

/// Handle returned by [`EventMultiplexer::subscribe`]
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    target: String,
    events: Weak<EventMultiplexer>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Remove the subscription; returns `false` if it was already gone
    pub fn unsubscribe(&self) -> bool {
        self.events
            .upgrade()
            .map(|events| events.unsubscribe(self.id))
            .unwrap_or(false)
    }

    /// Turn this handle into a guard that unsubscribes when dropped
    pub fn unsubscribe_on_drop(self) -> SubscriptionGuard {
        SubscriptionGuard(self)
    }
}

/// Unsubscribes on drop
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
    pub fn subscription(&self) -> &Subscription {
        &self.0
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

/// Removes an abandoned waiter
struct WaiterGuard<'a> {
    events: &'a EventMultiplexer,
    id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.events
            .tables
            .lock()
            .waiters
            .retain(|waiter| waiter.id != self.id);
    }
}

fn check(predicate: Option<&mut EventPredicate>, envelope: &EventEnvelope) -> Result<bool> {
    match predicate {
        None => Ok(true),
        Some(predicate) => std::panic::catch_unwind(AssertUnwindSafe(|| predicate(envelope)))
            .unwrap_or_else(|_| {
                Err(TetherError::internal(format!(
                    "event predicate panicked on {}",
                    envelope.event
                )))
            }),
    }
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Await `future`, failing with `Timeout` after `timeout`
///
/// `None` and zero both mean no bound.
pub(crate) async fn bounded<T, F>(
    timeout: Option<Duration>,
    operation: impl FnOnce() -> String,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout.filter(|t| !t.is_zero()) {
        None => future.await,
        Some(after) => match tokio::time::timeout(after, future).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TetherError::timeout(operation(), after)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handler_fn;
    use serde_json::json;

    fn multiplexer() -> Arc<EventMultiplexer> {
        Arc::new(EventMultiplexer::new(Handle::current(), Dispatch::none()))
    }

    fn event(name: &str, data: serde_json::Value) -> EventEnvelope {
        EventEnvelope::new(name, data)
    }

    // ==================== Pull Buffer Tests ====================

    #[tokio::test]
    async fn test_next_event_preserves_arrival_order() {
        let events = multiplexer();
        for n in 0..3 {
            events.dispatch(event("tick", json!({"n": n})));
        }

        for n in 0..3 {
            let got = events.next_event(None).await.unwrap();
            assert_eq!(got.data["n"], json!(n));
        }
    }

    #[tokio::test]
    async fn test_next_event_waits_for_arrival() {
        let events = multiplexer();
        let pusher = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher.dispatch(event("late", json!({})));
        });

        let got = events.next_event(Some(Duration::from_secs(2))).await.unwrap();
        assert_eq!(got.event, "late");
    }

    #[tokio::test]
    async fn test_next_event_timeout_distinct_from_closed() {
        let events = multiplexer();
        let err = events
            .next_event(Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        events.close();
        let err = events.next_event(None).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_next_event() {
        let events = multiplexer();
        let puller = events.clone();
        let pending = tokio::spawn(async move { puller.next_event(None).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        events.close();

        let outcome = pending.await.unwrap();
        assert!(outcome.unwrap_err().is_closed());
    }

    // ==================== wait_for Tests ====================

    #[tokio::test]
    async fn test_wait_for_drains_buffer_first() {
        let events = multiplexer();
        events.dispatch(event("other", json!({})));
        events.dispatch(event("task.completed", json!({"task_id": "t1"})));

        let got = events
            .wait_for("task.completed", None, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(got.task_id(), Some("t1"));

        // The match was removed from the buffer; the unrelated event stays
        assert_eq!(events.buffered(), 1);
        assert_eq!(events.next_event(None).await.unwrap().event, "other");
    }

    #[tokio::test]
    async fn test_wait_for_registers_waiter_with_predicate() {
        let events = multiplexer();
        let waiter = {
            let events = events.clone();
            tokio::spawn(async move {
                events
                    .wait_for(
                        "task.progress",
                        Some(predicate(|e| e.task_id() == Some("t2"))),
                        Some(Duration::from_secs(2)),
                    )
                    .await
            })
        };

        while events.waiter_count() == 0 {
            tokio::task::yield_now().await;
        }
        events.dispatch(event("task.progress", json!({"task_id": "t1"})));
        assert_eq!(events.waiter_count(), 1);
        events.dispatch(event("task.progress", json!({"task_id": "t2"})));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.task_id(), Some("t2"));
        assert_eq!(events.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_wildcard() {
        let events = multiplexer();
        events.dispatch(event("anything", json!({})));
        let got = events.wait_for("*", None, None).await.unwrap();
        assert_eq!(got.event, "anything");
    }

    #[tokio::test]
    async fn test_predicate_error_resolves_waiter() {
        let events = multiplexer();
        let waiter = {
            let events = events.clone();
            tokio::spawn(async move {
                let failing: EventPredicate =
                    Box::new(|_| Err(TetherError::invalid_argument("bad predicate")));
                events.wait_for("x", Some(failing), None).await
            })
        };

        while events.waiter_count() == 0 {
            tokio::task::yield_now().await;
        }
        events.dispatch(event("x", json!({})));

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, TetherError::InvalidArgument(_)));
        assert_eq!(events.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_timeout_removes_waiter() {
        let events = multiplexer();
        let err = events
            .wait_for("never", None, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(events.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_wait_for_deregisters() {
        let events = multiplexer();
        let waiter = {
            let events = events.clone();
            tokio::spawn(async move { events.wait_for("never", None, None).await })
        };

        while events.waiter_count() == 0 {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        let _ = waiter.await;
        assert_eq!(events.waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_close_fails_waiters_and_is_idempotent() {
        let events = multiplexer();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let events = events.clone();
                tokio::spawn(async move { events.wait_for("never", None, None).await })
            })
            .collect();

        while events.waiter_count() < 3 {
            tokio::task::yield_now().await;
        }
        events.close();
        events.close();

        for waiter in waiters {
            assert!(waiter.await.unwrap().unwrap_err().is_closed());
        }
        assert!(events.wait_for("x", None, None).await.unwrap_err().is_closed());
    }

    // ==================== Subscriber Tests ====================

    #[tokio::test]
    async fn test_subscribers_by_name_and_wildcard() {
        let events = multiplexer();
        let named = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let every = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = named.clone();
        events
            .subscribe(
                "task.progress",
                handler_fn(move |e| {
                    sink.lock().push(e.data["n"].clone());
                    Ok(())
                }),
            )
            .unwrap();
        let sink = every.clone();
        events
            .subscribe(
                "*",
                handler_fn(move |e| {
                    sink.lock().push(e.event.clone());
                    Ok(())
                }),
            )
            .unwrap();

        for n in 0..5 {
            events.dispatch(event("task.progress", json!({"n": n})));
        }
        events.dispatch(event("status.update", json!({})));

        for _ in 0..100 {
            if every.lock().len() == 6 && named.lock().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*named.lock(), (0..5).map(|n| json!(n)).collect::<Vec<_>>());
        assert_eq!(every.lock().len(), 6);
        assert_eq!(every.lock()[5], "status.update");
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_others() {
        let events = multiplexer();
        let delivered = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        events
            .subscribe("x", handler_fn(|_| panic!("subscriber exploded")))
            .unwrap();
        events
            .subscribe("x", handler_fn(|_| Err(TetherError::internal("nope"))))
            .unwrap();
        let counter = delivered.clone();
        events
            .subscribe(
                "x",
                handler_fn(move |_| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        events.dispatch(event("x", json!({})));
        events.dispatch(event("x", json!({})));

        for _ in 0..100 {
            if delivered.load(std::sync::atomic::Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(delivered.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(events.buffered(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_subscription_is_deduplicated() {
        let events = multiplexer();
        let handler = handler_fn(|_| Ok(()));

        let first = events.subscribe("x", handler.clone()).unwrap();
        let second = events.subscribe("x", handler.clone()).unwrap();
        let other_name = events.subscribe("y", handler).unwrap();

        assert_eq!(first.id(), second.id());
        assert_ne!(first.id(), other_name.id());
        assert_eq!(events.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_guard() {
        let events = multiplexer();
        let subscription = events.subscribe("x", handler_fn(|_| Ok(()))).unwrap();
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());

        let guard = events
            .subscribe("y", handler_fn(|_| Ok(())))
            .unwrap()
            .unsubscribe_on_drop();
        assert_eq!(guard.subscription().target(), "y");
        assert_eq!(events.subscriber_count(), 1);
        drop(guard);
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_folds_into_state() {
        let events = multiplexer();
        events.dispatch(event("task.started", json!({"task_id": "t1"})));
        assert_eq!(events.state().snapshot().active_task_id(), Some("t1"));
    }
}
