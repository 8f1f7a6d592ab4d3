//! Blocking facade over [`Session`]
//!
//! Owns a small dedicated runtime. Every call is spawned onto it and the
//! calling thread parks on a oneshot until the result comes back, so none
//! of the protocol logic is duplicated here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;

use tether_protocol::{EventEnvelope, InvokeTarget, RemoteValue};
use tether_utils::{ConnectionDescriptor, Result, TetherError};

use crate::commands::{CommandArg, CommandDispatchResult};
use crate::connection::{EventHandler, Session, SessionOptions};
use crate::events::{EventPredicate, StateSnapshot, Subscription};

const WORKER_THREAD_NAME: &str = "tether-blocking";

/// Synchronous client for callers without a runtime of their own
pub struct BlockingClient {
    runtime: Option<Runtime>,
    session: Session,
}

impl BlockingClient {
    pub fn connect(descriptor: ConnectionDescriptor) -> Result<Self> {
        Self::connect_with(descriptor, SessionOptions::default())
    }

    pub fn connect_with(descriptor: ConnectionDescriptor, options: SessionOptions) -> Result<Self> {
        let runtime = build_runtime()?;
        let session = run_on(&runtime, Session::connect_with(descriptor, options))?;
        Ok(Self {
            runtime: Some(runtime),
            session,
        })
    }

    /// Resolve the endpoint through discovery, then connect
    pub fn discover(options: SessionOptions) -> Result<Self> {
        let runtime = build_runtime()?;
        let session = run_on(&runtime, Session::discover(options))?;
        Ok(Self {
            runtime: Some(runtime),
            session,
        })
    }

    /// The async session driven by this client
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run any async session operation to completion
    pub fn call<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        ensure_sync_context()?;
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| TetherError::internal("blocking runtime already shut down"))?;
        run_on(runtime, operation(self.session.clone()))
    }

    pub fn close(&self) -> Result<()> {
        self.call(|session| async move {
            session.close().await;
            Ok(())
        })
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub fn ping(&self) -> Result<Map<String, Value>> {
        self.call(|session| async move { session.ping().await })
    }

    pub fn status_get(&self) -> Result<Map<String, Value>> {
        self.call(|session| async move { session.status_get().await })
    }

    pub fn status_subscribe(&self) -> Result<Map<String, Value>> {
        self.call(|session| async move { session.status_subscribe().await })
    }

    pub fn status_unsubscribe(&self) -> Result<Map<String, Value>> {
        self.call(|session| async move { session.status_unsubscribe().await })
    }

    pub fn execute(&self, command: &str) -> Result<Map<String, Value>> {
        let command = command.to_string();
        self.call(|session| async move { session.execute(&command).await })
    }

    pub fn cancel(&self, task_id: Option<&str>) -> Result<Map<String, Value>> {
        let task_id = task_id.map(str::to_string);
        self.call(|session| async move { session.cancel(task_id.as_deref()).await })
    }

    pub fn dispatch(&self, verb: &str, args: Vec<CommandArg>) -> Result<CommandDispatchResult> {
        let verb = verb.to_string();
        self.call(|session| async move { session.dispatch(&verb, &args).await })
    }

    pub fn dispatch_and_wait(
        &self,
        verb: &str,
        args: Vec<CommandArg>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        let verb = verb.to_string();
        self.call(|session| async move { session.dispatch_and_wait(&verb, &args, timeout).await })
    }

    pub fn wait_for_task(
        &self,
        task_id: &str,
        on_update: Option<Arc<dyn EventHandler>>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        let task_id = task_id.to_string();
        self.call(|session| async move {
            session
                .wait_for_task(&task_id, on_update.as_deref(), timeout)
                .await
        })
    }

    pub fn next_event(&self, timeout: Option<Duration>) -> Result<EventEnvelope> {
        self.call(|session| async move { session.next_event(timeout).await })
    }

    pub fn wait_for(
        &self,
        target: &str,
        predicate: Option<EventPredicate>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        let target = target.to_string();
        self.call(|session| async move { session.wait_for(&target, predicate, timeout).await })
    }

    /// Handlers run on the client's worker thread
    pub fn subscribe(&self, target: &str, handler: Arc<dyn EventHandler>) -> Result<Subscription> {
        let target = target.to_string();
        self.call(|session| async move { session.subscribe(&target, handler) })
    }

    pub fn state(&self) -> StateSnapshot {
        self.session.state()
    }

    pub fn api_construct(
        &self,
        type_name: &str,
        args: Vec<RemoteValue>,
        parameter_types: Option<Vec<String>>,
    ) -> Result<RemoteValue> {
        let type_name = type_name.to_string();
        self.call(|session| async move {
            let types = borrow_types(parameter_types.as_deref());
            session
                .api_construct(&type_name, args, types.as_deref())
                .await
        })
    }

    pub fn api_invoke(
        &self,
        target: impl Into<InvokeTarget>,
        method: &str,
        args: Vec<RemoteValue>,
        parameter_types: Option<Vec<String>>,
    ) -> Result<RemoteValue> {
        let target = target.into();
        let method = method.to_string();
        self.call(|session| async move {
            let types = borrow_types(parameter_types.as_deref());
            session
                .api_invoke(target, &method, args, types.as_deref())
                .await
        })
    }

    pub fn api_metadata(&self, target: Option<InvokeTarget>) -> Result<Map<String, Value>> {
        self.call(|session| async move { session.api_metadata(target.as_ref()).await })
    }
}

impl Drop for BlockingClient {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        // A runtime must not be dropped, or blocked on, from async code
        if Handle::try_current().is_ok() {
            tracing::debug!("BlockingClient dropped inside a runtime, shutting down in background");
            runtime.shutdown_background();
            return;
        }
        let session = self.session.clone();
        runtime.block_on(async move { session.close().await });
    }
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("session", &self.session)
            .finish()
    }
}

fn build_runtime() -> Result<Runtime> {
    ensure_sync_context()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(WORKER_THREAD_NAME)
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Parking a runtime thread on a oneshot would deadlock it
fn ensure_sync_context() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(TetherError::internal("blocking call from async context"));
    }
    Ok(())
}

fn run_on<T, Fut>(runtime: &Runtime, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    runtime.spawn(async move {
        let _ = tx.send(future.await);
    });
    rx.blocking_recv()
        .map_err(|_| TetherError::internal("blocking worker dropped the call"))?
}

fn borrow_types(types: Option<&[String]>) -> Option<Vec<&str>> {
    types.map(|types| types.iter().map(String::as_str).collect())
}
