//! Transport session
//!
//! Owns one TCP connection to the counterpart. A single I/O task writes
//! outgoing frames and reads incoming ones in arrival order, routing
//! responses to the correlator and events to the multiplexer. Any read or
//! write failure, or the counterpart hanging up, closes the session and fails
//! all outstanding work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use tether_protocol::{
    methods, EventEnvelope, Frame, FrameCodec, Request, Response, PROTOCOL_VERSION,
};
use tether_utils::{resolve_descriptor, ConnectionDescriptor, Result, TetherError};

use super::correlator::{into_result, Correlator, SlotGuard};
use super::handler::EventHandler;
use crate::config::ClientConfig;
use crate::events::{EventMultiplexer, EventPredicate, StateSnapshot, Subscription};
use crate::settings::SettingsState;

/// Capacity of the outgoing frame channel
const OUTGOING_CAPACITY: usize = 100;

/// Options for [`Session::connect_with`]
#[derive(Clone, Default)]
pub struct SessionOptions {
    pub config: ClientConfig,
    /// Logging sink for the session's background tasks
    ///
    /// Defaults to whatever dispatcher is current when `connect` runs.
    pub dispatch: Option<Dispatch>,
}

impl SessionOptions {
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }
}

/// Details returned by the counterpart on a successful `auth.login`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeInfo {
    pub session_id: Option<String>,
    pub protocol_version: Option<u32>,
    pub server_version: Option<String>,
}

impl HandshakeInfo {
    fn from_result(result: &Map<String, Value>) -> Self {
        Self {
            session_id: result
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            protocol_version: result
                .get("protocol_version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
            server_version: result
                .get("server_version")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// False only when the counterpart announced a different protocol version
    pub fn is_compatible(&self) -> bool {
        self.protocol_version
            .map_or(true, |version| version == PROTOCOL_VERSION)
    }
}

struct SessionInner {
    descriptor: ConnectionDescriptor,
    config: ClientConfig,
    outgoing: mpsc::Sender<Frame>,
    correlator: Correlator,
    events: Arc<EventMultiplexer>,
    closing: AtomicBool,
    closed: watch::Sender<bool>,
    io_task: Mutex<Option<JoinHandle<()>>>,
    handshake: Mutex<HandshakeInfo>,
    settings: Arc<SettingsState>,
}

impl SessionInner {
    /// Route one decoded frame
    fn route(&self, frame: Frame) {
        match frame {
            Frame::Response(response) => {
                let id = response.id.clone();
                if !self.correlator.resolve(response) {
                    tracing::debug!(id = ?id, "Dropping response with no pending request");
                }
            }
            Frame::Event(envelope) => {
                tracing::trace!(event = %envelope.event, "Received event");
                self.events.dispatch(envelope);
            }
            Frame::Request(request) => {
                tracing::debug!(method = %request.method, "Ignoring request frame from counterpart");
            }
            Frame::Unknown => {
                tracing::debug!("Dropping frame of unknown type");
            }
        }
    }

    /// Run the failure cascade once; later calls are no-ops
    ///
    /// Returns the I/O task handle so the caller can decide whether to abort
    /// and await it.
    fn shutdown(&self, reason: Option<&str>) -> Option<JoinHandle<()>> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return None;
        }

        match reason {
            Some(reason) => tracing::warn!(endpoint = %self.descriptor.endpoint_url(), "Session failed: {}", reason),
            None => tracing::debug!(endpoint = %self.descriptor.endpoint_url(), "Closing session"),
        }

        let task = self.io_task.lock().take();
        let failed = self.correlator.fail_all();
        if failed > 0 {
            tracing::debug!(failed, "Failed pending requests on close");
        }
        self.events.close();
        self.closed.send_replace(true);
        task
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(task) = self.shutdown(None) {
            task.abort();
        }
    }
}

/// Connected, authenticated session with the counterpart
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Resolve connection parameters from config, environment and
    /// bridge-info files, then connect
    pub async fn discover(options: SessionOptions) -> Result<Self> {
        let descriptor = resolve_descriptor(&options.config.discovery_options())?;
        Self::connect_with(descriptor, options).await
    }

    /// Connect with default options
    pub async fn connect(descriptor: ConnectionDescriptor) -> Result<Self> {
        Self::connect_with(descriptor, SessionOptions::default()).await
    }

    /// Open the connection, start the I/O task and authenticate
    ///
    /// The session is only returned once `auth.login` has succeeded; on any
    /// failure the half-open connection is closed.
    pub async fn connect_with(
        descriptor: ConnectionDescriptor,
        options: SessionOptions,
    ) -> Result<Self> {
        let SessionOptions { config, dispatch } = options;
        config.validate()?;
        let dispatch = dispatch.unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));

        let address = descriptor.address();
        let connect_timeout = config.connect_timeout();
        tracing::debug!(endpoint = %descriptor.endpoint_url(), "Connecting");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                TetherError::connection(format!(
                    "Timed out after {:?} connecting to {}",
                    connect_timeout, address
                ))
            })?
            .map_err(|e| TetherError::connection(format!("Failed to connect to {}: {}", address, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let framed = Framed::new(stream, FrameCodec::new());
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Frame>(OUTGOING_CAPACITY);
        let runtime = Handle::current();

        let inner = Arc::new(SessionInner {
            descriptor,
            config,
            outgoing: outgoing_tx,
            correlator: Correlator::new(),
            events: Arc::new(EventMultiplexer::new(runtime.clone(), dispatch.clone())),
            closing: AtomicBool::new(false),
            closed: watch::Sender::new(false),
            io_task: Mutex::new(None),
            handshake: Mutex::new(HandshakeInfo::default()),
            settings: Arc::new(SettingsState::default()),
        });

        let task = runtime.spawn(
            connection_task(framed, outgoing_rx, Arc::downgrade(&inner)).with_subscriber(dispatch),
        );
        *inner.io_task.lock() = Some(task);

        let session = Self { inner };
        if let Err(e) = session.authenticate().await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn authenticate(&self) -> Result<()> {
        let mut params = Map::new();
        params.insert("token".into(), Value::from(self.inner.descriptor.token.as_str()));

        let result = self
            .request(methods::AUTH_LOGIN, params)
            .await
            .map_err(|e| match e {
                TetherError::Remote { code, message, .. } => {
                    TetherError::connection(format!("Handshake rejected: {}: {}", code, message))
                }
                TetherError::Timeout { after, .. } => TetherError::connection(format!(
                    "Handshake did not complete within {:?}",
                    after
                )),
                other => other,
            })?;

        let info = HandshakeInfo::from_result(&result);
        tracing::info!(
            endpoint = %self.inner.descriptor.endpoint_url(),
            session_id = ?info.session_id,
            server_version = ?info.server_version,
            "Authenticated"
        );
        if !info.is_compatible() {
            tracing::warn!(
                announced = ?info.protocol_version,
                supported = PROTOCOL_VERSION,
                "Bridge speaks a different protocol version"
            );
        }
        *self.inner.handshake.lock() = info;
        Ok(())
    }

    /// Close the session
    ///
    /// Idempotent. Stops the I/O task, drops the connection, fails every
    /// pending request and event waiter with `ConnectionClosed`, and cancels
    /// subscriber delivery.
    pub async fn close(&self) {
        if let Some(task) = self.inner.shutdown(None) {
            task.abort();
            let _ = task.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    /// Resolves once the session has closed, for whatever reason
    pub async fn closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.inner.descriptor
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn handshake(&self) -> HandshakeInfo {
        self.inner.handshake.lock().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.handshake.lock().session_id.clone()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    // ==================== Requests ====================

    /// Send a request and await its result mapping
    pub async fn request(&self, method: &str, params: Map<String, Value>) -> Result<Map<String, Value>> {
        let response = self.round_trip(method, params).await?;
        into_result(response)
    }

    async fn round_trip(&self, method: &str, params: Map<String, Value>) -> Result<Response> {
        if self.is_closed() {
            return Err(TetherError::ConnectionClosed);
        }

        let request = Request::new(method, params);
        let id = request.id.clone();
        let slot = self.inner.correlator.register(&id)?;
        let _guard = SlotGuard::new(&self.inner.correlator, id.as_str());

        tracing::trace!(%id, method, "Sending request");
        self.inner
            .outgoing
            .send(Frame::Request(request))
            .await
            .map_err(|_| TetherError::ConnectionClosed)?;

        let after = self.inner.config.request_timeout();
        match tokio::time::timeout(after, slot).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(TetherError::ConnectionClosed),
            Err(_) => {
                tracing::debug!(%id, method, "Request timed out");
                Err(TetherError::timeout(format!("response to {}", method), after))
            }
        }
    }

    pub async fn ping(&self) -> Result<Map<String, Value>> {
        self.request(methods::PING, Map::new()).await
    }

    /// Fetch the full status; the result also refreshes the state cache
    pub async fn status_get(&self) -> Result<Map<String, Value>> {
        let status = self.request(methods::STATUS_GET, Map::new()).await?;
        self.inner.events.state().replace_status(status.clone());
        Ok(status)
    }

    pub async fn status_subscribe(&self) -> Result<Map<String, Value>> {
        self.request(methods::STATUS_SUBSCRIBE, Map::new()).await
    }

    pub async fn status_unsubscribe(&self) -> Result<Map<String, Value>> {
        self.request(methods::STATUS_UNSUBSCRIBE, Map::new()).await
    }

    /// Ask the counterpart to execute a raw command line
    pub async fn execute(&self, command: &str) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        params.insert("command".into(), Value::from(command));
        self.request(methods::EXECUTE, params).await
    }

    /// Cancel the active task, or a specific one
    pub async fn cancel(&self, task_id: Option<&str>) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        if let Some(task_id) = task_id {
            params.insert("task_id".into(), Value::from(task_id));
        }
        self.request(methods::TASK_CANCEL, params).await
    }

    // ==================== Events ====================

    /// Pull the next buffered event
    pub async fn next_event(&self, timeout: Option<Duration>) -> Result<EventEnvelope> {
        self.inner.events.next_event(timeout).await
    }

    /// Wait for an event named `target` (or `*`) matching `predicate`
    pub async fn wait_for(
        &self,
        target: &str,
        predicate: Option<EventPredicate>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        self.inner.events.wait_for(target, predicate, timeout).await
    }

    /// Register a persistent handler for `target` (or `*`)
    pub fn subscribe(&self, target: &str, handler: Arc<dyn EventHandler>) -> Result<Subscription> {
        self.inner.events.subscribe(target, handler)
    }

    /// Stream of pulled events; ends when the session closes
    pub fn events(&self) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        let events = self.inner.events.clone();
        futures::stream::unfold(events, |events| async move {
            match events.next_event(None).await {
                Ok(envelope) => Some((envelope, events)),
                Err(_) => None,
            }
        })
    }

    /// Snapshot of the state cache
    pub fn state(&self) -> StateSnapshot {
        self.inner.events.state().snapshot()
    }

    pub(crate) fn settings_state(&self) -> &Arc<SettingsState> {
        &self.inner.settings
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.inner.descriptor.endpoint_url())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Background task that handles the socket I/O
async fn connection_task(
    mut framed: Framed<TcpStream, FrameCodec>,
    mut outgoing: mpsc::Receiver<Frame>,
    session: Weak<SessionInner>,
) {
    let reason = loop {
        tokio::select! {
            // Handle outgoing frames
            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = framed.send(frame).await {
                        break format!("failed to send frame: {}", e);
                    }
                }
                None => {
                    tracing::debug!("Outgoing channel closed, session dropped");
                    return;
                }
            },

            // Handle incoming frames
            result = framed.next() => match result {
                Some(Ok(frame)) => match session.upgrade() {
                    Some(inner) => inner.route(frame),
                    None => return,
                },
                Some(Err(e)) => break format!("failed to receive frame: {}", e),
                None => break "counterpart closed the connection".to_string(),
            },
        }
    };

    if let Some(inner) = session.upgrade() {
        // Our own handle comes back here; dropping it detaches
        drop(inner.shutdown(Some(&reason)));
    }
}
