//! Request/response correlation
//!
//! One pending slot per outstanding request id. Slots are resolved by the
//! receive loop, removed by the caller on timeout or abandonment, and failed
//! en masse when the session closes.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use tether_protocol::{Response, ResponseError};
use tether_utils::{Result, TetherError};

/// What a pending slot eventually receives
pub(crate) type Reply = Result<Response>;

#[derive(Default)]
struct PendingTable {
    slots: HashMap<String, oneshot::Sender<Reply>>,
    closed: bool,
}

/// Pending-request table shared by callers and the receive loop
#[derive(Default)]
pub struct Correlator {
    table: Mutex<PendingTable>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `id`
    ///
    /// Fails with `ConnectionClosed` once [`fail_all`](Self::fail_all) has run,
    /// so no slot can be created that nothing will ever resolve.
    pub fn register(&self, id: &str) -> Result<oneshot::Receiver<Reply>> {
        let mut table = self.table.lock();
        if table.closed {
            return Err(TetherError::ConnectionClosed);
        }
        if table.slots.contains_key(id) {
            return Err(TetherError::internal(format!(
                "request id {} is already pending",
                id
            )));
        }
        let (tx, rx) = oneshot::channel();
        table.slots.insert(id.to_string(), tx);
        Ok(rx)
    }

    /// Drop the slot for `id` without resolving it
    pub fn forget(&self, id: &str) -> bool {
        self.table.lock().slots.remove(id).is_some()
    }

    /// Hand a response to its waiting caller
    ///
    /// Returns `false` for responses nobody is waiting for (late, unknown,
    /// or missing an id).
    pub fn resolve(&self, response: Response) -> bool {
        let Some(id) = response.id.as_deref() else {
            return false;
        };
        let slot = self.table.lock().slots.remove(id);
        match slot {
            Some(tx) => tx.send(Ok(response)).is_ok(),
            None => false,
        }
    }

    /// Fail every pending slot with `ConnectionClosed` and refuse new ones
    pub fn fail_all(&self) -> usize {
        let slots: Vec<_> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.slots.drain().collect()
        };
        let count = slots.len();
        for (_, tx) in slots {
            let _ = tx.send(Err(TetherError::ConnectionClosed));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.table.lock().slots.len()
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }
}

/// Removes a slot when the awaiting caller goes away before resolution
pub(crate) struct SlotGuard<'a> {
    correlator: &'a Correlator,
    id: String,
}

impl<'a> SlotGuard<'a> {
    pub(crate) fn new(correlator: &'a Correlator, id: impl Into<String>) -> Self {
        Self {
            correlator,
            id: id.into(),
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.correlator.forget(&self.id);
    }
}

/// Turn a response into its result mapping
///
/// `ok: false` becomes [`TetherError::Remote`]; a result that is not a JSON
/// object becomes [`TetherError::BadResponse`]. A missing result is an
/// empty mapping.
pub fn into_result(response: Response) -> Result<Map<String, Value>> {
    if !response.ok {
        let ResponseError {
            code,
            message,
            data,
        } = response.error.unwrap_or_else(|| ResponseError {
            code: "UNKNOWN".into(),
            message: "Unknown error".into(),
            data: None,
        });
        return Err(TetherError::Remote {
            code,
            message,
            data,
        });
    }

    match response.result {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => {
            let payload = serde_json::json!({
                "id": response.id,
                "ok": true,
                "result": other,
            });
            Err(TetherError::bad_response("Expected object result", payload))
        }
    }
}
