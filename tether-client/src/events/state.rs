//! Read-only projection of counterpart status
//!
//! Folded from `status.update` and `task.*` events by the multiplexer. Never
//! consulted when building requests.

use parking_lot::RwLock;
use serde_json::{Map, Value};

use tether_protocol::{events, EventEnvelope};

/// Point-in-time copy of the cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// Last full status mapping
    pub status: Map<String, Value>,
    /// Payload of the task currently considered active, if any
    pub active_task: Option<Map<String, Value>>,
    /// Timestamp of the last event folded in
    pub last_update: Option<String>,
}

impl StateSnapshot {
    pub fn active_task_id(&self) -> Option<&str> {
        self.active_task
            .as_ref()
            .and_then(|task| task.get("task_id"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Default)]
pub struct StateCache {
    inner: RwLock<StateSnapshot>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the cache; returns whether it was recognized
    pub fn apply(&self, envelope: &EventEnvelope) -> bool {
        let name = envelope.event.as_str();
        let recognized = if name == events::STATUS_UPDATE {
            let status = match envelope.data.get("status") {
                Some(Value::Object(status)) => Some(status.clone()),
                _ => envelope.data_object().cloned(),
            };
            match status {
                Some(status) => {
                    self.replace_status(status);
                    true
                }
                None => false,
            }
        } else if events::ACTIVE_TASK_EVENTS.contains(&name) {
            match envelope.data_object() {
                Some(data) => {
                    self.merge_active(data);
                    true
                }
                None => false,
            }
        } else if events::is_terminal(name) {
            if let Some(task_id) = envelope.task_id() {
                let mut state = self.inner.write();
                if state.active_task_id() == Some(task_id) {
                    state.active_task = None;
                }
            }
            true
        } else {
            false
        };

        if recognized {
            if let Some(ts) = &envelope.ts {
                self.inner.write().last_update = Some(ts.clone());
            }
        }
        recognized
    }

    /// Replace the whole status mapping
    ///
    /// An `active_task` object inside the status is adopted as the active
    /// task; a null or missing one leaves the cached task alone.
    pub fn replace_status(&self, status: Map<String, Value>) {
        let mut state = self.inner.write();
        if let Some(Value::Object(task)) = status.get("active_task") {
            state.active_task = Some(task.clone());
        }
        state.status = status;
    }

    fn merge_active(&self, data: &Map<String, Value>) {
        let mut state = self.inner.write();
        let incoming = data.get("task_id").and_then(Value::as_str);
        let same_task = match (state.active_task_id(), incoming) {
            (Some(current), Some(incoming)) => current == incoming,
            _ => true,
        };

        if !same_task || state.active_task.is_none() {
            state.active_task = Some(Map::new());
        }
        if let Some(task) = state.active_task.as_mut() {
            for (key, value) in data {
                task.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.read().clone()
    }

    pub fn status(&self) -> Map<String, Value> {
        self.inner.read().status.clone()
    }

    pub fn active_task(&self) -> Option<Map<String, Value>> {
        self.inner.read().active_task.clone()
    }

    pub fn last_update(&self) -> Option<String> {
        self.inner.read().last_update.clone()
    }
}
