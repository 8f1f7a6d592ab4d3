//! Named handles over the `set` command

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use tether_utils::{Result, TetherError};

use crate::commands::{CommandArg, CommandDispatchResult};
use crate::connection::Session;

const SET: &str = "set";

/// Per-session settings bookkeeping, owned by the session itself
#[derive(Default)]
pub(crate) struct SettingsState {
    names: Mutex<HashSet<String>>,
    last_dispatch: Mutex<Option<CommandDispatchResult>>,
}

/// Factory of [`SettingHandle`]s for one session
///
/// Every `Settings` obtained from the same session shares the name cache
/// and the last dispatch.
#[derive(Clone)]
pub struct Settings {
    session: Session,
    state: Arc<SettingsState>,
}

impl Settings {
    pub fn new(session: Session) -> Self {
        let state = session.settings_state().clone();
        Self { session, state }
    }

    /// Handle for `name`, remembered on first use
    pub fn handle(&self, name: &str) -> Result<SettingHandle> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(TetherError::invalid_argument(format!(
                "invalid setting name: {:?}",
                name
            )));
        }

        self.state.names.lock().insert(name.to_string());
        Ok(SettingHandle {
            name: name.to_string(),
            session: self.session.clone(),
            state: self.state.clone(),
        })
    }

    /// Most recent dispatch made through any handle of this session
    pub fn last_dispatch(&self) -> Option<CommandDispatchResult> {
        self.state.last_dispatch.lock().clone()
    }

    pub fn cached(&self) -> usize {
        self.state.names.lock().len()
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("cached", &self.cached())
            .finish()
    }
}

/// One named setting
#[derive(Clone)]
pub struct SettingHandle {
    name: String,
    session: Session,
    state: Arc<SettingsState>,
}

impl SettingHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn dispatch(&self, args: &[CommandArg]) -> Result<CommandDispatchResult> {
        let dispatch = self.session.dispatch(SET, args).await?;
        *self.state.last_dispatch.lock() = Some(dispatch.clone());
        Ok(dispatch)
    }

    /// `set <name>`: the counterpart reports the current value
    pub async fn get(&self) -> Result<CommandDispatchResult> {
        self.dispatch(&[self.name.as_str().into()]).await
    }

    /// `set <name> <value>`
    pub async fn set(&self, value: impl Into<CommandArg>) -> Result<CommandDispatchResult> {
        self.dispatch(&[self.name.as_str().into(), value.into()]).await
    }

    /// `set toggle <name>`
    pub async fn toggle(&self) -> Result<CommandDispatchResult> {
        self.dispatch(&["toggle".into(), self.name.as_str().into()]).await
    }

    /// `set reset <name>`
    pub async fn reset(&self) -> Result<CommandDispatchResult> {
        self.dispatch(&["reset".into(), self.name.as_str().into()]).await
    }
}

impl std::fmt::Debug for SettingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingHandle")
            .field("name", &self.name)
            .finish()
    }
}

impl Session {
    /// Settings view backed by this session's shared bookkeeping
    pub fn settings(&self) -> Settings {
        Settings::new(self.clone())
    }
}
