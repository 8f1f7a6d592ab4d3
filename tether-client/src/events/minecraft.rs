//! Typed game events
//!
//! Decodes the `minecraft.*` events the bridge pushes into small value
//! types, and runs a [`GameEventHandler`] for the lifetime of a session with
//! ready and disconnect notifications around it.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use tether_protocol::{events, EventEnvelope};
use tether_utils::{Result, TetherError};

use super::multiplexer::predicate;
use crate::connection::{invoke_handler, EventHandler, Session};

/// Name used when a payload carries no usable one
const UNKNOWN_PLAYER: &str = "unknown";

/// A player as described by the bridge
///
/// Players with a uuid compare by uuid, players without one by name, both
/// ignoring case.
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub uuid: Option<String>,
    pub name: String,
    /// Whether this is the local player
    pub is_self: bool,
}

impl PlayerInfo {
    /// Decode a player object; `null` or a missing field is `None`
    pub fn from_payload(payload: Option<&Value>) -> Result<Option<Self>> {
        let object = match payload {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(object)) => object,
            Some(other) => {
                return Err(TetherError::bad_response(
                    "player payload must be an object or null",
                    other.clone(),
                ))
            }
        };

        let uuid = non_blank(object.get("uuid")).map(str::to_string);
        let name = non_blank(object.get("name"))
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|| UNKNOWN_PLAYER.to_string());
        let is_self = object.get("self").and_then(Value::as_bool).unwrap_or(false);
        Ok(Some(Self {
            uuid,
            name,
            is_self,
        }))
    }

    fn identity(&self) -> (bool, String) {
        match &self.uuid {
            Some(uuid) => (true, uuid.trim().to_lowercase()),
            None => (false, self.name.trim().to_lowercase()),
        }
    }
}

impl PartialEq for PlayerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for PlayerInfo {}

impl Hash for PlayerInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// A chat line written by a player
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message: String,
    pub author: Option<PlayerInfo>,
}

impl ChatMessage {
    pub fn from_payload(data: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            message: text_field(data, "message"),
            author: PlayerInfo::from_payload(data.get("author"))?,
        })
    }
}

/// A server or game message with no author
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    pub message: String,
    /// Shown above the hotbar rather than in chat
    pub overlay: bool,
}

impl SystemMessage {
    pub fn from_payload(data: &Map<String, Value>) -> Self {
        Self {
            message: text_field(data, "message"),
            overlay: data.get("overlay").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

/// One decoded `minecraft.*` event
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ChatMessage(ChatMessage),
    SystemMessage(SystemMessage),
    PlayerJoin(PlayerInfo),
    PlayerLeave(PlayerInfo),
    PlayerDeath(PlayerInfo),
    PlayerRespawn(PlayerInfo),
}

impl GameEvent {
    /// Decode `envelope`; `Ok(None)` for events that are not game events
    ///
    /// Non-object data decodes as an empty object. Player events without a
    /// player are a `BadResponse`.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Option<Self>> {
        let empty = Map::new();
        let data = envelope.data_object().unwrap_or(&empty);

        let player = |name: &str| -> Result<PlayerInfo> {
            PlayerInfo::from_payload(data.get("player"))?.ok_or_else(|| {
                TetherError::bad_response(
                    format!("{} payload requires player", name),
                    envelope.data.clone(),
                )
            })
        };

        let event = match envelope.event.as_str() {
            events::CHAT_MESSAGE => GameEvent::ChatMessage(ChatMessage::from_payload(data)?),
            events::SYSTEM_MESSAGE => GameEvent::SystemMessage(SystemMessage::from_payload(data)),
            events::PLAYER_JOIN => GameEvent::PlayerJoin(player(events::PLAYER_JOIN)?),
            events::PLAYER_LEAVE => GameEvent::PlayerLeave(player(events::PLAYER_LEAVE)?),
            events::PLAYER_DEATH => GameEvent::PlayerDeath(player(events::PLAYER_DEATH)?),
            events::PLAYER_RESPAWN => GameEvent::PlayerRespawn(player(events::PLAYER_RESPAWN)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Wire name of the event this was decoded from
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::ChatMessage(_) => events::CHAT_MESSAGE,
            GameEvent::SystemMessage(_) => events::SYSTEM_MESSAGE,
            GameEvent::PlayerJoin(_) => events::PLAYER_JOIN,
            GameEvent::PlayerLeave(_) => events::PLAYER_LEAVE,
            GameEvent::PlayerDeath(_) => events::PLAYER_DEATH,
            GameEvent::PlayerRespawn(_) => events::PLAYER_RESPAWN,
        }
    }

    /// Player the event is about, or the chat author
    pub fn player(&self) -> Option<&PlayerInfo> {
        match self {
            GameEvent::ChatMessage(chat) => chat.author.as_ref(),
            GameEvent::SystemMessage(_) => None,
            GameEvent::PlayerJoin(player)
            | GameEvent::PlayerLeave(player)
            | GameEvent::PlayerDeath(player)
            | GameEvent::PlayerRespawn(player) => Some(player),
        }
    }
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

fn text_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn done() -> BoxFuture<'static, Result<()>> {
    futures::future::ready(Ok(())).boxed()
}

/// Callbacks for [`Session::run_game_events`]
///
/// Every method has a no-op default. A callback error is passed to
/// [`GameEventHandler::on_error`] and the loop carries on.
pub trait GameEventHandler: Send + Sync + 'static {
    /// Authenticated and the initial status has been fetched
    fn on_ready(&self) -> BoxFuture<'static, Result<()>> {
        done()
    }

    fn on_game_event(&self, _event: GameEvent) -> BoxFuture<'static, Result<()>> {
        done()
    }

    /// Status, task and path events, undecoded
    fn on_event(&self, _event: EventEnvelope) -> BoxFuture<'static, Result<()>> {
        done()
    }

    /// The session closed; always the last callback
    fn on_disconnect(&self) -> BoxFuture<'static, Result<()>> {
        done()
    }

    fn on_error(&self, event: &str, error: &TetherError) {
        tracing::error!(event, "Unhandled error in game event handler: {}", error);
    }
}

/// Routes raw envelopes to a [`GameEventHandler`]
struct GameEventRouter {
    handler: Arc<dyn GameEventHandler>,
}

impl GameEventRouter {
    async fn route(handler: Arc<dyn GameEventHandler>, envelope: EventEnvelope) {
        let name = envelope.event.clone();
        let outcome = match GameEvent::from_envelope(&envelope) {
            Ok(Some(event)) => handler.on_game_event(event).await,
            Ok(None) if is_lifecycle_event(&name) => handler.on_event(envelope).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            handler.on_error(&name, &e);
        }
    }
}

impl EventHandler for GameEventRouter {
    fn handle(&self, event: EventEnvelope) -> BoxFuture<'static, Result<()>> {
        let handler = self.handler.clone();
        async move {
            GameEventRouter::route(handler, event).await;
            Ok(())
        }
        .boxed()
    }
}

fn is_lifecycle_event(name: &str) -> bool {
    name == events::STATUS_UPDATE
        || name == events::PATH_EVENT
        || events::ACTIVE_TASK_EVENTS.contains(&name)
        || events::is_terminal(name)
}

/// Run a callback future, reporting its error to `on_error`
async fn notify(
    handler: &dyn GameEventHandler,
    name: &str,
    callback: BoxFuture<'static, Result<()>>,
) {
    if let Err(e) = callback.await {
        handler.on_error(name, &e);
    }
}

impl Session {
    /// Local player, from the last status snapshot
    pub fn player(&self) -> Option<PlayerInfo> {
        let status = self.state().status;
        PlayerInfo::from_payload(status.get("player")).ok().flatten()
    }

    /// Drive `handler` until the session closes
    ///
    /// Subscribes to every event, fetches the status so [`Session::player`]
    /// is populated, calls `on_ready`, then waits for the session to close
    /// and calls `on_disconnect`.
    pub async fn run_game_events(&self, handler: Arc<dyn GameEventHandler>) -> Result<()> {
        let router = Arc::new(GameEventRouter {
            handler: handler.clone(),
        });
        let _subscription = self
            .subscribe(events::WILDCARD, router)?
            .unsubscribe_on_drop();

        if let Err(e) = self.status_get().await {
            tracing::debug!("Initial status fetch failed: {}", e);
        }
        notify(handler.as_ref(), "ready", handler.on_ready()).await;

        self.closed().await;
        notify(handler.as_ref(), "disconnect", handler.on_disconnect()).await;
        Ok(())
    }

    /// Wait for a game event named `name` that passes `check`
    ///
    /// Events that fail to decode never match.
    pub async fn wait_for_game_event<F>(
        &self,
        name: &str,
        check: F,
        timeout: Option<Duration>,
    ) -> Result<GameEvent>
    where
        F: Fn(&GameEvent) -> bool + Send + 'static,
    {
        let matcher = predicate(move |envelope| {
            matches!(GameEvent::from_envelope(envelope), Ok(Some(event)) if check(&event))
        });
        let envelope = self.wait_for(name, Some(matcher), timeout).await?;
        GameEvent::from_envelope(&envelope)?.ok_or_else(|| {
            TetherError::bad_response(
                format!("{} is not a game event", envelope.event),
                envelope.data.clone(),
            )
        })
    }
}

/// Adapter so a plain [`EventHandler`] sees decoded game events only
pub fn game_events_only(handler: Arc<dyn EventHandler>) -> Arc<dyn EventHandler> {
    Arc::new(GameEventFilter { handler })
}

struct GameEventFilter {
    handler: Arc<dyn EventHandler>,
}

impl EventHandler for GameEventFilter {
    fn handle(&self, event: EventEnvelope) -> BoxFuture<'static, Result<()>> {
        if !event.event.starts_with("minecraft.") {
            return done();
        }
        let handler = self.handler.clone();
        async move { invoke_handler(handler.as_ref(), event).await }.boxed()
    }
}
