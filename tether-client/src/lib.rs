//! tether-client: Async client engine for the tether bridge
//!
//! A [`Session`] owns one authenticated connection to the counterpart
//! process. Requests are correlated with their responses by id, pushed
//! events are fanned out to waiters, subscribers and a pull buffer, and the
//! latest status is kept in a small cache. On top of that sit the command
//! text builder, the typed remote-object protocol, task waits and the
//! blocking facade.

pub mod blocking;
pub mod commands;
pub mod config;
pub mod connection;
pub mod events;
pub mod settings;
pub mod tasks;
pub mod typed;

#[cfg(test)]
mod testing;

pub use blocking::BlockingClient;
pub use commands::{
    build_command_text, extract_task_id, lookup, quote_if_needed, CommandArg, CommandDispatchResult,
    CommandDomain, CommandSpec, Commands, CATALOG,
};
pub use config::{ClientConfig, ConnectionConfig};
pub use connection::{
    async_handler_fn, handler_fn, into_result, invoke_handler, AsyncCallbackHandler,
    CallbackHandler, Correlator, EventHandler, HandshakeInfo, Session, SessionOptions,
};
pub use events::{
    game_events_only, predicate, ChatMessage, EventMultiplexer, EventPredicate, GameEvent,
    GameEventHandler, PlayerInfo, StateCache, StateSnapshot, Subscription, SubscriptionGuard,
    SystemMessage,
};
pub use settings::{SettingHandle, Settings};
pub use tasks::{
    poll_until_idle, PathingActivity, PathingSource, PollState, PollStep, TypedTaskHandle,
    TypedTaskResult, WaitOptions,
};
pub use typed::{require_remote_ref, Automation, BlockSpec, GoalFactory};

pub use tether_protocol::{EventEnvelope, InvokeTarget, RemoteRef, RemoteValue};
pub use tether_utils::{ConnectionDescriptor, Result, TetherError};
