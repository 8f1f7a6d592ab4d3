//! Event fan-out, the status cache it maintains and typed game events

mod minecraft;
mod multiplexer;
mod state;

pub use minecraft::{
    game_events_only, ChatMessage, GameEvent, GameEventHandler, PlayerInfo, SystemMessage,
};
pub use multiplexer::{predicate, EventMultiplexer, EventPredicate, Subscription, SubscriptionGuard};
pub use state::{StateCache, StateSnapshot};

pub(crate) use multiplexer::bounded;
