//! Connection to the counterpart
//!
//! Provides the TCP transport session with request correlation and async
//! event dispatch.

mod correlator;
mod handler;
mod session;

pub use correlator::{into_result, Correlator};
pub use handler::{
    async_handler_fn, handler_fn, invoke_handler, AsyncCallbackHandler, CallbackHandler,
    EventHandler,
};
pub use session::{HandshakeInfo, Session, SessionOptions};

pub(crate) use handler::deliver;
