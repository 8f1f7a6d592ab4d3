//! tether-protocol: Wire definitions for the tether bridge
//!
//! This crate defines the frames exchanged with the counterpart process
//! (requests, responses, and pushed events), the newline-delimited JSON codec
//! used to carry them over a TCP stream, and the value encoding used by the
//! typed remote-object protocol.

pub mod codec;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{CodecError, FrameCodec};
pub use messages::{events, methods, EventEnvelope, Frame, Request, Response, ResponseError};
pub use types::{InvokeTarget, RemoteRef, RemoteValue, REF_KEY, REF_TYPE_KEY};

/// Protocol version spoken by this client
pub const PROTOCOL_VERSION: u32 = 1;
