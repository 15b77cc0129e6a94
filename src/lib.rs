//! Async WebSocket codec and connection engine for the Tokio stack.
//!
//! Implements [RFC 6455](https://datatracker.ietf.org/doc/html/rfc6455)
//! framing, masking, fragmentation reassembly, and the client opening
//! handshake over any `AsyncRead + AsyncWrite` transport — a plain TCP
//! stream, a TLS stream, or an in-memory duplex for tests.

mod assembler;
pub mod close;
pub mod config;
pub mod error;
pub mod frame;
pub mod handshake;
mod mask;
pub mod message;
mod reader;
pub mod session;
pub mod split;
mod utf8;
mod utils;
mod writer;

pub use config::{Role, WebSocketConfig};
pub use error::{Error, HandshakeFailure};
pub use frame::{Frame, OpCode};
pub use handshake::{connect_async, connect_async_with_config};
pub use message::{ControlFrame, Incoming, MessageKind};
pub use session::{Session, State};
pub use split::{SessionReader, SessionWriter};
