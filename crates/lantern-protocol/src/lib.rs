//! Host <-> view protocol for Lantern.
//!
//! A Lantern view lives inside a host application (a chat or agent front end)
//! and talks to it over a one-way-per-call message channel. This crate owns
//! everything on the view side of that channel:
//!
//! - [`message`]: the JSON-RPC envelope and inbound classification (with the
//!   legacy fallback path for hosts that do not send a `jsonrpc` marker)
//! - [`origin`] / [`transport`]: the origin allow-list and the [`Transport`]
//!   seam the view posts through
//! - [`client`]: the correlation-id tool-call client with per-call timeouts
//! - [`session`]: the handshake state machine and request acknowledgement

pub mod client;
pub mod error;
pub mod message;
pub mod origin;
pub mod session;
pub mod transport;

pub use client::{DEFAULT_TOOL_TIMEOUT, ToolClient};
pub use error::{ProtocolError, ToolCallError};
pub use message::{Envelope, Inbound, RpcError};
pub use origin::OriginPolicy;
pub use session::{ProtocolSession, SessionConfig, SessionEvent};
pub use transport::{Boundary, ChannelTransport, InboundFrame, Transport};
