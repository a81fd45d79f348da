//! # nocket - RFC 6455 WebSocket framing and sessions
//!
//! `nocket` splits a WebSocket connection into layers that can be used
//! and tested on their own:
//!
//! - **Codec** - [`encode_frame`] and [`decode_frames`], with an explicit
//!   [`PartialFrame`](protocol::PartialFrame) carried between reads
//! - **Reassembly** - [`Reassembler`](protocol::Reassembler) joins fragments
//!   into [`Message`]s
//! - **Session** - [`Session`] applies the protocol rules (auto-pong,
//!   close handshake, connection failure) and reports [`Event`]s
//! - **Transport** - [`Connection`] and the [`upgrade`] helpers drive a
//!   session over any tokio stream
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nocket::{Config, Event, upgrade};
//!
//! let (stream, _) = listener.accept().await?;
//! let mut conn = upgrade::accept(stream, Config::default()).await?;
//! while let Some(event) = conn.next_event().await {
//!     if let Event::Message(msg) = event {
//!         conn.send_binary(msg.into_payload()).await?;
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod upgrade;

pub use config::{Config, Limits};
#[cfg(feature = "async-tokio")]
pub use connection::Connection;
pub use connection::{ConnectionState, Event, EventSink, Role, Session};
pub use error::{Error, ProtocolError, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{
    HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, apply_mask, compute_accept_key,
    decode_frames, encode_close, encode_frame, generate_key,
};
