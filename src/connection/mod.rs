//! Connection state machine and its async driver.
//!
//! ## Connection Lifecycle
//!
//! 1. **Handshaking** - HTTP upgrade in progress
//! 2. **Open** - messages flow in both directions
//! 3. **Closing** - a Close frame has been sent or received
//! 4. **Closed** - terminal
//!
//! [`Session`] holds the protocol rules and never performs I/O.
//! [`Connection`] feeds it from a tokio stream.

mod event;
mod role;
mod session;
mod state;

pub use event::{Event, EventSink};
pub use role::Role;
pub use session::Session;
pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;

#[cfg(feature = "async-tokio")]
pub use connection::Connection;
