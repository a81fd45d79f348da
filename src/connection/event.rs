//! Events a connection reports to the application.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::Error;
use crate::message::Message;

/// Something the application should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The upgrade completed and the connection is open.
    Connected,
    /// A complete data message.
    Message(Message),
    /// A Pong frame arrived.
    Pong(Bytes),
    /// The connection is finished. Reported exactly once.
    ///
    /// `code` is `0` when the peer's Close frame carried no status and
    /// `1006` when the transport went away without a close handshake.
    Closed {
        /// Status code.
        code: u16,
        /// Reason text.
        reason: String,
    },
    /// The transport failed. Always followed by [`Event::Closed`].
    TransportError(Error),
}

impl Event {
    /// Returns `true` for [`Event::Closed`].
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Event::Closed { .. })
    }
}

/// Receiver of connection events.
pub trait EventSink {
    /// Called once per event, in the order events occur.
    fn handle_event(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn handle_event(&mut self, event: Event) {
        self.push(event);
    }
}

impl EventSink for VecDeque<Event> {
    fn handle_event(&mut self, event: Event) {
        self.push_back(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn handle_event(&mut self, event: Event) {
        (**self).handle_event(event);
    }
}
