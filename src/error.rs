//! Error types for the WebSocket protocol implementation.
//!
//! Errors fall into three groups: protocol violations (the peer broke
//! RFC 6455 and the connection must be failed with status 1002), size
//! rejections (a single encode or decode is refused, state is untouched),
//! and transport or handshake failures.

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::protocol::bits::BitError;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A peer violated the framing or fragmentation rules of RFC 6455.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Opcode is reserved or unknown.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// A new Text/Binary fragment started while another message was in progress.
    #[error("Data frame started while a fragmented message is in progress")]
    UnexpectedFragmentStart,

    /// Continuation frame with no message in progress.
    #[error("Continuation frame without a message in progress")]
    UnexpectedContinuation,

    /// Control frame with `fin` cleared.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload above 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Client frame arrived without a mask.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Server frame arrived with a mask.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Close payload of exactly one byte.
    #[error("Close payload must be empty or at least 2 bytes")]
    InvalidClosePayload,
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Bytes were fed to a session that cannot receive in its current state.
    #[error("Cannot process frames in state {0}")]
    InvalidStateForFrame(ConnectionState),

    /// Application call on a connection that is no longer open.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Payload length cannot be encoded on this platform.
    #[error("Payload too large to encode: {0} bytes")]
    PayloadTooLarge(usize),

    /// Bit-level field error.
    #[error("Bit field error: {0}")]
    Bits(#[from] BitError),

    /// Close code that must not be sent.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake exceeded the configured size.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Returns `true` if this error means the peer violated the protocol.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Close status code a connection should be failed with for this error.
    ///
    /// Returns `None` for errors that do not call for a Close frame.
    #[must_use]
    pub const fn close_code(&self) -> Option<u16> {
        match self {
            Error::Protocol(_) => Some(1002),
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => Some(1009),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
