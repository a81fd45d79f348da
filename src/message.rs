//! Application messages and close codes as defined in RFC 6455.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::protocol::OpCode;
use crate::protocol::frame::{MAX_CONTROL_FRAME_PAYLOAD, close_payload};

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001). Server shutdown or page navigation.
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Abnormal closure (1006). Reported locally, never sent.
    Abnormal,
    /// Invalid payload (1007).
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may be sent in a Close frame (RFC 6455 Section 7.4.1).
    ///
    /// Valid: 1000-1003, 1007-1014, 3000-4999.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self::from_u16(code)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Parsed Close frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseFrame {
    /// Status code, absent when the payload was empty.
    pub code: Option<CloseCode>,
    /// Reason text, decoded lossily as UTF-8.
    pub reason: String,
}

impl CloseFrame {
    /// Create a close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Parse a Close payload: empty, or a 2-byte big-endian code followed by a reason.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidClosePayload`] for a 1-byte payload.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        match payload {
            [] => Ok(Self::default()),
            [_] => Err(ProtocolError::InvalidClosePayload),
            [hi, lo, reason @ ..] => Ok(Self {
                code: Some(CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]))),
                reason: String::from_utf8_lossy(reason).into_owned(),
            }),
        }
    }

    /// Numeric status, `0` when the peer sent none.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.code.map_or(0, |code| code.as_u16())
    }

    /// Encode as a Close payload, truncating the reason to fit a control frame.
    #[must_use]
    pub fn to_payload(&self) -> Bytes {
        let code = self.code.map(|c| c.as_u16());
        close_payload(code, truncate_reason(&self.reason))
    }
}

/// Longest prefix of `reason` that fits beside a status code and ends on a char boundary.
pub(crate) fn truncate_reason(reason: &str) -> &str {
    let max = MAX_CONTROL_FRAME_PAYLOAD - 2;
    if reason.len() <= max {
        return reason;
    }
    let mut end = max;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// A complete application message.
///
/// Payloads are carried as raw bytes; text messages are not validated as
/// UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message.
    Text(Bytes),
    /// A binary message.
    Binary(Bytes),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(Bytes::from(s.into()))
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Message::Binary(data.into())
    }

    pub(crate) fn from_opcode(opcode: OpCode, payload: Bytes) -> Option<Self> {
        match opcode {
            OpCode::Text => Some(Message::Text(payload)),
            OpCode::Binary => Some(Message::Binary(payload)),
            _ => None,
        }
    }

    /// Opcode that starts this message on the wire.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Borrow the payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        match self {
            Message::Text(data) | Message::Binary(data) => data,
        }
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        match self {
            Message::Text(data) | Message::Binary(data) => data,
        }
    }

    /// Borrow the text, if this is a text message holding valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(data) => std::str::from_utf8(data).ok(),
            Message::Binary(_) => None,
        }
    }
}
