//! Message reassembly from fragments (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{ProtocolError, Result};
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented messages for one connection.
///
/// Holds at most one message in progress. Control frames pass through
/// without touching that state.
#[derive(Debug, Clone)]
pub struct Reassembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl Reassembler {
    /// Create an idle reassembler.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Feed one frame.
    ///
    /// Returns `Some(message)` when the frame completes a message.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FragmentedControlFrame`] - control frame with FIN=0
    /// - [`ProtocolError::UnexpectedContinuation`] - continuation with nothing in progress
    /// - [`ProtocolError::UnexpectedFragmentStart`] - Text/Binary while a message is in progress
    /// - [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) and
    ///   [`Error::TooManyFragments`](crate::Error::TooManyFragments) when limits are exceeded;
    ///   the frame is not applied
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        let opcode = frame.opcode();
        if opcode.is_control() {
            if !frame.fin() {
                return Err(ProtocolError::FragmentedControlFrame.into());
            }
            return Ok(None);
        }

        match (opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(ProtocolError::UnexpectedContinuation.into());
            }
            (OpCode::Text | OpCode::Binary, Some(_)) => {
                return Err(ProtocolError::UnexpectedFragmentStart.into());
            }
            _ => {}
        }

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if opcode != OpCode::Continuation && frame.fin() {
            return Ok(Message::from_opcode(opcode, frame.into_payload()));
        }

        if opcode != OpCode::Continuation {
            self.opcode = Some(opcode);
        }
        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin() {
            return Ok(None);
        }

        let payload = self.buffer.split().freeze();
        let started = self.opcode.take();
        self.fragment_count = 0;
        Ok(started.and_then(|op| Message::from_opcode(op, payload)))
    }

    /// Whether a fragmented message is in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Discard any message in progress.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}
