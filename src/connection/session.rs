//! Transport-independent connection state machine.
//!
//! A [`Session`] never touches a socket. Bytes read from the transport go
//! in through [`Session::receive`]; frames to write come out of
//! [`Session::take_outgoing`]; everything the application should see is
//! delivered to an [`EventSink`]. The async driver in
//! [`Connection`](crate::Connection) is a thin loop around these calls.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::connection::event::{Event, EventSink};
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, truncate_reason};
use crate::protocol::assembler::Reassembler;
use crate::protocol::decoder::{DecodeStep, FrameDecoder, PartialFrame};
use crate::protocol::entropy::{MaskSource, default_source};
use crate::protocol::{Frame, OpCode};

/// Status reported when the transport drops without a close handshake.
const ABNORMAL_CLOSURE: u16 = 1006;

/// One WebSocket session over one transport stream.
pub struct Session {
    role: Role,
    state: ConnectionState,
    decoder: FrameDecoder,
    reassembler: Reassembler,
    pending: Option<PartialFrame>,
    inbound: BytesMut,
    outbox: VecDeque<Bytes>,
    close_sent: bool,
    close_received: bool,
    closed_emitted: bool,
    entropy: Arc<dyn MaskSource>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("buffered", &self.inbound.len())
            .field("queued", &self.outbox.len())
            .field("close_sent", &self.close_sent)
            .field("close_received", &self.close_received)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session in the `Handshaking` state.
    #[must_use]
    pub fn new(role: Role, config: &Config) -> Self {
        let decoder = FrameDecoder::new(role, config.limits.clone())
            .with_accept_unmasked(config.accept_unmasked_frames);
        Self {
            role,
            state: ConnectionState::Handshaking,
            decoder,
            reassembler: Reassembler::new(config.limits.clone()),
            pending: None,
            inbound: BytesMut::with_capacity(config.read_buffer_size),
            outbox: VecDeque::new(),
            close_sent: false,
            close_received: false,
            closed_emitted: false,
            entropy: default_source(),
        }
    }

    /// Draw masking keys from `source` instead of the process-wide default.
    #[must_use]
    pub fn with_mask_source(mut self, source: Arc<dyn MaskSource>) -> Self {
        self.entropy = source;
        self
    }

    /// Our role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Mark the upgrade as complete.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidStateForFrame`] unless the session is `Handshaking`.
    pub fn open<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        if self.state != ConnectionState::Handshaking {
            return Err(Error::InvalidStateForFrame(self.state));
        }
        self.state = ConnectionState::Open;
        debug!(role = %self.role, "connection open");
        sink.handle_event(Event::Connected);
        Ok(())
    }

    /// Feed bytes read from the transport.
    ///
    /// Complete frames are applied in order. Incomplete trailing data is
    /// kept for the next call.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidStateForFrame`] while `Handshaking` or `Closed`
    /// - [`Error::Protocol`] after the connection has been failed with 1002
    /// - size errors, with the state left as is. Buffered input, including
    ///   the rejected frame, is dropped and the stream cannot be resumed
    ///   mid-frame, so callers should follow up with
    ///   [`Session::fail_connection`]
    pub fn receive<S: EventSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<()> {
        if !self.state.can_receive() {
            return Err(Error::InvalidStateForFrame(self.state));
        }
        if self.close_received {
            trace!(len = chunk.len(), "ignoring bytes after close");
            return Ok(());
        }
        self.inbound.extend_from_slice(chunk);

        loop {
            let (step, used) = match self.decoder.step(&self.inbound, self.pending.take()) {
                Ok(decoded) => decoded,
                Err(err) => {
                    self.inbound.clear();
                    return Err(self.reject(err, sink));
                }
            };
            self.inbound.advance(used);

            match step {
                DecodeStep::Frame(frame) => {
                    if let Err(err) = self.handle_frame(frame, sink) {
                        return Err(self.reject(err, sink));
                    }
                    if self.close_received {
                        self.inbound.clear();
                        break;
                    }
                    if self.inbound.is_empty() {
                        break;
                    }
                }
                DecodeStep::Pending(partial) => {
                    self.pending = Some(partial);
                    break;
                }
                DecodeStep::NeedMore => break,
            }
        }
        Ok(())
    }

    fn handle_frame<S: EventSink + ?Sized>(&mut self, frame: Frame, sink: &mut S) -> Result<()> {
        match frame.opcode() {
            OpCode::Ping => {
                if self.state == ConnectionState::Open {
                    debug!(len = frame.payload().len(), "answering ping");
                    self.queue(&Frame::pong(frame.into_payload()))?;
                }
            }
            OpCode::Pong => sink.handle_event(Event::Pong(frame.into_payload())),
            OpCode::Close => self.on_close(frame.payload(), sink)?,
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                if self.state == ConnectionState::Closing {
                    trace!(opcode = ?frame.opcode(), "discarding data while closing");
                    return Ok(());
                }
                if let Some(message) = self.reassembler.push(frame)? {
                    sink.handle_event(Event::Message(message));
                }
            }
        }
        Ok(())
    }

    fn on_close<S: EventSink + ?Sized>(&mut self, payload: &[u8], sink: &mut S) -> Result<()> {
        let close = CloseFrame::parse(payload)?;
        self.close_received = true;
        let status = close.status();

        if self.close_sent {
            self.state = ConnectionState::Closed;
            self.reassembler.reset();
            debug!(code = status, "close handshake complete");
            self.emit_closed(status, close.reason, sink);
            return Ok(());
        }

        let echo = close
            .code
            .map(|code| if code.is_valid() { code } else { CloseCode::Normal });
        self.state = ConnectionState::Closing;
        self.reassembler.reset();
        debug!(code = status, "close received, echoing");
        self.emit_closed(status, close.reason, sink);
        self.queue(&Frame::close(echo.map(|code| code.as_u16()), ""))?;
        self.close_sent = true;
        Ok(())
    }

    fn reject<S: EventSink + ?Sized>(&mut self, err: Error, sink: &mut S) -> Error {
        if err.is_protocol_violation() {
            self.fail_connection(CloseCode::ProtocolError, &err.to_string(), sink);
        }
        err
    }

    /// Fail the connection: queue a Close with `code` if none was sent,
    /// drop all buffered input and move to `Closed`.
    pub fn fail_connection<S: EventSink + ?Sized>(
        &mut self,
        code: CloseCode,
        reason: &str,
        sink: &mut S,
    ) {
        if self.state == ConnectionState::Closed {
            return;
        }
        warn!(code = code.as_u16(), reason, "failing connection");

        let reason = truncate_reason(reason);
        if !self.close_sent {
            match self.queue(&Frame::close(Some(code.as_u16()), reason)) {
                Ok(()) => self.close_sent = true,
                Err(err) => warn!(error = %err, "could not encode close frame"),
            }
        }
        self.discard_input();
        self.state = ConnectionState::Closed;
        self.emit_closed(code.as_u16(), reason.to_owned(), sink);
    }

    /// Queue a text message.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] unless the session is `Open`.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.queue(&Frame::text(text.to_owned()))
    }

    /// Queue a binary message.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] unless the session is `Open`.
    pub fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        self.queue(&Frame::binary(data))
    }

    /// Queue a Ping.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] unless the session is `Open`
    /// - [`ProtocolError::ControlFrameTooLarge`](crate::ProtocolError::ControlFrameTooLarge)
    ///   for payloads over 125 bytes
    pub fn send_ping(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        self.queue(&Frame::ping(data))
    }

    /// Start the close handshake.
    ///
    /// Does nothing outside `Open`. The reason is cut to fit a control
    /// frame.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCloseCode`] for codes that may not be sent.
    pub fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if !code.is_valid() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        if self.state != ConnectionState::Open {
            return Ok(());
        }
        self.queue(&Frame::close(Some(code.as_u16()), truncate_reason(reason)))?;
        self.close_sent = true;
        self.state = ConnectionState::Closing;
        debug!(code = code.as_u16(), "close sent");
        Ok(())
    }

    /// Whether encoded frames are waiting to be written.
    #[must_use]
    pub fn has_outgoing(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Take every encoded frame queued for the transport, in order.
    pub fn take_outgoing(&mut self) -> Vec<Bytes> {
        self.outbox.drain(..).collect()
    }

    /// Tell the session that everything taken so far has been written.
    ///
    /// Completes the close handshake once our echo is on the wire.
    pub fn on_flushed(&mut self) {
        if self.state == ConnectionState::Closing && self.close_sent && self.close_received {
            self.state = ConnectionState::Closed;
            debug!("close echo flushed");
        }
    }

    /// The transport reached end of stream.
    ///
    /// Any message in progress is discarded. Reports `Closed(1006)` unless
    /// a close was already reported.
    pub fn transport_closed<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        if self.state != ConnectionState::Closed {
            debug!(state = %self.state, "transport closed");
        }
        self.discard_input();
        self.outbox.clear();
        self.state = ConnectionState::Closed;
        self.emit_closed(ABNORMAL_CLOSURE, String::new(), sink);
    }

    /// The transport failed with `err`.
    ///
    /// Reports [`Event::TransportError`] then behaves like
    /// [`Session::transport_closed`].
    pub fn transport_failed<S: EventSink + ?Sized>(&mut self, err: Error, sink: &mut S) {
        if self.closed_emitted {
            debug!(error = %err, "transport error after close");
        } else {
            warn!(error = %err, "transport error");
            sink.handle_event(Event::TransportError(err));
        }
        self.transport_closed(sink);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.can_send() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }

    fn queue(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.entropy.mask_key());
        let bytes = frame.to_bytes(mask)?;
        trace!(opcode = ?frame.opcode(), len = frame.payload().len(), "frame queued");
        self.outbox.push_back(bytes);
        Ok(())
    }

    fn discard_input(&mut self) {
        self.reassembler.reset();
        self.pending = None;
        self.inbound.clear();
    }

    fn emit_closed<S: EventSink + ?Sized>(&mut self, code: u16, reason: String, sink: &mut S) {
        if !self.closed_emitted {
            self.closed_emitted = true;
            sink.handle_event(Event::Closed { code, reason });
        }
    }
}
