use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::Config;
use crate::connection::event::{Event, EventSink};
use crate::connection::session::Session;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::entropy::MaskSource;

/// A WebSocket connection over an async byte stream.
///
/// Drives a [`Session`] with reads and writes on `T`. Frames are read and
/// applied strictly in order; writes issued by the session (pongs, close
/// echoes) reach the transport before the event that caused them is
/// returned.
///
/// ## Type Parameters
///
/// - `T`: the transport, e.g. `TcpStream` or `tokio::io::DuplexStream`
///
/// ## Example
///
/// ```rust,ignore
/// use nocket::{Config, Connection, Event, Role};
///
/// let stream = tokio::net::TcpStream::connect("localhost:9001").await?;
/// let mut conn = Connection::new(stream, Role::Client, Config::default());
///
/// conn.send_text("Hello").await?;
/// while let Some(event) = conn.next_event().await {
///     println!("{:?}", event);
/// }
/// ```
pub struct Connection<T> {
    io: T,
    session: Session,
    read_buf: Vec<u8>,
    events: VecDeque<Event>,
    shut_down: bool,
}

impl<T> Connection<T> {
    /// Wrap a stream whose upgrade has already completed.
    ///
    /// The first event reported is [`Event::Connected`].
    pub fn new(io: T, role: Role, config: Config) -> Self {
        let mut session = Session::new(role, &config);
        let mut events = VecDeque::new();
        if let Err(err) = session.open(&mut events) {
            debug!(error = %err, "session already open");
        }
        Self {
            io,
            session,
            read_buf: vec![0u8; config.read_buffer_size.max(1)],
            events,
            shut_down: false,
        }
    }

    /// Like [`Connection::new`], feeding bytes that were read past the end
    /// of the HTTP upgrade.
    pub fn with_leftover(io: T, role: Role, config: Config, leftover: &[u8]) -> Self {
        let mut conn = Self::new(io, role, config);
        if !leftover.is_empty() {
            if let Err(err) = conn.session.receive(leftover, &mut conn.events) {
                conn.on_receive_error(&err);
            }
        }
        conn
    }

    /// Draw masking keys from `source`.
    #[must_use]
    pub fn with_mask_source(mut self, source: Arc<dyn MaskSource>) -> Self {
        self.session = self.session.with_mask_source(source);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Our role.
    pub fn role(&self) -> Role {
        self.session.role()
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.io
    }

    fn on_receive_error(&mut self, err: &Error) {
        if err.is_protocol_violation() {
            return;
        }
        match err.close_code() {
            Some(code) => {
                self.session
                    .fail_connection(CloseCode::from_u16(code), &err.to_string(), &mut self.events);
            }
            None => debug!(error = %err, "receive rejected"),
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Send a text message.
    ///
    /// ## Errors
    ///
    /// - [`Error::ConnectionClosed`] unless the connection is open
    /// - I/O errors from the transport
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.session.send_text(text)?;
        self.flush_outgoing().await
    }

    /// Send a binary message.
    ///
    /// ## Errors
    ///
    /// Same as [`Connection::send_text`].
    pub async fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.session.send_binary(data)?;
        self.flush_outgoing().await
    }

    /// Send a Ping. The peer's Pong arrives as [`Event::Pong`].
    ///
    /// ## Errors
    ///
    /// Same as [`Connection::send_text`], plus control-frame size errors.
    pub async fn send_ping(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.session.send_ping(data)?;
        self.flush_outgoing().await
    }

    /// Start the close handshake.
    ///
    /// Keep calling [`Connection::next_event`] to receive the peer's
    /// Close; it returns `None` once the handshake is done.
    ///
    /// ## Errors
    ///
    /// - [`Error::InvalidCloseCode`] for codes that may not be sent
    /// - I/O errors from the transport
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.session.close(code, reason)?;
        self.flush_outgoing().await
    }

    /// Write every frame the session has queued.
    ///
    /// The transport is shut down once the session reaches `Closed`.
    ///
    /// ## Errors
    ///
    /// I/O errors from the transport. The failure is also reported as
    /// [`Event::TransportError`].
    pub async fn flush_outgoing(&mut self) -> Result<()> {
        if self.session.has_outgoing() {
            for frame in self.session.take_outgoing() {
                if let Err(err) = self.io.write_all(&frame).await {
                    return Err(self.fail_transport(err));
                }
            }
            if let Err(err) = self.io.flush().await {
                return Err(self.fail_transport(err));
            }
            self.session.on_flushed();
        }

        if !self.session.state().is_active() {
            self.shutdown_once().await;
        }
        Ok(())
    }

    async fn shutdown_once(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Err(err) = self.io.shutdown().await {
            debug!(error = %err, "shutdown after close failed");
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the connection is closed and every event has
    /// been delivered.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.session.has_outgoing() && self.flush_outgoing().await.is_err() {
                continue;
            }
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if !self.session.state().is_active() {
                self.shutdown_once().await;
                return None;
            }

            let n = match self.io.read(&mut self.read_buf).await {
                Ok(n) => n,
                Err(err) => {
                    self.fail_transport(err);
                    continue;
                }
            };
            if n == 0 {
                self.session.transport_closed(&mut self.events);
                continue;
            }
            if let Err(err) = self.session.receive(&self.read_buf[..n], &mut self.events) {
                self.on_receive_error(&err);
            }
        }
    }

    /// Deliver every event to `sink` until the connection closes.
    pub async fn run<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        while let Some(event) = self.next_event().await {
            sink.handle_event(event);
        }
    }

    fn fail_transport(&mut self, err: std::io::Error) -> Error {
        let err = Error::from(err);
        self.session.transport_failed(err.clone(), &mut self.events);
        err
    }
}
