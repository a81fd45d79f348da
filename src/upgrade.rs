//! HTTP upgrade over a tokio stream.
//!
//! [`accept`] runs the server side, [`connect`] the client side. Both
//! return a [`Connection`] already in the `Open` state. Any bytes the peer
//! sent right behind the HTTP head are handed to the connection.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::{Config, Limits};
use crate::connection::{Connection, Role};
use crate::error::{Error, Result};
use crate::protocol::entropy::{MaskSource, default_source};
use crate::protocol::handshake::{
    BAD_REQUEST, HandshakeRequest, HandshakeResponse, find_header_end, generate_key_with,
};

const READ_CHUNK: usize = 1024;

/// Accept a client's upgrade request.
///
/// Answers `101 Switching Protocols` for a valid request and
/// `400 Bad Request` otherwise.
///
/// # Errors
///
/// - [`Error::InvalidHandshake`] for malformed requests or a missing key
/// - [`Error::HandshakeTooLarge`] if the head exceeds `max_handshake_size`
/// - I/O errors from the stream
pub async fn accept<T>(mut io: T, config: Config) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (request, leftover) = match read_request(&mut io, &config.limits).await {
        Ok(parsed) => parsed,
        Err(err) => {
            reject(&mut io, &err).await;
            return Err(err);
        }
    };

    let mut response = Vec::new();
    HandshakeResponse::from_request(&request).write(&mut response);
    io.write_all(&response).await?;
    io.flush().await?;

    info!(path = %request.path, host = %request.host, "upgrade accepted");
    Ok(Connection::with_leftover(io, Role::Server, config, &leftover))
}

async fn read_request<T>(io: &mut T, limits: &Limits) -> Result<(HandshakeRequest, Vec<u8>)>
where
    T: AsyncRead + Unpin,
{
    let (head, leftover) = read_head(io, limits).await?;
    let request = HandshakeRequest::parse(&head)?;
    request.validate()?;
    Ok((request, leftover))
}

async fn reject<T>(io: &mut T, err: &Error)
where
    T: AsyncWrite + Unpin,
{
    if matches!(err, Error::Io(_)) {
        return;
    }
    debug!(error = %err, "rejecting upgrade");
    if let Err(write_err) = io.write_all(BAD_REQUEST).await {
        debug!(error = %write_err, "could not send 400 response");
        return;
    }
    if let Err(err) = io.shutdown().await {
        debug!(error = %err, "shutdown after 400 failed");
    }
}

/// Perform the client side of the upgrade.
///
/// # Errors
///
/// - [`Error::InvalidHandshake`] if the server does not answer `101` or
///   its `Sec-WebSocket-Accept` does not match our key
/// - [`Error::HandshakeTooLarge`] if the response head is too large
/// - I/O errors from the stream
pub async fn connect<T>(io: T, host: &str, path: &str, config: Config) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    connect_with(io, host, path, config, default_source()).await
}

/// Like [`connect`], drawing the handshake key and masking keys from `source`.
///
/// # Errors
///
/// See [`connect`].
pub async fn connect_with<T>(
    mut io: T,
    host: &str,
    path: &str,
    config: Config,
    source: Arc<dyn MaskSource>,
) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let key = generate_key_with(source.as_ref());
    let mut request = Vec::new();
    HandshakeRequest::client(host, path, key.as_str()).write(&mut request)?;
    io.write_all(&request).await?;
    io.flush().await?;

    let (head, leftover) = read_head(&mut io, &config.limits).await?;
    HandshakeResponse::parse(&head)?.verify(&key)?;

    info!(host, path, "upgrade complete");
    Ok(Connection::with_leftover(io, Role::Client, config, &leftover).with_mask_source(source))
}

/// Read up to and including the blank line that ends an HTTP head.
///
/// Returns the head and whatever was read after it.
async fn read_head<T>(io: &mut T, limits: &Limits) -> Result<(Vec<u8>, Vec<u8>)>
where
    T: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = io.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::InvalidHandshake(
                "Connection closed during handshake".into(),
            ));
        }

        let search_from = buf.len().saturating_sub(3);
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_header_end(&buf[search_from..]) {
            let end = search_from + end;
            limits.check_handshake_size(end)?;
            let leftover = buf.split_off(end);
            return Ok((buf, leftover));
        }
        limits.check_handshake_size(buf.len())?;
    }
}
