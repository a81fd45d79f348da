//! WebSocket opening handshake (RFC 6455 Section 4).
//!
//! Key derivation is pure: the server answers a client's
//! `Sec-WebSocket-Key` with `base64(SHA-1(key + GUID))`, and the client
//! sends 16 random bytes, base64-encoded. The request and response types
//! parse and serialize the minimal HTTP/1.1 exchange around those keys.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::entropy::{MaskSource, default_source};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Response written when an upgrade request is rejected.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n";

/// Parse header lines into a map keyed by lowercase name.
///
/// Duplicates of any name in `security_headers` are rejected.
fn parse_headers<'a, I>(
    lines: I,
    security_headers: Option<&[&str]>,
) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name_lower = name.trim().to_lowercase();

            if let Some(sec_headers) = security_headers {
                if sec_headers.contains(&name_lower.as_str()) && headers.contains_key(&name_lower) {
                    return Err(Error::InvalidHandshake(format!(
                        "Duplicate header: {}",
                        name.trim()
                    )));
                }
            }

            headers.insert(name_lower, value.trim().to_string());
        }
    }

    Ok(headers)
}

fn require<'h>(headers: &'h HashMap<String, String>, name: &str, label: &str) -> Result<&'h str> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidHandshake(format!("Missing {} header", label)))
}

fn check_upgrade_headers(headers: &HashMap<String, String>) -> Result<()> {
    let upgrade = require(headers, "upgrade", "Upgrade")?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Upgrade header: {}",
            upgrade
        )));
    }

    let connection = require(headers, "connection", "Connection")?;
    if !connection.to_lowercase().contains("upgrade") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Connection header: {}",
            connection
        )));
    }
    Ok(())
}

fn check_header_value(name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHandshake(format!(
            "{} contains CR or LF characters",
            name
        )));
    }
    Ok(())
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// # Example
///
/// ```
/// use nocket::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh client `Sec-WebSocket-Key`.
#[must_use]
pub fn generate_key() -> String {
    generate_key_with(default_source().as_ref())
}

/// Generate a client key from `source`.
#[must_use]
pub fn generate_key_with(source: &dyn MaskSource) -> String {
    let mut nonce = [0u8; 16];
    source.fill(&mut nonce);
    BASE64.encode(nonce)
}

/// Index just past the `\r\n\r\n` that ends an HTTP head, if present.
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Parsed WebSocket upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path (e.g., "/chat").
    pub path: String,
    /// The Host header value.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Sec-WebSocket-Version (should be 13).
    pub version: u8,
}

impl HandshakeRequest {
    /// Build the request a client sends.
    #[must_use]
    pub fn client(host: impl Into<String>, path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
            key: key.into(),
            version: 13,
        }
    }

    /// Parse an upgrade request from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The request line is malformed, not `GET`, or not `HTTP/1.1`.
    /// - Any of `Upgrade`, `Connection`, `Host`, `Sec-WebSocket-Key`,
    ///   `Sec-WebSocket-Version` is missing or duplicated.
    /// - `Upgrade` is not `websocket` or `Connection` lacks `upgrade`.
    /// - The version is not an integer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, path, version] = parts.as_slice() else {
            return Err(Error::InvalidHandshake("Invalid request line".into()));
        };

        if *method != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "Expected GET method, got {}",
                method
            )));
        }

        if !version.starts_with("HTTP/1.1") {
            return Err(Error::InvalidHandshake(format!(
                "Expected HTTP/1.1, got {}",
                version
            )));
        }

        let security_headers = [
            "host",
            "upgrade",
            "connection",
            "sec-websocket-key",
            "sec-websocket-version",
        ];
        let headers = parse_headers(lines, Some(&security_headers))?;
        check_upgrade_headers(&headers)?;

        let host = require(&headers, "host", "Host")?.to_string();
        let key = require(&headers, "sec-websocket-key", "Sec-WebSocket-Key")?.to_string();
        let version_str = require(&headers, "sec-websocket-version", "Sec-WebSocket-Version")?;
        let version: u8 = version_str
            .parse()
            .map_err(|_| Error::InvalidHandshake(format!("Invalid version: {}", version_str)))?;

        Ok(Self {
            path: path.to_string(),
            host,
            key,
            version,
        })
    }

    /// Validate the request according to RFC 6455.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the version is not 13, the
    /// key does not decode to 16 bytes, or the host is empty.
    pub fn validate(&self) -> Result<()> {
        if self.version != 13 {
            return Err(Error::InvalidHandshake(format!(
                "Unsupported WebSocket version: {} (expected 13)",
                self.version
            )));
        }

        match BASE64.decode(&self.key) {
            Ok(decoded) if decoded.len() == 16 => {}
            Ok(decoded) => {
                return Err(Error::InvalidHandshake(format!(
                    "Sec-WebSocket-Key must be 16 bytes, got {}",
                    decoded.len()
                )));
            }
            Err(_) => {
                return Err(Error::InvalidHandshake(
                    "Invalid Sec-WebSocket-Key: not valid Base64".into(),
                ));
            }
        }

        if self.host.is_empty() {
            return Err(Error::InvalidHandshake("Host header cannot be empty".into()));
        }

        Ok(())
    }

    /// Write the HTTP request to a buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the host or path contain CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        check_header_value("Host", &self.host)?;
        check_header_value("path", &self.path)?;

        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Version: {}\r\n", self.version).as_bytes());
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// WebSocket handshake response from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Create the response for a validated request.
    #[must_use]
    pub fn from_request(req: &HandshakeRequest) -> Self {
        Self {
            accept: compute_accept_key(&req.key),
        }
    }

    /// Write the `101 Switching Protocols` response to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    /// Parse a handshake response from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the data is not UTF-8, the
    /// status is not `101`, or `Upgrade`, `Connection` or
    /// `Sec-WebSocket-Accept` are missing or wrong.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;

        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {}",
                status_line
            )));
        }

        let headers = parse_headers(lines, None)?;
        check_upgrade_headers(&headers)?;

        let accept = require(&headers, "sec-websocket-accept", "Sec-WebSocket-Accept")?.to_string();
        Ok(Self { accept })
    }

    /// Check the accept value against the key the client sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] on mismatch.
    pub fn verify(&self, key: &str) -> Result<()> {
        let expected = compute_accept_key(key);
        if self.accept != expected {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {}, got {}",
                expected, self.accept
            )));
        }
        Ok(())
    }
}
