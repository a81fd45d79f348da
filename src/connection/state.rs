//! Connection lifecycle.

/// Lifecycle state of one connection.
///
/// Moves strictly forward: `Handshaking -> Open -> Closing -> Closed`,
/// with `Closing` skipped when the transport drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// HTTP upgrade not yet confirmed.
    #[default]
    Handshaking,
    /// Data may flow in both directions.
    Open,
    /// A Close frame has been sent or received.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for every state but `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Application sends are allowed only while `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Frames are accepted while `Open` or `Closing`.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Handshaking => write!(f, "Handshaking"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
