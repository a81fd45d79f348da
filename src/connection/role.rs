//! Which end of the connection we are.

/// Connection role.
///
/// RFC 6455 ties masking to the direction of travel: frames sent by a
/// client are masked, frames sent by a server are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiated the upgrade. Masks outgoing frames.
    Client,
    /// Accepted the upgrade. Sends frames unmasked.
    Server,
}

impl Role {
    /// Whether frames sent by this role carry a masking key.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether frames received by this role must carry a masking key.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// The role on the other end of the wire.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}
