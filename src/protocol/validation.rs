//! Per-role header validation (RFC 6455 Sections 5.1 and 5.5).
//!
//! Runs on every parsed header before any payload is buffered:
//! - masking direction for the receiving role
//! - control-frame rules (FIN set, payload at most 125 bytes)
//! - the configured frame size limit

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{ProtocolError, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Validator for incoming frame headers.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    /// Receiving role. `None` skips the masking check.
    role: Option<Role>,
    limits: Limits,
    accept_unmasked_frames: bool,
}

impl FrameValidator {
    /// Create a validator for frames received by `role`.
    #[must_use]
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role: Some(role),
            limits,
            accept_unmasked_frames: false,
        }
    }

    /// Create a validator that accepts frames in either masking direction.
    #[must_use]
    pub fn permissive(limits: Limits) -> Self {
        Self {
            role: None,
            limits,
            accept_unmasked_frames: true,
        }
    }

    /// Accept unmasked frames on the server side (non-RFC compliant).
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Limits this validator enforces.
    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Validate a parsed header.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnmaskedClientFrame`] - server received an unmasked frame
    /// - [`ProtocolError::MaskedServerFrame`] - client received a masked frame
    /// - [`ProtocolError::FragmentedControlFrame`] - control frame with FIN=0
    /// - [`ProtocolError::ControlFrameTooLarge`] - control payload over 125 bytes
    /// - [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) - payload over `max_frame_size`
    pub fn validate(&self, header: &FrameHeader) -> Result<()> {
        self.validate_masking(header.mask.is_some())?;
        if header.opcode.is_control() {
            if !header.fin {
                return Err(ProtocolError::FragmentedControlFrame.into());
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                let len = usize::try_from(header.payload_len).unwrap_or(usize::MAX);
                return Err(ProtocolError::ControlFrameTooLarge(len).into());
            }
        }
        self.limits.check_frame_size(header.payload_len)
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        let Some(role) = self.role else {
            return Ok(());
        };
        match (role.expects_masked(), masked) {
            (true, false) if !self.accept_unmasked_frames => {
                Err(ProtocolError::UnmaskedClientFrame.into())
            }
            (false, true) => Err(ProtocolError::MaskedServerFrame.into()),
            _ => Ok(()),
        }
    }
}
