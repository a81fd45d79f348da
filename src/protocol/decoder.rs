//! Incremental frame decoding.
//!
//! Transport reads rarely line up with frame boundaries. A chunk may hold
//! several frames, the tail of one frame, or a header cut in the middle of
//! its extended length. The decoder handles all three without hidden
//! state:
//!
//! - a frame whose header is complete but whose payload is not becomes a
//!   [`PartialFrame`], returned to the caller and passed back in with the
//!   next chunk;
//! - header bytes that do not yet form a whole header are returned as the
//!   unconsumed remainder, to be prepended to the next chunk.
//!
//! Every byte handed to the decoder is either consumed into a frame, held
//! in the partial frame, or returned in the remainder.

use bytes::{Bytes, BytesMut};

use crate::config::Limits;
use crate::connection::Role;
use crate::error::Result;
use crate::protocol::OpCode;
use crate::protocol::frame::{Frame, FrameHeader};
use crate::protocol::mask::apply_mask_at;
use crate::protocol::validation::FrameValidator;

/// Upper bound on the buffer reserved up front for a partial payload.
const INITIAL_PARTIAL_CAPACITY: usize = 64 * 1024;

/// A frame whose header has been parsed but whose payload is incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFrame {
    header: FrameHeader,
    accumulated: BytesMut,
}

impl PartialFrame {
    fn new(header: FrameHeader) -> Self {
        let capacity = usize::try_from(header.payload_len)
            .unwrap_or(usize::MAX)
            .min(INITIAL_PARTIAL_CAPACITY);
        Self {
            header,
            accumulated: BytesMut::with_capacity(capacity),
        }
    }

    /// Opcode of the frame being completed.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// FIN flag of the frame being completed.
    #[must_use]
    pub const fn fin(&self) -> bool {
        self.header.fin
    }

    /// Masking key of the frame being completed.
    #[must_use]
    pub const fn mask(&self) -> Option<[u8; 4]> {
        self.header.mask
    }

    /// Unmasked payload bytes received so far.
    #[must_use]
    pub fn accumulated(&self) -> &[u8] {
        &self.accumulated
    }

    /// Payload bytes still required.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let total = usize::try_from(self.header.payload_len).unwrap_or(usize::MAX);
        total - self.accumulated.len()
    }

    /// Append up to `remaining()` bytes from `buf`, returning how many were taken.
    fn fill(&mut self, buf: &[u8]) -> usize {
        let take = self.remaining().min(buf.len());
        let offset = self.accumulated.len();
        self.accumulated.extend_from_slice(&buf[..take]);
        if let Some(key) = self.header.mask {
            apply_mask_at(&mut self.accumulated[offset..], key, offset);
        }
        take
    }

    fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    fn into_frame(self) -> Frame {
        Frame::from_parts(&self.header, self.accumulated.freeze())
    }

    fn into_step(self, used: usize) -> (DecodeStep, usize) {
        if self.is_complete() {
            tracing::trace!(opcode = ?self.header.opcode, len = self.header.payload_len, "frame decoded");
            (DecodeStep::Frame(self.into_frame()), used)
        } else {
            (DecodeStep::Pending(self), used)
        }
    }
}

/// Outcome of a single [`FrameDecoder::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// A complete frame.
    Frame(Frame),
    /// The buffer ended inside a payload.
    Pending(PartialFrame),
    /// The buffer ended inside a header; nothing was consumed.
    NeedMore,
}

/// Result of decoding one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Frames completed by this call, in wire order.
    pub frames: Vec<Frame>,
    /// Frame left waiting for more payload, to pass to the next call.
    pub pending: Option<PartialFrame>,
    /// Trailing bytes of an incomplete header, to prepend to the next chunk.
    pub remainder: Bytes,
}

/// Stateless decoder configured for one receiving role.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    validator: FrameValidator,
}

impl FrameDecoder {
    /// Decoder for frames received by `role`.
    #[must_use]
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            validator: FrameValidator::new(role, limits),
        }
    }

    /// Decoder that skips the masking-direction check.
    #[must_use]
    pub fn permissive(limits: Limits) -> Self {
        Self {
            validator: FrameValidator::permissive(limits),
        }
    }

    /// Accept unmasked client frames on the server side.
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.validator = self.validator.with_accept_unmasked(accept);
        self
    }

    /// Decode at most one frame from the front of `buf`.
    ///
    /// Returns the outcome and the number of bytes of `buf` consumed.
    ///
    /// # Errors
    ///
    /// Protocol violations and size errors from header parsing and
    /// validation. `buf` is not consumed on error.
    pub fn step(&self, buf: &[u8], pending: Option<PartialFrame>) -> Result<(DecodeStep, usize)> {
        if let Some(mut partial) = pending {
            let used = partial.fill(buf);
            return Ok(partial.into_step(used));
        }

        let Some(header) = FrameHeader::parse(buf)? else {
            return Ok((DecodeStep::NeedMore, 0));
        };
        self.validator.validate(&header)?;

        let mut partial = PartialFrame::new(header);
        let used = header.header_len + partial.fill(&buf[header.header_len..]);
        Ok(partial.into_step(used))
    }

    /// Decode every complete frame in `buf`.
    ///
    /// # Errors
    ///
    /// The first protocol violation or size error encountered. Frames
    /// decoded before the error are dropped with it.
    pub fn decode(&self, buf: &[u8], pending: Option<PartialFrame>) -> Result<Decoded> {
        let mut frames = Vec::new();
        let mut pending = pending;
        let mut offset = 0;

        loop {
            let (step, used) = self.step(&buf[offset..], pending.take())?;
            offset += used;
            match step {
                DecodeStep::Frame(frame) => {
                    frames.push(frame);
                    if offset == buf.len() {
                        break;
                    }
                }
                DecodeStep::Pending(partial) => {
                    pending = Some(partial);
                    break;
                }
                DecodeStep::NeedMore => break,
            }
        }

        Ok(Decoded {
            frames,
            pending,
            remainder: Bytes::copy_from_slice(&buf[offset..]),
        })
    }
}

/// Decode `buf` with default limits and no masking-direction check.
///
/// # Errors
///
/// See [`FrameDecoder::decode`].
pub fn decode_frames(buf: &[u8], pending: Option<PartialFrame>) -> Result<Decoded> {
    FrameDecoder::permissive(Limits::default()).decode(buf, pending)
}
