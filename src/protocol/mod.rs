//! WebSocket protocol core (RFC 6455), free of I/O.

pub mod assembler;
pub mod bits;
pub mod decoder;
pub mod entropy;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod validation;

pub use assembler::Reassembler;
pub use bits::{BitError, BitReader, BitWriter};
pub use decoder::{DecodeStep, Decoded, FrameDecoder, PartialFrame, decode_frames};
pub use entropy::{MaskSource, OsEntropy, SeededEntropy};
pub use frame::{Frame, FrameHeader, encode_close, encode_frame, encode_frame_with};
pub use handshake::{
    HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key, generate_key,
};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use validation::FrameValidator;
