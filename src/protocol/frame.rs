//! WebSocket frame type and encoder (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                         Masking key (if present)              |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```
//!
//! Header fields are packed with [`BitWriter`] and unpacked with
//! [`BitReader`]. Decoding of whole byte streams lives in
//! [`decoder`](crate::protocol::decoder).

use bytes::{BufMut, Bytes, BytesMut};

use crate::connection::Role;
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::OpCode;
use crate::protocol::bits::{BitError, BitReader, BitWriter};
use crate::protocol::entropy::{MaskSource, default_source};
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest payload that fits the 7-bit length field.
const MAX_SHORT_LEN: u64 = 125;
const LEN_16: u64 = 126;
const LEN_64: u64 = 127;

/// A fully parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present iff the mask bit was set.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: u64,
    /// Bytes occupied by the header, including any extended length and key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a header from the start of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` ends before the header does; no bytes
    /// are considered consumed in that case.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::ReservedBitsSet`] if any RSV bit is 1
    /// - [`ProtocolError::InvalidOpcode`] for reserved or unknown opcodes
    pub fn parse(buf: &[u8]) -> Result<Option<Self>> {
        match Self::read(&mut BitReader::new(buf)) {
            Ok(header) => Ok(Some(header)),
            Err(Error::Bits(BitError::UnexpectedEnd { .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        let fin = reader.read_bit()?;
        let rsv1 = reader.read_bit()?;
        let rsv2 = reader.read_bit()?;
        let rsv3 = reader.read_bit()?;
        if rsv1 || rsv2 || rsv3 {
            return Err(ProtocolError::ReservedBitsSet.into());
        }
        let opcode = OpCode::from_u8(reader.read(4)? as u8)?;

        let masked = reader.read_bit()?;
        let payload_len = match reader.read(7)? {
            LEN_16 => reader.read(16)?,
            LEN_64 => reader.read(64)?,
            short => short,
        };

        let mask = if masked {
            Some((reader.read(32)? as u32).to_be_bytes())
        } else {
            None
        };

        Ok(Self {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask,
            payload_len,
            header_len: reader.bytes_consumed(),
        })
    }

    /// Bytes needed for a header carrying `payload_len` bytes.
    #[must_use]
    pub const fn encoded_len(payload_len: u64, masked: bool) -> usize {
        let ext = if payload_len <= MAX_SHORT_LEN {
            0
        } else if payload_len <= u16::MAX as u64 {
            2
        } else {
            8
        };
        2 + ext + if masked { 4 } else { 0 }
    }
}

/// A single WebSocket frame.
///
/// Frames are immutable once built or parsed. A decoded frame keeps the
/// masking key it arrived with, but its payload is always unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload: Bytes,
}

impl Frame {
    /// Create an outgoing frame with clear reserved bits and no mask.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    pub(crate) fn from_parts(header: &FrameHeader, payload: Bytes) -> Self {
        Self {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            mask: header.mask,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Create a close frame with an optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        Self::new(true, OpCode::Close, close_payload(code, reason))
    }

    /// Final fragment flag.
    #[inline]
    #[must_use]
    pub const fn fin(&self) -> bool {
        self.fin
    }

    /// Reserved bits as `(rsv1, rsv2, rsv3)`.
    #[must_use]
    pub const fn rsv(&self) -> (bool, bool, bool) {
        (self.rsv1, self.rsv2, self.rsv3)
    }

    /// Frame opcode.
    #[inline]
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Whether the frame arrived masked.
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Masking key the frame arrived with.
    #[must_use]
    pub const fn masking_key(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Unmasked payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length as carried in the length field.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Check the control-frame rules that apply before encoding.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FragmentedControlFrame`] if a control frame has FIN=0
    /// - [`ProtocolError::ControlFrameTooLarge`] if a control payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(ProtocolError::FragmentedControlFrame.into());
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(ProtocolError::ControlFrameTooLarge(self.payload.len()).into());
            }
        }
        Ok(())
    }

    /// Size of the encoded frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        FrameHeader::encoded_len(self.payload_len(), masked) + self.payload.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    ///
    /// The payload is masked with `mask` when one is given.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] if the length does not fit in 64 bits
    /// - control-frame errors from [`Frame::validate`]
    pub fn write_to(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) -> Result<()> {
        self.validate()?;
        let len = self.payload.len();
        let len64 = u64::try_from(len).map_err(|_| Error::PayloadTooLarge(len))?;

        let mut header = BitWriter::with_capacity(FrameHeader::encoded_len(len64, mask.is_some()));
        header.write_bit(self.fin);
        header.write_bit(self.rsv1);
        header.write_bit(self.rsv2);
        header.write_bit(self.rsv3);
        header.write(u64::from(self.opcode.as_u8()), 4)?;
        header.write_bit(mask.is_some());
        if len64 <= MAX_SHORT_LEN {
            header.write(len64, 7)?;
        } else if len64 <= u64::from(u16::MAX) {
            header.write(LEN_16, 7)?;
            header.write(len64, 16)?;
        } else {
            header.write(LEN_64, 7)?;
            header.write(len64, 64)?;
        }
        if let Some(key) = mask {
            header.write(u64::from(u32::from_be_bytes(key)), 32)?;
        }

        dst.reserve(header.bit_len() / 8 + len);
        dst.put_slice(&header.finish());
        let start = dst.len();
        dst.put_slice(&self.payload);
        if let Some(key) = mask {
            apply_mask_fast(&mut dst[start..], key);
        }
        Ok(())
    }

    /// Encode this frame into a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Frame::write_to`].
    pub fn to_bytes(&self, mask: Option<[u8; 4]>) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size(mask.is_some()));
        self.write_to(&mut buf, mask)?;
        Ok(buf.freeze())
    }
}

/// Build a Close payload: 2-byte big-endian code followed by the reason.
///
/// With no code the payload is empty and the reason is ignored.
#[must_use]
pub fn close_payload(code: Option<u16>, reason: &str) -> Bytes {
    match code {
        Some(code) => {
            let mut data = BytesMut::with_capacity(2 + reason.len());
            data.put_u16(code);
            data.put_slice(reason.as_bytes());
            data.freeze()
        }
        None => Bytes::new(),
    }
}

/// Encode a single final frame for `role`.
///
/// Client frames are masked with a key from the process-wide entropy
/// source; server frames are sent unmasked.
///
/// # Errors
///
/// See [`Frame::write_to`].
pub fn encode_frame(opcode: OpCode, payload: &[u8], role: Role) -> Result<Bytes> {
    encode_frame_with(opcode, payload, role, default_source().as_ref())
}

/// Like [`encode_frame`] but draws masking keys from `source`.
///
/// # Errors
///
/// See [`Frame::write_to`].
pub fn encode_frame_with(
    opcode: OpCode,
    payload: &[u8],
    role: Role,
    source: &dyn MaskSource,
) -> Result<Bytes> {
    let frame = Frame::new(true, opcode, Bytes::copy_from_slice(payload));
    let mask = role.must_mask().then(|| source.mask_key());
    frame.to_bytes(mask)
}

/// Encode a Close frame carrying `code` and `reason`.
///
/// # Errors
///
/// Fails with [`ProtocolError::ControlFrameTooLarge`] if the reason does
/// not fit in 123 bytes.
pub fn encode_close(code: u16, reason: &str, role: Role) -> Result<Bytes> {
    encode_frame(OpCode::Close, &close_payload(Some(code), reason), role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::entropy::FixedMask;

    const RFC_MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    #[test]
    fn test_parse_unmasked_header() {
        let data = [0x81, 0x05, b'H'];
        let header = FrameHeader::parse(&data).unwrap().unwrap();
        assert!(header.fin);
        assert_eq!(header.opcode, OpCode::Text);
        assert_eq!(header.mask, None);
        assert_eq!(header.payload_len, 5);
        assert_eq!(header.header_len, 2);
    }

    #[test]
    fn test_parse_masked_header() {
        let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d];
        let header = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.mask, Some(RFC_MASK));
        assert_eq!(header.header_len, 6);
    }

    #[test]
    fn test_parse_16bit_length() {
        let data = [0x82, 0x7E, 0x01, 0x00];
        let header = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.payload_len, 256);
        assert_eq!(header.header_len, 4);
    }

    #[test]
    fn test_parse_64bit_length() {
        let mut data = vec![0x82, 0x7F];
        data.extend_from_slice(&65536u64.to_be_bytes());
        let header = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.payload_len, 65536);
        assert_eq!(header.header_len, 10);
    }

    #[test]
    fn test_parse_incomplete_header() {
        assert_eq!(FrameHeader::parse(&[]).unwrap(), None);
        assert_eq!(FrameHeader::parse(&[0x81]).unwrap(), None);
        assert_eq!(FrameHeader::parse(&[0x82, 0x7E, 0x01]).unwrap(), None);
        assert_eq!(FrameHeader::parse(&[0x81, 0x85, 0x37, 0xfa]).unwrap(), None);
    }

    #[test]
    fn test_parse_reserved_bits() {
        for byte0 in [0xC1, 0xA1, 0x91] {
            let err = FrameHeader::parse(&[byte0, 0x00]).unwrap_err();
            assert_eq!(err, Error::Protocol(ProtocolError::ReservedBitsSet));
        }
    }

    #[test]
    fn test_parse_reserved_opcode() {
        let err = FrameHeader::parse(&[0x83, 0x00]).unwrap_err();
        assert_eq!(err, Error::Protocol(ProtocolError::InvalidOpcode(0x3)));
    }

    #[test]
    fn test_write_unmasked_text() {
        let bytes = Frame::text("Hello").to_bytes(None).unwrap();
        assert_eq!(&bytes[..], &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_write_masked_text_rfc_example() {
        let bytes = Frame::text("Hello").to_bytes(Some(RFC_MASK)).unwrap();
        assert_eq!(
            &bytes[..],
            &[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn test_length_field_variants() {
        for (len, indicator, header_len) in [
            (125usize, 125u8, 2usize),
            (126, 126, 4),
            (127, 126, 4),
            (65535, 126, 4),
            (65536, 127, 10),
        ] {
            let bytes = Frame::binary(vec![0u8; len]).to_bytes(None).unwrap();
            assert_eq!(bytes[1] & 0x7F, indicator, "len {}", len);
            assert_eq!(bytes.len(), header_len + len, "len {}", len);
        }
    }

    #[test]
    fn test_wire_size_matches_encoding() {
        for len in [0, 125, 126, 65535, 65536] {
            let frame = Frame::binary(vec![1u8; len]);
            assert_eq!(frame.to_bytes(None).unwrap().len(), frame.wire_size(false));
            assert_eq!(
                frame.to_bytes(Some(RFC_MASK)).unwrap().len(),
                frame.wire_size(true)
            );
        }
    }

    #[test]
    fn test_control_frame_too_large() {
        let err = Frame::ping(vec![0u8; 126]).to_bytes(None).unwrap_err();
        assert_eq!(err, Error::Protocol(ProtocolError::ControlFrameTooLarge(126)));
    }

    #[test]
    fn test_fragmented_control_rejected() {
        let frame = Frame::new(false, OpCode::Pong, Bytes::new());
        assert_eq!(
            frame.validate(),
            Err(Error::Protocol(ProtocolError::FragmentedControlFrame))
        );
    }

    #[test]
    fn test_encode_frame_server_unmasked() {
        let bytes = encode_frame(OpCode::Binary, &[1, 2, 3], Role::Server).unwrap();
        assert_eq!(&bytes[..], &[0x82, 0x03, 1, 2, 3]);
    }

    #[test]
    fn test_encode_frame_client_masked() {
        let source = FixedMask([1, 2, 3, 4]);
        let bytes = encode_frame_with(OpCode::Text, b"abcd", Role::Client, &source).unwrap();
        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[1], 0x84);
        assert_eq!(&bytes[2..6], &[1, 2, 3, 4]);
        assert_eq!(&bytes[6..], &[b'a' ^ 1, b'b' ^ 2, b'c' ^ 3, b'd' ^ 4]);
    }

    #[test]
    fn test_encode_close() {
        let bytes = encode_close(1000, "bye", Role::Server).unwrap();
        assert_eq!(&bytes[..], &[0x88, 0x05, 0x03, 0xE8, b'b', b'y', b'e']);
    }

    #[test]
    fn test_encode_close_reason_too_long() {
        let reason = "x".repeat(124);
        assert!(encode_close(1000, &reason, Role::Server).is_err());
    }

    #[test]
    fn test_close_payload_without_code() {
        assert!(close_payload(None, "ignored").is_empty());
        assert_eq!(&close_payload(Some(1002), "")[..], &[0x03, 0xEA]);
    }
}
