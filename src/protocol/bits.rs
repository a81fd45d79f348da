//! Bit-level cursors over byte buffers.
//!
//! Frame headers pack fields that do not align to byte boundaries (the
//! `fin` bit, three reserved bits, a 4-bit opcode, the mask bit and a
//! 7-bit length). [`BitWriter`] and [`BitReader`] build and consume those
//! fields most-significant-bit first. Both are forward-only.

use thiserror::Error;

/// Errors raised by [`BitWriter`] and [`BitReader`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BitError {
    /// The value needs more than `width` bits.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooLarge {
        /// Value that was written.
        value: u64,
        /// Field width in bits.
        width: u32,
    },

    /// Fewer bits remain than were requested.
    #[error("requested {requested} bits, {remaining} remaining")]
    UnexpectedEnd {
        /// Bits requested.
        requested: u32,
        /// Bits left in the buffer.
        remaining: usize,
    },

    /// Field width outside `0..=64`.
    #[error("invalid field width: {0} bits")]
    InvalidWidth(u32),
}

const MAX_WIDTH: u32 = 64;

fn check_width(width: u32) -> Result<(), BitError> {
    if width > MAX_WIDTH {
        return Err(BitError::InvalidWidth(width));
    }
    Ok(())
}

/// Appends variable-width fields to a byte buffer, MSB first.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    buf: Vec<u8>,
    acc: u128,
    bits: u32,
}

impl BitWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `bytes` output bytes.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            acc: 0,
            bits: 0,
        }
    }

    /// Append the low `width` bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::ValueTooLarge`] if `value` has bits set above
    /// `width`, or [`BitError::InvalidWidth`] if `width > 64`.
    pub fn write(&mut self, value: u64, width: u32) -> Result<(), BitError> {
        check_width(width)?;
        if width < MAX_WIDTH && value >> width != 0 {
            return Err(BitError::ValueTooLarge { value, width });
        }
        if width == 0 {
            return Ok(());
        }

        self.acc = (self.acc << width) | u128::from(value);
        self.bits += width;

        while self.bits >= 8 {
            self.bits -= 8;
            self.buf.push((self.acc >> self.bits) as u8);
        }
        self.acc &= (1u128 << self.bits) - 1;
        Ok(())
    }

    /// Append a single flag bit.
    pub fn write_bit(&mut self, bit: bool) {
        self.acc = (self.acc << 1) | u128::from(bit);
        self.bits += 1;
        if self.bits == 8 {
            self.bits = 0;
            self.buf.push(self.acc as u8);
            self.acc = 0;
        }
    }

    /// Total bits written so far.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8 + self.bits as usize
    }

    /// Pad the trailing partial byte with zero bits and return the buffer.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            let pad = 8 - self.bits;
            self.buf.push((self.acc << pad) as u8);
        }
        self.buf
    }
}

/// Consumes variable-width fields from a byte slice, MSB first.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader positioned at the first bit of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Read the next `width` bits as an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::UnexpectedEnd`] if fewer than `width` bits
    /// remain. The cursor does not move on error.
    pub fn read(&mut self, width: u32) -> Result<u64, BitError> {
        check_width(width)?;
        let remaining = self.remaining_bits();
        if (width as usize) > remaining {
            return Err(BitError::UnexpectedEnd {
                requested: width,
                remaining,
            });
        }

        let mut value = 0u64;
        let mut left = width;
        while left > 0 {
            let byte = self.data[self.pos / 8];
            let offset = (self.pos % 8) as u32;
            let avail = 8 - offset;
            let take = avail.min(left);
            let chunk = (byte >> (avail - take)) & ((1u16 << take) - 1) as u8;
            value = (value << take) | u64::from(chunk);
            self.pos += take as usize;
            left -= take;
        }
        Ok(value)
    }

    /// Read a single flag bit.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::UnexpectedEnd`] at the end of input.
    pub fn read_bit(&mut self) -> Result<bool, BitError> {
        Ok(self.read(1)? == 1)
    }

    /// Current cursor position in bits.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes fully consumed so far, rounding a partial byte up.
    #[must_use]
    pub const fn bytes_consumed(&self) -> usize {
        self.pos.div_ceil(8)
    }

    /// Bits left to read.
    #[must_use]
    pub const fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_header_fields() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write(0, 3).unwrap();
        w.write(0x1, 4).unwrap();
        w.write_bit(true);
        w.write(5, 7).unwrap();
        assert_eq!(w.finish(), vec![0x81, 0x85]);
    }

    #[test]
    fn test_write_value_too_large() {
        let mut w = BitWriter::new();
        assert_eq!(
            w.write(0x10, 4),
            Err(BitError::ValueTooLarge {
                value: 0x10,
                width: 4
            })
        );
    }

    #[test]
    fn test_write_full_width() {
        let mut w = BitWriter::new();
        w.write(u64::MAX, 64).unwrap();
        assert_eq!(w.finish(), vec![0xFF; 8]);
    }

    #[test]
    fn test_write_invalid_width() {
        let mut w = BitWriter::new();
        assert_eq!(w.write(1, 65), Err(BitError::InvalidWidth(65)));
    }

    #[test]
    fn test_finish_pads_with_zeros() {
        let mut w = BitWriter::new();
        w.write(0b101, 3).unwrap();
        assert_eq!(w.bit_len(), 3);
        assert_eq!(w.finish(), vec![0b1010_0000]);
    }

    #[test]
    fn test_write_across_byte_boundary() {
        let mut w = BitWriter::new();
        w.write(0b1, 1).unwrap();
        w.write(0x1FF, 9).unwrap();
        w.write(0, 6).unwrap();
        assert_eq!(w.finish(), vec![0xFF, 0xC0]);
    }

    #[test]
    fn test_read_header_fields() {
        let data = [0x82, 0xFE, 0x01, 0x00];
        let mut r = BitReader::new(&data);
        assert!(r.read_bit().unwrap());
        assert_eq!(r.read(3).unwrap(), 0);
        assert_eq!(r.read(4).unwrap(), 0x2);
        assert!(r.read_bit().unwrap());
        assert_eq!(r.read(7).unwrap(), 126);
        assert_eq!(r.read(16).unwrap(), 256);
        assert_eq!(r.remaining_bits(), 0);
        assert_eq!(r.bytes_consumed(), 4);
    }

    #[test]
    fn test_read_unexpected_end() {
        let data = [0xAB];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read(4).unwrap(), 0xA);
        assert_eq!(
            r.read(8),
            Err(BitError::UnexpectedEnd {
                requested: 8,
                remaining: 4
            })
        );
        assert_eq!(r.position(), 4);
        assert_eq!(r.read(4).unwrap(), 0xB);
    }

    #[test]
    fn test_read_64_bits() {
        let data = 0x0123_4567_89AB_CDEFu64.to_be_bytes();
        let mut r = BitReader::new(&data);
        assert_eq!(r.read(64).unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_zero_width() {
        let mut w = BitWriter::new();
        w.write(0, 0).unwrap();
        assert!(w.finish().is_empty());

        let mut r = BitReader::new(&[]);
        assert_eq!(r.read(0).unwrap(), 0);
    }
}
