//! Property-based tests for the codec.
//!
//! These use proptest to check encode/decode, masking and reassembly over
//! generated payloads and arbitrary buffer splits.

use nocket::Limits;
use nocket::Role;
use nocket::protocol::bits::{BitError, BitReader, BitWriter};
use nocket::protocol::decoder::{FrameDecoder, decode_frames};
use nocket::protocol::entropy::SeededEntropy;
use nocket::protocol::{Frame, OpCode, Reassembler, apply_mask, compute_accept_key, encode_frame_with};
use nocket::{Message, encode_frame};
use proptest::prelude::*;

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Text), Just(OpCode::Binary), Just(OpCode::Continuation)]
}

fn control_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Close), Just(OpCode::Ping), Just(OpCode::Pong)]
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Client), Just(Role::Server)]
}

fn mask_low_bits(value: u64, width: u32) -> u64 {
    if width == 64 { value } else { value & ((1u64 << width) - 1) }
}

proptest! {
    // =========================================================================
    // Encode then decode yields the original opcode and payload
    // =========================================================================
    #[test]
    fn test_roundtrip_data_frames(
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..2000),
        role in role_strategy(),
    ) {
        let wire = encode_frame(opcode, &payload, role).unwrap();
        let decoded = decode_frames(&wire, None).unwrap();

        prop_assert_eq!(decoded.frames.len(), 1);
        let frame = &decoded.frames[0];
        prop_assert_eq!(frame.opcode(), opcode);
        prop_assert!(frame.fin());
        prop_assert_eq!(frame.is_masked(), role.must_mask());
        prop_assert_eq!(&frame.payload()[..], &payload[..]);
        prop_assert!(decoded.pending.is_none());
        prop_assert!(decoded.remainder.is_empty());
    }

    #[test]
    fn test_roundtrip_control_frames(
        opcode in control_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..=125),
        role in role_strategy(),
        seed in any::<u32>(),
    ) {
        let wire = encode_frame_with(opcode, &payload, role, &SeededEntropy::new(seed)).unwrap();
        let decoded = FrameDecoder::new(role.peer(), Limits::default()).decode(&wire, None).unwrap();

        prop_assert_eq!(decoded.frames.len(), 1);
        prop_assert_eq!(decoded.frames[0].opcode(), opcode);
        prop_assert_eq!(&decoded.frames[0].payload()[..], &payload[..]);
    }

    #[test]
    fn test_oversized_control_frames_rejected(
        opcode in control_opcode_strategy(),
        len in 126usize..1000,
    ) {
        prop_assert!(encode_frame(opcode, &vec![0u8; len], Role::Server).is_err());
    }

    // =========================================================================
    // Masking is an involution
    // =========================================================================
    #[test]
    fn test_mask_involution(
        payload in prop::collection::vec(any::<u8>(), 0..1000),
        key in any::<[u8; 4]>(),
    ) {
        let mut data = payload.clone();
        apply_mask(&mut data, key);
        apply_mask(&mut data, key);
        prop_assert_eq!(data, payload);
    }

    // =========================================================================
    // Splitting the wire bytes anywhere loses and duplicates nothing
    // =========================================================================
    #[test]
    fn test_split_buffer_decode(
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..70_000),
        split in any::<prop::sample::Index>(),
        seed in any::<u32>(),
    ) {
        let wire = encode_frame_with(opcode, &payload, Role::Client, &SeededEntropy::new(seed)).unwrap();
        let whole = decode_frames(&wire, None).unwrap();

        let at = split.index(wire.len() + 1);
        let first = decode_frames(&wire[..at], None).unwrap();
        let mut next = first.remainder.to_vec();
        next.extend_from_slice(&wire[at..]);
        let second = decode_frames(&next, first.pending).unwrap();

        let mut frames = first.frames;
        frames.extend(second.frames);
        prop_assert_eq!(frames, whole.frames);
        prop_assert!(second.pending.is_none());
        prop_assert!(second.remainder.is_empty());
    }

    #[test]
    fn test_chunked_stream_decode(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 1..8),
        chunk in 1usize..64,
    ) {
        let mut wire = Vec::new();
        for payload in &payloads {
            wire.extend_from_slice(&encode_frame(OpCode::Binary, payload, Role::Server).unwrap());
        }

        let decoder = FrameDecoder::new(Role::Client, Limits::default());
        let mut pending = None;
        let mut carry = Vec::new();
        let mut received = Vec::new();
        for piece in wire.chunks(chunk) {
            carry.extend_from_slice(piece);
            let decoded = decoder.decode(&carry, pending.take()).unwrap();
            received.extend(decoded.frames.into_iter().map(|f| f.payload().to_vec()));
            pending = decoded.pending;
            carry = decoded.remainder.to_vec();
        }

        prop_assert_eq!(received, payloads);
        prop_assert!(pending.is_none());
        prop_assert!(carry.is_empty());
    }

    #[test]
    fn test_decode_arbitrary_bytes_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let _ = decode_frames(&data, None);
    }

    // =========================================================================
    // Reassembly concatenates fragments in order
    // =========================================================================
    #[test]
    fn test_reassembly_concatenates(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..100), 1..10),
    ) {
        let mut reassembler = Reassembler::new(Limits::default());
        let last = parts.len() - 1;
        let mut result = None;

        for (i, part) in parts.iter().enumerate() {
            let opcode = if i == 0 { OpCode::Binary } else { OpCode::Continuation };
            let out = reassembler.push(Frame::new(i == last, opcode, part.clone())).unwrap();
            if i == last {
                result = out;
            } else {
                prop_assert!(out.is_none());
            }
        }

        prop_assert_eq!(result, Some(Message::binary(parts.concat())));
    }

    // =========================================================================
    // BitWriter / BitReader
    // =========================================================================
    #[test]
    fn test_bits_roundtrip(
        fields in prop::collection::vec((any::<u64>(), 1u32..=64), 1..20),
    ) {
        let mut writer = BitWriter::new();
        for &(value, width) in &fields {
            writer.write(mask_low_bits(value, width), width).unwrap();
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        for &(value, width) in &fields {
            prop_assert_eq!(reader.read(width).unwrap(), mask_low_bits(value, width));
        }
    }

    #[test]
    fn test_bits_value_too_large(width in 1u32..64, extra in 0u64..1000) {
        let value = (1u64 << width) + extra;
        let mut writer = BitWriter::new();
        prop_assert_eq!(
            writer.write(value, width),
            Err(BitError::ValueTooLarge { value, width })
        );
    }

    #[test]
    fn test_accept_key_shape(key in "[A-Za-z0-9+/]{22}==") {
        let accept = compute_accept_key(&key);
        prop_assert_eq!(accept.len(), 28);
        prop_assert!(accept.ends_with('='));
    }
}
