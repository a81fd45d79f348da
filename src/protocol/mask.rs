//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking XORs byte `i` of the payload with `key[i % 4]`. It is its own
//! inverse, so the same functions mask and unmask.

/// XOR `data` in place with the 4-byte `key`.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Word-at-a-time variant of [`apply_mask`].
///
/// Produces identical output; used on the encode and decode hot paths.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key_word;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i];
    }
}

/// Mask `data` as if it started `offset` bytes into a longer payload.
///
/// Lets a payload that arrives in pieces be unmasked piece by piece.
#[inline]
pub fn apply_mask_at(data: &mut [u8], key: [u8; 4], offset: usize) {
    let shift = offset % 4;
    let rotated = [
        key[shift],
        key[(shift + 1) % 4],
        key[(shift + 2) % 4],
        key[(shift + 3) % 4],
    ];
    apply_mask_fast(data, rotated);
}

/// Return a masked copy of `payload`, leaving the input untouched.
#[must_use]
pub fn masked(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    let mut out = payload.to_vec();
    apply_mask_fast(&mut out, key);
    out
}
