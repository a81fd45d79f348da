//! Random bytes for masking keys and handshake nonces.
//!
//! All randomness flows through [`MaskSource`] so tests can swap in a
//! deterministic generator. The process-wide default is [`OsEntropy`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// Source of masking keys and nonce bytes.
///
/// Implementations are shared between connections and must be safe to
/// call concurrently.
pub trait MaskSource: Send + Sync {
    /// Fill `dest` with random bytes.
    fn fill(&self, dest: &mut [u8]);

    /// Produce a fresh 4-byte masking key.
    fn mask_key(&self) -> [u8; 4] {
        let mut key = [0u8; 4];
        self.fill(&mut key);
        key
    }
}

/// Operating-system entropy via `getrandom`.
///
/// Falls back to a time-seeded mixer if the OS source fails. Masking keys
/// only need to be unpredictable to intermediaries, not cryptographically
/// strong.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl MaskSource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) {
        if let Err(err) = getrandom::getrandom(dest) {
            tracing::warn!(error = %err, "getrandom failed, using time-seeded fallback");
            SeededEntropy::new(time_seed()).fill(dest);
        }
    }
}

fn time_seed() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u32)
        .unwrap_or(0x1234_5678)
}

/// Deterministic generator for tests and benchmarks.
///
/// Produces the same byte stream for the same seed.
#[derive(Debug)]
pub struct SeededEntropy {
    state: AtomicU32,
}

impl SeededEntropy {
    /// Create a generator starting from `seed`.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: AtomicU32::new(seed),
        }
    }

    fn next_word(&self) -> u32 {
        let a = self
            .state
            .fetch_add(0x9E37_79B9, Ordering::Relaxed)
            .wrapping_add(0x9E37_79B9);
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d ^ (d >> 16)
    }
}

impl MaskSource for SeededEntropy {
    fn fill(&self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_word().to_be_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}

/// A masking key that never changes. Useful for golden-byte tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMask(pub [u8; 4]);

impl MaskSource for FixedMask {
    fn fill(&self, dest: &mut [u8]) {
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = self.0[i % 4];
        }
    }

    fn mask_key(&self) -> [u8; 4] {
        self.0
    }
}

/// The shared process-wide source, initialised on first use.
pub fn default_source() -> Arc<dyn MaskSource> {
    static DEFAULT: OnceLock<Arc<dyn MaskSource>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(OsEntropy) as Arc<dyn MaskSource>))
}
