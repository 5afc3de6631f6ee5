//! Deterministic random source for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::RandomSource;

/// Produces a reproducible byte stream from a seed.
///
/// Clones share the stream position, so ids generated through any clone
/// never repeat within a test.
#[derive(Debug, Clone)]
pub struct MockRandom {
    seed: u64,
    position: Arc<AtomicU64>,
}

impl MockRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            position: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Rewind to the start of the stream.
    pub fn reset(&self) {
        self.position.store(0, Ordering::SeqCst);
    }

    // splitmix64
    const fn word(&self, index: u64) -> u64 {
        let mut z = self
            .seed
            .wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

impl Default for MockRandom {
    fn default() -> Self {
        Self::new(0x5EED_0F_11_57_1265)
    }
}

impl RandomSource for MockRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let index = self.position.fetch_add(1, Ordering::SeqCst);
            let bytes = self.word(index).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
