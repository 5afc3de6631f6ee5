//! Randomness abstraction used for listing id generation.

use rand::RngCore;

/// Source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill the destination buffer with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Produce a fixed-size array of random bytes.
    fn random_array<const N: usize>(&self) -> [u8; N]
    where
        Self: Sized,
    {
        let mut bytes = [0u8; N];
        self.fill_bytes(&mut bytes);
        bytes
    }
}

/// Production implementation using the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRng;

impl ThreadRng {
    pub const fn new() -> Self {
        Self
    }
}

impl RandomSource for ThreadRng {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }
}
