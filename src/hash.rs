//! Stable hashing for chunk headers and payloads.
//!
//! Goals:
//! - Use a stable, explicit hash (not std::DefaultHasher) so on-disk hashes
//!   stay invariant across toolchains/platforms.
//! - Single hash kind for the container: 64-bit xxhash with seed=0.

use std::hash::Hasher;
use twox_hash::XxHash64;

/// Seed for all container hashes.
pub const HASH_SEED: u64 = 0;

/// XXH64(seed=0) of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut h = XxHash64::with_seed(HASH_SEED);
    h.write(bytes);
    h.finish()
}

/// Потоковый дайджест для Digesting{Writer,Reader}.
pub trait Digester {
    type Output;

    fn update(&mut self, bytes: &[u8]);

    /// Итоговый дайджест по всем переданным байтам.
    fn digest(&self) -> Self::Output;
}

/// XXH64(seed=0) digester.
#[derive(Debug)]
pub struct Xx64Digester {
    inner: XxHash64,
}

impl Xx64Digester {
    pub fn new() -> Self {
        Self {
            inner: XxHash64::with_seed(HASH_SEED),
        }
    }
}

impl Default for Xx64Digester {
    fn default() -> Self {
        Self::new()
    }
}

impl Digester for Xx64Digester {
    type Output = u64;

    #[inline]
    fn update(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }

    fn digest(&self) -> u64 {
        // XxHash64::finish не потребляет hasher, клон не нужен
        self.inner.finish()
    }
}
