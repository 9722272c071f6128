//! Deterministic randomness for a match.
//!
//! Every random decision in a match (wonder assignment, dealing, guild
//! selection, AI jitter) flows from a seed string. The string is folded into
//! a 64-bit value with FNV-1a and fed to a ChaCha8 stream, so the same seed
//! gives the same sequence on every platform.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded random source. One per match (or per AI decision); not shared
/// between threads.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Create a stream from a seed string
    pub fn new(seed: &str) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(fold_seed(seed)),
        }
    }

    /// Float in `[0, 1)`
    pub fn next_float(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Integer in `[min, max]`, both inclusive. Returns `min` when the
    /// range is empty.
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Fair coin flip
    pub fn next_bool(&mut self) -> bool {
        self.next_float() < 0.5
    }

    /// Shuffled copy of `items` (Fisher-Yates)
    pub fn shuffle<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut shuffled = items.to_vec();
        shuffled.shuffle(&mut self.rng);
        shuffled
    }

    /// Uniformly chosen element, `None` for an empty slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}

/// FNV-1a over the seed bytes
fn fold_seed(seed: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    seed.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}
