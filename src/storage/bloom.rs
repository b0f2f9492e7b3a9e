//! Bloom filter for SSTable membership checks.
//!
//! Answers "is this key in the table?" with no false negatives: a `false`
//! from [`BloomFilter::may_contain`] is a proof of absence, a `true` only a
//! hint. Built once per table and rebuilt from the data file on open, so it
//! is never serialized.
//!
//! Sizing:
//!   bits_per_key = -1.44 * log2(false_positive_rate)
//!   num_hashes   = bits_per_key * ln(2)
//!
//! Instead of k independent hash functions, a single 128-bit xxh3 hash is
//! split into two 64-bit halves and combined by double hashing:
//! h_i(key) = h1 + i * h2 (mod num_bits).

use xxhash_rust::xxh3::xxh3_128;

/// Probabilistic membership set over all keys of one SSTable
pub struct BloomFilter {
    /// Bit array packed into u64 words
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Create a filter sized for `expected_entries` at the target false
    /// positive rate. The rate must lie in (0, 1).
    pub fn new(expected_entries: usize, false_positive_rate: f64) -> Self {
        let rate = false_positive_rate.clamp(1e-6, 0.999);
        let bits_per_key = -1.44 * rate.log2();

        let num_bits = ((expected_entries.max(1) as f64) * bits_per_key).ceil() as u64;
        let num_bits = num_bits.max(64);

        let num_hashes = (bits_per_key * std::f64::consts::LN_2).ceil() as u32;
        let num_hashes = num_hashes.max(1);

        let words = (num_bits as usize + 63) / 64;

        Self {
            bits: vec![0u64; words],
            num_bits,
            num_hashes,
        }
    }

    /// Add a key to the set
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = Self::hash_key(key);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
        }
    }

    /// Check whether the key might be in the set.
    ///
    /// `false` means definitely absent; `true` means probably present.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = Self::hash_key(key);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            if self.bits[(pos / 64) as usize] >> (pos % 64) & 1 == 0 {
                return false;
            }
        }
        true
    }

    fn hash_key(key: &[u8]) -> (u64, u64) {
        let hash = xxh3_128(key);
        (hash as u64, (hash >> 64) as u64)
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }
}
