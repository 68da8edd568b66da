// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keyed hash family
//!
//! Every structure in the workspace hashes through the [`FlowHasher`]
//! trait: a 64-bit keyed hash over byte spans, with entry points for array
//! indices (hashed through their native 8-byte representation) and flow
//! keys (hashed through their underlying bytes).
//!
//! [`AwareHash`] is the production family. Instances constructed with
//! [`AwareHash::new`] draw their parameters from a per-process seed
//! sequence (a monotonically increasing counter combined with a
//! process-start randomiser), so independently constructed instances are
//! effectively independent hash functions. Tests that need identical
//! hashes across runs call [`reset_seed_sequence`] first.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::flowkey::FlowKey;

/// 64-bit keyed hashing over byte spans, indices and flow keys.
pub trait FlowHasher {
    /// Hash a byte span.
    fn hash_bytes(&self, bytes: &[u8]) -> u64;

    /// Hash an array index through its native byte representation.
    fn hash_index(&self, index: usize) -> u64 {
        self.hash_bytes(&(index as u64).to_ne_bytes())
    }

    /// Hash a flow key through its underlying bytes.
    fn hash_key<const L: usize>(&self, key: &FlowKey<L>) -> u64 {
        self.hash_bytes(key.as_bytes())
    }
}

const GEN_INIT_MAGIC: u64 = 388650253;
const GEN_SCALE_MAGIC: u64 = 388650319;
const GEN_HARDENER_MAGIC: u64 = 1176845762;
const MANGLE_MAGIC: u64 = 2083697005;

/// Byte-reverse, then multiply by a fixed odd constant. Mangled seeds feed
/// the bootstrap hash so that consecutive counter values land far apart.
fn mangle(key: u64) -> u64 {
    key.swap_bytes().wrapping_mul(MANGLE_MAGIC)
}

struct SeedSequence {
    counter: u64,
    rng: StdRng,
}

static SEED_SEQUENCE: Mutex<Option<SeedSequence>> = Mutex::new(None);

/// Re-seed the per-process hash-seed sequence.
///
/// Resets the monotonic counter to zero and replaces the process-start
/// randomiser with one derived from `seed`. Hash instances constructed
/// afterwards are reproducible across runs; instances constructed before
/// the reset are unaffected. Intended for tests.
pub fn reset_seed_sequence(seed: u64) {
    let mut guard = SEED_SEQUENCE.lock().unwrap();
    *guard = Some(SeedSequence {
        counter: 0,
        rng: StdRng::seed_from_u64(seed),
    });
}

/// Draw the next `(randomiser, counter)` pair, advancing the counter by
/// the number of parameters a hash instance consumes.
fn next_seed_base() -> (u64, u64) {
    let mut guard = SEED_SEQUENCE.lock().unwrap();
    let state = guard.get_or_insert_with(|| SeedSequence {
        counter: 0,
        rng: StdRng::from_entropy(),
    });
    let draw = state.rng.gen::<u64>();
    let counter = state.counter;
    state.counter = state.counter.wrapping_add(3);
    (draw, counter)
}

/// The keyed multiply-add-harden hash used across the sketch family.
///
/// `h := init; for each byte b: h := h·scale + b; return h ⊕ hardener`,
/// with all arithmetic wrapping. The parameter triple is derived by
/// running a fixed bootstrap instance over three mangled seeds.
#[derive(Clone, Debug)]
pub struct AwareHash {
    init: u64,
    scale: u64,
    hardener: u64,
}

impl AwareHash {
    /// Construct an instance with freshly drawn parameters.
    pub fn new() -> Self {
        let gen_hash = AwareHash {
            init: GEN_INIT_MAGIC,
            scale: GEN_SCALE_MAGIC,
            hardener: GEN_HARDENER_MAGIC,
        };
        let (draw, counter) = next_seed_base();
        let parameter = |k: u64| {
            let mangled = mangle(draw.wrapping_add(counter).wrapping_add(k));
            gen_hash.hash_bytes(&mangled.to_ne_bytes())
        };
        let init = parameter(0);
        let scale = parameter(1);
        let hardener = parameter(2);
        AwareHash {
            init,
            scale,
            hardener,
        }
    }
}

impl Default for AwareHash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowHasher for AwareHash {
    fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        let mut result = self.init;
        for &b in bytes {
            result = result.wrapping_mul(self.scale).wrapping_add(b as u64);
        }
        result ^ self.hardener
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_per_instance() {
        let hash = AwareHash::new();
        let a = hash.hash_bytes(b"flow");
        let b = hash.hash_bytes(b"flow");
        assert_eq!(a, b);
        assert_ne!(hash.hash_bytes(b"flow"), hash.hash_bytes(b"flom"));
    }

    #[test]
    fn test_instances_differ() {
        let h1 = AwareHash::new();
        let h2 = AwareHash::new();
        // Distinct parameters make collisions on a fixed input vanishingly
        // unlikely.
        assert_ne!(h1.hash_bytes(b"some flow key"), h2.hash_bytes(b"some flow key"));
    }

    #[test]
    fn test_reset_reproduces_sequence() {
        reset_seed_sequence(2022);
        let h1 = AwareHash::new();
        let h2 = AwareHash::new();
        let before = (h1.hash_bytes(b"x"), h2.hash_bytes(b"x"));

        reset_seed_sequence(2022);
        let h1 = AwareHash::new();
        let h2 = AwareHash::new();
        assert_eq!(before, (h1.hash_bytes(b"x"), h2.hash_bytes(b"x")));

        reset_seed_sequence(2023);
        let h1 = AwareHash::new();
        assert_ne!(before.0, h1.hash_bytes(b"x"));
    }

    #[test]
    fn test_entry_points_agree() {
        let hash = AwareHash::new();
        let key = FlowKey::<4>::from_bytes([1, 2, 3, 4]);
        assert_eq!(hash.hash_key(&key), hash.hash_bytes(&[1, 2, 3, 4]));
        assert_eq!(
            hash.hash_index(7),
            hash.hash_bytes(&7u64.to_ne_bytes())
        );
    }
}
