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

//! Bloom filter
//!
//! `d` bits (rounded up to the next prime) probed by `h` independent
//! hashes. Inserted keys always look up as present; absent keys look up
//! as present with probability roughly `(1 − e^{−h·n/d})^h`.

use flowsketch_core::bitarray::BitArray;
use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::util::next_prime;

use crate::sketch::Sketch;

pub struct BloomFilter<const L: usize, H = AwareHash> {
    nbits: usize,
    bits: BitArray,
    hash_fns: Vec<H>,
}

impl<const L: usize, H: FlowHasher + Default> BloomFilter<L, H> {
    /// Construct with `num_bits` bits (rounded up to the next prime) and
    /// `num_hash` hash functions.
    pub fn new(num_bits: usize, num_hash: usize) -> Result<Self> {
        let nbits = next_prime(num_bits)?;
        Ok(Self {
            nbits,
            bits: BitArray::new(nbits),
            hash_fns: (0..num_hash).map(|_| H::default()).collect(),
        })
    }

    /// Set each of the hashed bits of `key`.
    pub fn insert_key(&mut self, key: &FlowKey<L>) {
        for hash in &self.hash_fns {
            self.bits.set(hash.hash_key(key) as usize % self.nbits);
        }
    }

    /// Whether every hashed bit of `key` is set.
    pub fn lookup_key(&self, key: &FlowKey<L>) -> bool {
        self.hash_fns
            .iter()
            .all(|hash| self.bits.get(hash.hash_key(key) as usize % self.nbits))
    }

    /// Footprint in bytes, bit bank and hashes included.
    pub fn footprint(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.bits.byte_size()
            + self.hash_fns.len() * std::mem::size_of::<H>()
    }

    /// Clear every bit.
    pub fn reset(&mut self) {
        self.bits.reset();
    }
}

impl<const L: usize, H: FlowHasher + Default> Sketch<L, i64> for BloomFilter<L, H> {
    fn size(&self) -> usize {
        self.footprint()
    }

    fn insert(&mut self, key: &FlowKey<L>) -> Result<()> {
        self.insert_key(key);
        Ok(())
    }

    fn lookup(&self, key: &FlowKey<L>) -> Result<bool> {
        Ok(self.lookup_key(key))
    }

    fn clear(&mut self) {
        self.reset();
    }
}
