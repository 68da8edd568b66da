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

//! Hash-Pipe
//!
//! `d` pipelined stages, each a `w`-slot array of `(key, value)` pairs
//! with its own hash. An update cascades: a hit adds in place, an empty
//! slot absorbs the carried pair, and otherwise the smaller of slot and
//! carried value travels on to the next stage (strict `<` comparison, so
//! ties stay put). Pairs carried past the last stage are dropped, which
//! makes the structure order-sensitive by design.
//!
//! Reference: Sivaraman et al., "Heavy-Hitter Detection Entirely in the
//! Data Plane" (SOSR 2017).

use std::collections::HashSet;

use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::ground_truth::Estimation;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::packed::CounterInt;
use flowsketch_core::util::next_prime;

use crate::sketch::Sketch;

#[derive(Clone, Copy)]
struct Slot<const L: usize, T> {
    key: FlowKey<L>,
    value: T,
}

pub struct HashPipe<const L: usize, T, H = AwareHash> {
    depth: usize,
    width: usize,
    hash_fns: Vec<H>,
    /// Row-major `depth × width` slot matrix.
    slots: Vec<Slot<L, T>>,
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> HashPipe<L, T, H> {
    pub fn new(depth: usize, width: usize) -> Result<Self> {
        let width = next_prime(width)?;
        Ok(Self {
            depth,
            width,
            hash_fns: (0..depth).map(|_| H::default()).collect(),
            slots: vec![
                Slot {
                    key: FlowKey::new(),
                    value: T::default(),
                };
                depth * width
            ],
        })
    }

    fn slot_index(&self, stage: usize, key: &FlowKey<L>) -> usize {
        stage * self.width + self.hash_fns[stage].hash_key(key) as usize % self.width
    }
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> Sketch<L, T>
    for HashPipe<L, T, H>
{
    fn size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.depth * std::mem::size_of::<H>()
            + self.depth * self.width * std::mem::size_of::<Slot<L, T>>()
    }

    fn update(&mut self, key: &FlowKey<L>, value: T) -> Result<()> {
        let empty = FlowKey::<L>::new();

        // First stage: hit, claim, or unconditionally evict the occupant.
        let index = self.slot_index(0, key);
        let slot = &mut self.slots[index];
        let mut carried = if slot.key == *key {
            slot.value = T::from_wide(slot.value.to_wide() + value.to_wide());
            return Ok(());
        } else if slot.key == empty {
            slot.key = *key;
            slot.value = value;
            return Ok(());
        } else {
            let carried = *slot;
            slot.key = *key;
            slot.value = value;
            carried
        };

        // Later stages: hit or claim settles the carried pair; otherwise
        // it swaps with the slot only when the slot's value is strictly
        // smaller, and travels on.
        for stage in 1..self.depth {
            let index = self.slot_index(stage, &carried.key);
            let slot = &mut self.slots[index];
            if slot.key == carried.key {
                slot.value = T::from_wide(slot.value.to_wide() + carried.value.to_wide());
                return Ok(());
            } else if slot.key == empty {
                *slot = carried;
                return Ok(());
            } else if slot.value < carried.value {
                std::mem::swap(slot, &mut carried);
            }
        }
        // Carried past the last stage: dropped.
        Ok(())
    }

    fn query(&self, key: &FlowKey<L>) -> Result<T> {
        let mut sum = 0i128;
        for stage in 0..self.depth {
            let slot = &self.slots[self.slot_index(stage, key)];
            if slot.key == *key {
                sum += slot.value.to_wide();
            }
        }
        Ok(T::from_wide(sum))
    }

    fn heavy_hitters(&self, threshold: f64) -> Result<Estimation<L, T>> {
        let mut heavy = Estimation::new();
        let mut checked: HashSet<FlowKey<L>> = HashSet::new();
        for slot in &self.slots {
            if !checked.insert(slot.key) {
                continue;
            }
            let estimate = self.query(&slot.key)?;
            if estimate.to_f64() >= threshold {
                heavy.set(&slot.key, estimate);
            }
        }
        Ok(heavy)
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.key = FlowKey::new();
            slot.value = T::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Folds the key bytes little-endian, so small keys map to their own
    /// value and slot placement is predictable.
    #[derive(Default)]
    struct FoldHash;

    impl FlowHasher for FoldHash {
        fn hash_bytes(&self, bytes: &[u8]) -> u64 {
            bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64)
        }
    }

    fn key(ip: u32) -> FlowKey<4> {
        FlowKey::from_ip(ip).unwrap()
    }

    #[test]
    fn test_hit_and_claim() {
        let mut pipe: HashPipe<4, i64, FoldHash> = HashPipe::new(2, 7).unwrap();
        pipe.update(&key(1), 5).unwrap();
        pipe.update(&key(2), 3).unwrap();
        pipe.update(&key(1), 4).unwrap();
        assert_eq!(pipe.query(&key(1)).unwrap(), 9);
        assert_eq!(pipe.query(&key(2)).unwrap(), 3);
        assert_eq!(pipe.query(&key(3)).unwrap(), 0);
    }

    #[test]
    fn test_eviction_cascade() {
        // Keys 1 and 8 collide at stage 0 of a width-7 pipe.
        let mut pipe: HashPipe<4, i64, FoldHash> = HashPipe::new(2, 7).unwrap();
        pipe.update(&key(1), 5).unwrap();
        pipe.update(&key(8), 3).unwrap();
        // Key 8 claims stage 0; key 1 was carried into stage 1.
        assert_eq!(pipe.query(&key(1)).unwrap(), 5);
        assert_eq!(pipe.query(&key(8)).unwrap(), 3);

        // Key 1 arrives again: it evicts key 8 from stage 0; the carried
        // (8, 3) meets (1, 5) at stage 1 and 5 < 3 fails the strict
        // comparison, so the pair falls off the pipe.
        pipe.update(&key(1), 2).unwrap();
        assert_eq!(pipe.query(&key(1)).unwrap(), 7);
        assert_eq!(pipe.query(&key(8)).unwrap(), 0);
    }

    #[test]
    fn test_eviction_prefers_larger_values() {
        // Same collision, but now the stage-1 occupant is strictly
        // smaller than the carried pair and gets swapped out.
        let mut pipe: HashPipe<4, i64, FoldHash> = HashPipe::new(2, 7).unwrap();
        pipe.update(&key(1), 2).unwrap();
        pipe.update(&key(8), 9).unwrap();
        pipe.update(&key(1), 1).unwrap();
        // The carried (8, 9) displaces (1, 2) at stage 1.
        assert_eq!(pipe.query(&key(8)).unwrap(), 9);
        assert_eq!(pipe.query(&key(1)).unwrap(), 1);
    }

    #[test]
    fn test_order_sensitivity() {
        // The same multiset of updates in a different order lands
        // differently; this is designed behaviour.
        let mut forward: HashPipe<4, i64, FoldHash> = HashPipe::new(2, 7).unwrap();
        forward.update(&key(1), 5).unwrap();
        forward.update(&key(8), 3).unwrap();
        forward.update(&key(1), 2).unwrap();

        let mut reversed: HashPipe<4, i64, FoldHash> = HashPipe::new(2, 7).unwrap();
        reversed.update(&key(1), 2).unwrap();
        reversed.update(&key(8), 3).unwrap();
        reversed.update(&key(1), 5).unwrap();

        assert_ne!(
            forward.query(&key(8)).unwrap(),
            reversed.query(&key(8)).unwrap()
        );
    }

    #[test]
    fn test_heavy_hitters() {
        let mut pipe: HashPipe<4, i64, FoldHash> = HashPipe::new(3, 101).unwrap();
        for (ip, count) in [(1u32, 50i64), (2, 40), (3, 5), (4, 2)] {
            for _ in 0..count {
                pipe.update(&key(ip), 1).unwrap();
            }
        }
        let heavy = pipe.heavy_hitters(10.0).unwrap();
        assert!(heavy.get(&key(1)).unwrap() >= 50);
        assert!(heavy.get(&key(2)).unwrap() >= 40);
        assert!(!heavy.contains(&key(3)));
        assert!(!heavy.contains(&key(4)));
    }

    #[test]
    fn test_clear() {
        let mut pipe: HashPipe<4, i64, FoldHash> = HashPipe::new(2, 7).unwrap();
        pipe.update(&key(1), 5).unwrap();
        pipe.clear();
        assert_eq!(pipe.query(&key(1)).unwrap(), 0);
    }
}
