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

//! Count sketch
//!
//! `d × w` signed counters and `2d` hashes: the first `d` pick the column
//! per row, the least significant bit of the second `d` picks the sign.
//! A query reads back the sign-corrected counters and returns the absolute
//! value of their median (the mean of the two middle values when `d` is
//! even), cancelling collision noise in expectation. The counter type must
//! be signed.
//!
//! Reference: Charikar, Chen & Farach-Colton, 2002.

use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::packed::CounterInt;
use flowsketch_core::util::next_prime;

use crate::sketch::Sketch;

pub struct CountSketch<const L: usize, T, H = AwareHash> {
    depth: usize,
    width: usize,
    /// The first `depth` entries choose columns, the last `depth` signs.
    hash_fns: Vec<H>,
    counters: Vec<T>,
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> CountSketch<L, T, H> {
    pub fn new(depth: usize, width: usize) -> Result<Self> {
        let width = next_prime(width)?;
        Ok(Self {
            depth,
            width,
            hash_fns: (0..2 * depth).map(|_| H::default()).collect(),
            counters: vec![T::default(); depth * width],
        })
    }

    fn cell(&self, row: usize, key: &FlowKey<L>) -> usize {
        row * self.width + self.hash_fns[row].hash_key(key) as usize % self.width
    }

    fn sign(&self, row: usize, key: &FlowKey<L>) -> i128 {
        (self.hash_fns[self.depth + row].hash_key(key) & 1) as i128 * 2 - 1
    }
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> Sketch<L, T>
    for CountSketch<L, T, H>
{
    fn size(&self) -> usize {
        std::mem::size_of::<Self>()
            + 2 * self.depth * std::mem::size_of::<H>()
            + self.depth * self.width * std::mem::size_of::<T>()
    }

    fn update(&mut self, key: &FlowKey<L>, value: T) -> Result<()> {
        for row in 0..self.depth {
            let cell = self.cell(row, key);
            let signed = value.to_wide() * self.sign(row, key);
            self.counters[cell] = T::from_wide(self.counters[cell].to_wide() + signed);
        }
        Ok(())
    }

    fn query(&self, key: &FlowKey<L>) -> Result<T> {
        let mut values: Vec<i128> = (0..self.depth)
            .map(|row| self.counters[self.cell(row, key)].to_wide() * self.sign(row, key))
            .collect();
        values.sort_unstable();

        let middle = self.depth / 2;
        let median = if self.depth % 2 == 0 {
            (values[middle - 1] + values[middle]) / 2
        } else {
            values[middle]
        };
        Ok(T::from_wide(median.abs()))
    }

    fn clear(&mut self) {
        self.counters.iter_mut().for_each(|c| *c = T::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsketch_core::hash::reset_seed_sequence;

    fn key(ip: u32) -> FlowKey<4> {
        FlowKey::from_ip(ip).unwrap()
    }

    #[test]
    fn test_single_flow_is_exact_odd_depth() {
        reset_seed_sequence(43);
        let mut sketch: CountSketch<4, i64> = CountSketch::new(5, 256).unwrap();
        sketch.update(&key(3), 77).unwrap();
        sketch.update(&key(3), 23).unwrap();
        assert_eq!(sketch.query(&key(3)).unwrap(), 100);
    }

    #[test]
    fn test_single_flow_is_exact_even_depth() {
        reset_seed_sequence(47);
        let mut sketch: CountSketch<4, i64> = CountSketch::new(4, 256).unwrap();
        sketch.update(&key(3), 41).unwrap();
        assert_eq!(sketch.query(&key(3)).unwrap(), 41);
    }

    #[test]
    fn test_estimate_is_non_negative() {
        reset_seed_sequence(53);
        let mut sketch: CountSketch<4, i64> = CountSketch::new(3, 128).unwrap();
        for i in 0..200u32 {
            sketch.update(&key(i), (i as i64 % 13) + 1).unwrap();
        }
        for i in 0..200u32 {
            assert!(sketch.query(&key(i)).unwrap() >= 0);
        }
    }

    #[test]
    fn test_clear() {
        reset_seed_sequence(59);
        let mut sketch: CountSketch<4, i64> = CountSketch::new(3, 64).unwrap();
        sketch.update(&key(1), 9).unwrap();
        sketch.clear();
        assert_eq!(sketch.query(&key(1)).unwrap(), 0);
    }
}
