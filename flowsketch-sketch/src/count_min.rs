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

//! Count-Min sketch
//!
//! `d` rows of `w` counters (`w` rounded up to the next prime), one hash
//! per row. An update lands in one counter per row; a query takes the
//! minimum over the rows, so estimates never fall below the true volume
//! under non-negative updates.
//!
//! Reference: Cormode & Muthukrishnan, 2005.

use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::packed::CounterInt;
use flowsketch_core::util::next_prime;

use crate::sketch::Sketch;

pub struct CmSketch<const L: usize, T, H = AwareHash> {
    depth: usize,
    width: usize,
    hash_fns: Vec<H>,
    /// Row-major `depth × width` counter matrix.
    counters: Vec<T>,
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> CmSketch<L, T, H> {
    pub fn new(depth: usize, width: usize) -> Result<Self> {
        let width = next_prime(width)?;
        Ok(Self {
            depth,
            width,
            hash_fns: (0..depth).map(|_| H::default()).collect(),
            counters: vec![T::default(); depth * width],
        })
    }

    fn cell(&self, row: usize, key: &FlowKey<L>) -> usize {
        row * self.width + self.hash_fns[row].hash_key(key) as usize % self.width
    }
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> Sketch<L, T>
    for CmSketch<L, T, H>
{
    fn size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.depth * std::mem::size_of::<H>()
            + self.depth * self.width * std::mem::size_of::<T>()
    }

    fn update(&mut self, key: &FlowKey<L>, value: T) -> Result<()> {
        for row in 0..self.depth {
            let cell = self.cell(row, key);
            self.counters[cell] =
                T::from_wide(self.counters[cell].to_wide() + value.to_wide());
        }
        Ok(())
    }

    fn query(&self, key: &FlowKey<L>) -> Result<T> {
        Ok((0..self.depth)
            .map(|row| self.counters[self.cell(row, key)])
            .min()
            .unwrap_or_default())
    }

    fn clear(&mut self) {
        self.counters.iter_mut().for_each(|c| *c = T::default());
    }
}
