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

//! Count-Min sketch backed by a counter hierarchy
//!
//! Same update and query semantics as the plain Count-Min, but the `d × w`
//! counter matrix lives in a counter hierarchy under the serialised index
//! `row · w + column`. The layer-0 counter count is `d · w`; each higher
//! layer has `next_prime(⌈m · ρ⌉)` counters for a caller-supplied ratio
//! `ρ ∈ (0, 1)`. The hierarchy cannot improve accuracy, only space: if the
//! first layer never overflowed, the sketch behaves exactly like the plain
//! one.

use std::cell::RefCell;

use flowsketch_core::error::{MeterError, Result};
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::hierarchy::CounterHierarchy;
use flowsketch_core::packed::CounterInt;
use flowsketch_core::util::next_prime;

use crate::sketch::Sketch;

pub struct ChCmSketch<const L: usize, T, H = AwareHash> {
    depth: usize,
    width: usize,
    hash_fns: Vec<H>,
    // Queries flush the hierarchy; the core is single-threaded by
    // contract.
    ch: RefCell<CounterHierarchy<T, H>>,
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> ChCmSketch<L, T, H> {
    /// Construct a `depth × next_prime(width)` Count-Min whose counters
    /// live in a hierarchy with `width_cnt.len()` layers.
    ///
    /// `cnt_no_ratio` is the counter-count ratio between adjacent layers
    /// and must lie in `(0, 1)`; `width_cnt` gives the per-layer counter
    /// widths in bits and `no_hash` the fan-out between adjacent layers.
    pub fn new(
        depth: usize,
        width: usize,
        cnt_no_ratio: f64,
        width_cnt: &[usize],
        no_hash: &[usize],
    ) -> Result<Self> {
        let width = next_prime(width)?;
        if !(0.0..=1.0).contains(&cnt_no_ratio) || cnt_no_ratio == 0.0 || cnt_no_ratio == 1.0 {
            return Err(MeterError::BadArgument(format!(
                "counter ratio of adjacent layers should be in (0, 1), got {cnt_no_ratio}"
            )));
        }

        let mut no_cnt = vec![depth * width];
        for _ in 1..width_cnt.len() {
            let last = *no_cnt.last().unwrap();
            no_cnt.push(next_prime((last as f64 * cnt_no_ratio).ceil() as usize)?);
        }

        Ok(Self {
            depth,
            width,
            hash_fns: (0..depth).map(|_| H::default()).collect(),
            ch: RefCell::new(CounterHierarchy::new(&no_cnt, width_cnt, no_hash)?),
        })
    }

    fn cell(&self, row: usize, key: &FlowKey<L>) -> usize {
        row * self.width + self.hash_fns[row].hash_key(key) as usize % self.width
    }
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> Sketch<L, T>
    for ChCmSketch<L, T, H>
{
    fn size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.depth * std::mem::size_of::<H>()
            + self.ch.borrow().size()
    }

    fn original_size(&self) -> usize {
        self.ch.borrow().original_size()
    }

    fn update(&mut self, key: &FlowKey<L>, value: T) -> Result<()> {
        for row in 0..self.depth {
            let cell = self.cell(row, key);
            self.ch.get_mut().update(cell, value)?;
        }
        Ok(())
    }

    fn query(&self, key: &FlowKey<L>) -> Result<T> {
        let mut ch = self.ch.borrow_mut();
        let mut min: Option<T> = None;
        for row in 0..self.depth {
            let value = ch.read(self.cell(row, key))?;
            min = Some(match min {
                Some(m) if m <= value => m,
                _ => value,
            });
        }
        Ok(min.unwrap_or_default())
    }

    fn clear(&mut self) {
        self.ch.get_mut().clear();
    }
}
