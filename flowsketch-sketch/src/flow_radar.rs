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

//! Flow-Radar
//!
//! A reversible sketch: a Bloom "flow filter" remembers which flows have
//! been seen, and a count table of `(flow_xor, flow_count, packet_count)`
//! rows accumulates every flow into `num_count_hash` rows. Decoding peels
//! rows whose `flow_count` has decayed to 1 (their XOR then holds exactly
//! one live key) and subtracts the recovered flow from its other rows
//! until no peelable row remains.
//!
//! The flow filter is not perfect: a false positive makes a genuinely new
//! flow skip the `flow_count`/`flow_xor` bookkeeping, losing it for
//! decoding. This is accepted sketch error.
//!
//! Reference: Li et al., "FlowRadar: A Better NetFlow for Data Centers"
//! (NSDI 2016).

use std::collections::BTreeSet;

use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::ground_truth::Estimation;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::packed::CounterInt;
use flowsketch_core::util::next_prime;

use crate::bloom::BloomFilter;
use crate::sketch::Sketch;

#[derive(Clone, Copy)]
struct CountTableRow<const L: usize, T> {
    flow_xor: FlowKey<L>,
    flow_count: T,
    packet_count: T,
}

impl<const L: usize, T: CounterInt> Default for CountTableRow<L, T> {
    fn default() -> Self {
        Self {
            flow_xor: FlowKey::new(),
            flow_count: T::default(),
            packet_count: T::default(),
        }
    }
}

pub struct FlowRadar<const L: usize, T, H = AwareHash> {
    num_count_table: usize,
    num_flows: usize,
    hash_fns: Vec<H>,
    flow_filter: BloomFilter<L, H>,
    count_table: Vec<CountTableRow<L, T>>,
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> FlowRadar<L, T, H> {
    /// Construct with a `flow_filter_size`-bit flow filter probed by
    /// `flow_filter_hash` hashes, and a count table of
    /// `count_table_size` rows (rounded up to the next prime) indexed by
    /// `count_table_hash` hashes.
    pub fn new(
        flow_filter_size: usize,
        flow_filter_hash: usize,
        count_table_size: usize,
        count_table_hash: usize,
    ) -> Result<Self> {
        let num_count_table = next_prime(count_table_size)?;
        Ok(Self {
            num_count_table,
            num_flows: 0,
            hash_fns: (0..count_table_hash).map(|_| H::default()).collect(),
            flow_filter: BloomFilter::new(flow_filter_size, flow_filter_hash)?,
            count_table: vec![CountTableRow::default(); num_count_table],
        })
    }

    /// Number of distinct flows the flow filter has admitted.
    pub fn flows(&self) -> usize {
        self.num_flows
    }
}

impl<const L: usize, T: CounterInt, H: FlowHasher + Default> Sketch<L, T>
    for FlowRadar<L, T, H>
{
    fn size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.hash_fns.len() * std::mem::size_of::<H>()
            + self.num_count_table * (2 * std::mem::size_of::<T>() + L)
            + self.flow_filter.footprint()
    }

    fn update(&mut self, key: &FlowKey<L>, value: T) -> Result<()> {
        let existed = self.flow_filter.lookup_key(key);
        if !existed {
            self.flow_filter.insert_key(key);
            self.num_flows += 1;
        }

        for hash in &self.hash_fns {
            let row = &mut self.count_table[hash.hash_key(key) as usize % self.num_count_table];
            if !existed {
                row.flow_count = T::from_wide(row.flow_count.to_wide() + 1);
                row.flow_xor ^= key;
            }
            row.packet_count = T::from_wide(row.packet_count.to_wide() + value.to_wide());
        }
        Ok(())
    }

    fn decode(&mut self) -> Result<Estimation<L, T>> {
        // Rows ordered by flow count with the row index as a stable
        // tiebreak; peelable rows surface at the front.
        let mut queue: BTreeSet<(T, usize)> = self
            .count_table
            .iter()
            .enumerate()
            .map(|(i, row)| (row.flow_count, i))
            .collect();

        let one = T::from_wide(1);
        let mut decoded = Estimation::new();
        while let Some(&(count, index)) = queue.iter().next() {
            if count > one {
                break;
            }
            queue.remove(&(count, index));
            if count == T::default() {
                continue;
            }

            let key = self.count_table[index].flow_xor;
            let volume = self.count_table[index].packet_count;
            for hash in &self.hash_fns {
                let other = hash.hash_key(&key) as usize % self.num_count_table;
                let row = &mut self.count_table[other];
                queue.remove(&(row.flow_count, other));
                row.flow_count = T::from_wide(row.flow_count.to_wide() - 1);
                row.packet_count = T::from_wide(row.packet_count.to_wide() - volume.to_wide());
                row.flow_xor ^= &key;
                queue.insert((row.flow_count, other));
            }
            decoded.set(&key, volume);
        }
        Ok(decoded)
    }

    fn clear(&mut self) {
        self.num_flows = 0;
        self.flow_filter.reset();
        self.count_table
            .iter_mut()
            .for_each(|row| *row = CountTableRow::default());
    }
}
