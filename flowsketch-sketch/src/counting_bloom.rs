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

//! Counting Bloom filter
//!
//! A Bloom filter whose bits are replaced by narrow counters (a
//! single-layer counter hierarchy), which makes deletion possible.
//! Inserting only increments when at least one hashed counter is zero, so
//! re-inserting a present item does not double-count; removing only
//! decrements when every hashed counter is non-zero.

use std::cell::RefCell;

use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::hash::{AwareHash, FlowHasher};
use flowsketch_core::hierarchy::CounterHierarchy;
use flowsketch_core::util::next_prime;

use crate::sketch::Sketch;

pub struct CountingBloomFilter<const L: usize, H = AwareHash> {
    ncnt: usize,
    nhash: usize,
    hash_fns: Vec<H>,
    // Reads flush the hierarchy; the core is single-threaded by contract.
    counter: RefCell<CounterHierarchy<i64, H>>,
}

impl<const L: usize, H: FlowHasher + Default> CountingBloomFilter<L, H> {
    /// Construct with `num_cnt` counters (rounded up to the next prime) of
    /// `cnt_length` bits each, probed by `num_hash` hash functions.
    pub fn new(num_cnt: usize, num_hash: usize, cnt_length: usize) -> Result<Self> {
        let ncnt = next_prime(num_cnt)?;
        Ok(Self {
            ncnt,
            nhash: num_hash,
            hash_fns: (0..num_hash).map(|_| H::default()).collect(),
            counter: RefCell::new(CounterHierarchy::new(&[ncnt], &[cnt_length], &[])?),
        })
    }

    fn buckets<'a>(&'a self, key: &'a FlowKey<L>) -> impl Iterator<Item = usize> + 'a {
        self.hash_fns
            .iter()
            .map(move |hash| hash.hash_key(key) as usize % self.ncnt)
    }

    /// Index of the first zero bucket of `key`, if any.
    fn first_zero(&self, key: &FlowKey<L>) -> Result<Option<usize>> {
        let mut counter = self.counter.borrow_mut();
        for (i, bucket) in self.buckets(key).enumerate() {
            if counter.read(bucket)? == 0 {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Remove a key: decrement every hashed counter, but only when all of
    /// them are non-zero.
    pub fn remove(&mut self, key: &FlowKey<L>) -> Result<()> {
        if self.first_zero(key)?.is_none() {
            let buckets: Vec<usize> = self.buckets(key).collect();
            let counter = self.counter.get_mut();
            for bucket in buckets {
                counter.update(bucket, -1)?;
            }
        }
        Ok(())
    }
}

impl<const L: usize, H: FlowHasher + Default> Sketch<L, i64> for CountingBloomFilter<L, H> {
    fn size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.nhash * std::mem::size_of::<H>()
            + self.counter.borrow().size()
    }

    fn insert(&mut self, key: &FlowKey<L>) -> Result<()> {
        // Increment only when some bucket is still zero, so that repeat
        // inserts of a present key leave the filter unchanged.
        if self.first_zero(key)?.is_some() {
            let buckets: Vec<usize> = self.buckets(key).collect();
            let counter = self.counter.get_mut();
            for bucket in buckets {
                counter.update(bucket, 1)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, key: &FlowKey<L>) -> Result<bool> {
        Ok(self.first_zero(key)?.is_none())
    }

    fn clear(&mut self) {
        self.counter.get_mut().clear();
    }
}
