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

//! Exact per-flow aggregates and sketch estimations
//!
//! [`GndTruth`] is a two-way mapping between flow keys and counter values:
//! a dense vector sorted by value in descending order (the right view,
//! giving random access and range queries) and a key-to-index hash map
//! (the left view, giving O(1) lookup), rebuilt whenever the vector is
//! re-sorted. It is the reference the measurement harness scores sketches
//! against, and also the container heavy-hitter / heavy-changer extraction
//! produces.
//!
//! Constructor-like operations (`build`, `heavy_hitters*`,
//! `heavy_changers*`) may run at most once per instance. A repeat call is
//! reported as a warning and leaves the instance unchanged.
//!
//! [`Estimation`] is the relaxed sibling sketches return: the same two-way
//! shape, but without the sorted invariant; iteration follows insertion
//! order.

use std::collections::HashMap;

use tracing::warn;

use crate::data::{CntMethod, Record};
use crate::error::{MeterError, Result};
use crate::flowkey::FlowKey;
use crate::packed::CounterInt;

/// The defining rule of heavy hitters and heavy changers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HxMethod {
    /// The heaviest `⌊threshold⌋` flows. Threshold must be `>= 1`.
    TopK,
    /// Flows contributing a fraction strictly greater than `threshold` of
    /// the total. Threshold must be in `[0, 1]`.
    Percentile,
}

/// Exact per-flow aggregate of a record stream.
#[derive(Clone, Debug)]
pub struct GndTruth<const L: usize, T> {
    /// Right view: `(value, key)`, descending by value after construction.
    entries: Vec<(T, FlowKey<L>)>,
    /// Left view: key to position in `entries`.
    index: HashMap<FlowKey<L>, usize>,
    /// Sum of all counter values.
    total: i64,
    /// How many constructor-like calls this instance has seen.
    called: u32,
}

impl<const L: usize, T> Default for GndTruth<L, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            total: 0,
            called: 0,
        }
    }
}

impl<const L: usize, T: CounterInt> GndTruth<L, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot guard shared by the constructor-like operations.
    fn first_call(&mut self) -> bool {
        self.called += 1;
        if self.called > 1 {
            warn!(
                "ground-truth construction invoked for the {}th time, instance left unchanged",
                self.called
            );
            return false;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The smallest counter value, O(1) from the sorted right view.
    pub fn min(&self) -> Option<T> {
        self.entries.last().map(|e| e.0)
    }

    /// The largest counter value, O(1) from the sorted right view.
    pub fn max(&self) -> Option<T> {
        self.entries.first().map(|e| e.0)
    }

    /// Sum of all counter values.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Whether `key` occurs in the stream.
    pub fn contains(&self, key: &FlowKey<L>) -> bool {
        self.index.contains_key(key)
    }

    /// The value of `key`, if present.
    pub fn get(&self, key: &FlowKey<L>) -> Option<T> {
        self.index.get(key).map(|&i| self.entries[i].0)
    }

    /// The value of `key`; absent keys fail with
    /// [`MeterError::OutOfRange`].
    pub fn at(&self, key: &FlowKey<L>) -> Result<T> {
        self.get(key).ok_or(MeterError::OutOfRange {
            index: 0,
            bound: self.entries.len(),
        })
    }

    /// `(key, value)` pairs in descending value order.
    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey<L>, T)> {
        self.entries.iter().map(|(v, k)| (k, *v))
    }

    /// The contiguous run of entries whose value equals `value`,
    /// logarithmic in the number of flows.
    pub fn equal_range(&self, value: T) -> &[(T, FlowKey<L>)] {
        let start = self.entries.partition_point(|e| e.0 > value);
        let end = self.entries.partition_point(|e| e.0 >= value);
        &self.entries[start..end]
    }

    /// Swap contents with `other`. Call histories are swapped as well.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Sort the right view in descending value order (ascending key as a
    /// deterministic tiebreak) and rebuild the left view.
    fn finish(&mut self) {
        self.entries
            .sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, k))| (*k, i))
            .collect();
    }

    fn accumulate(
        acc: &mut HashMap<FlowKey<L>, i128>,
        total: &mut i64,
        records: &[Record<L>],
        cnt_method: CntMethod,
        spurious: &mut bool,
        overflow: &mut bool,
    ) {
        for record in records {
            let delta = match cnt_method {
                CntMethod::InLength => {
                    if record.length <= 0 || record.length > 1500 {
                        *spurious = true;
                    }
                    record.length as i128
                }
                CntMethod::InPacket => 1,
            };
            let value = acc.entry(record.flowkey).or_default();
            *value += delta;
            *total += delta as i64;
            if (*value >> (T::BITS - 1)) & 1 == 1 {
                *overflow = true;
            }
        }
    }

    fn warn_build(spurious: bool, overflow: bool) {
        if spurious {
            warn!("some flows have spurious length, check the raw data");
        }
        if overflow {
            warn!("some counters overflew while building ground truth, use a wider counter type");
        }
    }

    fn build_unguarded(&mut self, records: &[Record<L>], cnt_method: CntMethod) {
        let mut acc = HashMap::new();
        let mut spurious = false;
        let mut overflow = false;
        Self::accumulate(
            &mut acc,
            &mut self.total,
            records,
            cnt_method,
            &mut spurious,
            &mut overflow,
        );
        Self::warn_build(spurious, overflow);
        self.entries = acc
            .into_iter()
            .map(|(k, v)| (T::from_wide(v), k))
            .collect();
        self.finish();
    }

    /// Build the exact flow summary of `records`.
    ///
    /// With byte counting, records whose length falls outside `(0, 1500]`
    /// are reported (the flow still counts); counters whose top bit gets
    /// set are reported as suspected overflow.
    pub fn build(&mut self, records: &[Record<L>], cnt_method: CntMethod) {
        if !self.first_call() {
            return;
        }
        self.build_unguarded(records, cnt_method);
    }

    /// Truncate the sorted right view per the policy, against a basis sum,
    /// then recompute `total` over what is kept.
    fn apply_policy(&mut self, threshold: f64, method: HxMethod, basis: i64) -> Result<()> {
        match method {
            HxMethod::TopK => {
                if threshold < 1.0 {
                    return Err(MeterError::BadArgument(format!(
                        "top-k threshold should be >= 1.0, got {threshold}"
                    )));
                }
                let keep = (threshold as usize).min(self.entries.len());
                self.entries.truncate(keep);
            }
            HxMethod::Percentile => {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(MeterError::BadArgument(format!(
                        "percentile threshold should be in [0, 1], got {threshold}"
                    )));
                }
                let bar = (threshold * basis as f64) as i128;
                let keep = self.entries.partition_point(|e| e.0.to_wide() > bar);
                self.entries.truncate(keep);
            }
        }
        self.total = self.entries.iter().map(|e| e.0.to_wide() as i64).sum();
        self.rebuild_index();
        Ok(())
    }

    /// Extract heavy hitters from a flow summary, copying the kept flows.
    pub fn heavy_hitters_of(
        &mut self,
        summary: &GndTruth<L, T>,
        threshold: f64,
        method: HxMethod,
    ) -> Result<()> {
        if !self.first_call() {
            return Ok(());
        }
        self.entries = summary.entries.clone();
        self.apply_policy(threshold, method, summary.total)
    }

    /// Extract heavy hitters from a relinquished flow summary without
    /// copying its flows.
    pub fn heavy_hitters_moving(
        &mut self,
        summary: GndTruth<L, T>,
        threshold: f64,
        method: HxMethod,
    ) -> Result<()> {
        if !self.first_call() {
            return Ok(());
        }
        let basis = summary.total;
        self.entries = summary.entries;
        self.apply_policy(threshold, method, basis)
    }

    /// Build the summary of a record range and extract its heavy hitters
    /// in one go.
    pub fn heavy_hitters_from_records(
        &mut self,
        records: &[Record<L>],
        cnt_method: CntMethod,
        threshold: f64,
        method: HxMethod,
    ) -> Result<()> {
        if !self.first_call() {
            return Ok(());
        }
        self.build_unguarded(records, cnt_method);
        let basis = self.total;
        self.apply_policy(threshold, method, basis)
    }

    /// Fold `other` into the entries as an absolute difference, then
    /// re-sort. Missing keys contribute zero on their side.
    fn subtract_abs(&mut self, other: &GndTruth<L, T>) {
        let mut acc: HashMap<FlowKey<L>, i128> = self
            .entries
            .iter()
            .map(|(v, k)| (*k, v.to_wide()))
            .collect();
        for (value, key) in &other.entries {
            let slot = acc.entry(*key).or_default();
            let old = *slot;
            let new = (old - value.to_wide()).abs();
            *slot = new;
            self.total += (new - old) as i64;
        }
        self.entries = acc
            .into_iter()
            .map(|(k, v)| (T::from_wide(v), k))
            .collect();
        self.finish();
    }

    /// Extract heavy changers between two flow summaries, copying flows.
    pub fn heavy_changers_of(
        &mut self,
        first: &GndTruth<L, T>,
        second: &GndTruth<L, T>,
        threshold: f64,
        method: HxMethod,
    ) -> Result<()> {
        if !self.first_call() {
            return Ok(());
        }
        self.entries = first.entries.clone();
        self.total = first.total;
        self.subtract_abs(second);
        let basis = self.total;
        self.apply_policy(threshold, method, basis)
    }

    /// Extract heavy changers, relinquishing the first summary.
    pub fn heavy_changers_moving(
        &mut self,
        first: GndTruth<L, T>,
        second: &GndTruth<L, T>,
        threshold: f64,
        method: HxMethod,
    ) -> Result<()> {
        if !self.first_call() {
            return Ok(());
        }
        self.entries = first.entries;
        self.total = first.total;
        self.subtract_abs(second);
        let basis = self.total;
        self.apply_policy(threshold, method, basis)
    }

    /// Build both epoch summaries streaming and extract their heavy
    /// changers.
    pub fn heavy_changers_from_records(
        &mut self,
        first: &[Record<L>],
        second: &[Record<L>],
        cnt_method: CntMethod,
        threshold: f64,
        method: HxMethod,
    ) -> Result<()> {
        if !self.first_call() {
            return Ok(());
        }
        let mut acc = HashMap::new();
        let mut spurious = false;
        let mut overflow = false;
        Self::accumulate(
            &mut acc,
            &mut self.total,
            first,
            cnt_method,
            &mut spurious,
            &mut overflow,
        );
        Self::warn_build(spurious, overflow);

        let mut spurious = false;
        for record in second {
            let delta = match cnt_method {
                CntMethod::InLength => {
                    if record.length <= 0 || record.length > 1500 {
                        spurious = true;
                    }
                    record.length as i128
                }
                CntMethod::InPacket => 1,
            };
            *acc.entry(record.flowkey).or_default() -= delta;
            self.total -= delta as i64;
        }
        if spurious {
            warn!("some flows have spurious length, check the raw data");
        }

        for value in acc.values_mut() {
            if *value < 0 {
                self.total -= 2 * *value as i64;
                *value = -*value;
            }
        }
        self.entries = acc
            .into_iter()
            .map(|(k, v)| (T::from_wide(v), k))
            .collect();
        self.finish();

        let basis = self.total;
        self.apply_policy(threshold, method, basis)
    }
}

/// Output of a sketch as an estimation of ground truth.
///
/// Same two-way shape as [`GndTruth`], but the right view keeps insertion
/// order instead of the sorted invariant.
#[derive(Clone, Debug)]
pub struct Estimation<const L: usize, T> {
    entries: Vec<(T, FlowKey<L>)>,
    index: HashMap<FlowKey<L>, usize>,
}

impl<const L: usize, T> Default for Estimation<L, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<const L: usize, T: CounterInt> Estimation<L, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` has been recorded.
    pub fn contains(&self, key: &FlowKey<L>) -> bool {
        self.index.contains_key(key)
    }

    /// The value recorded for `key`, if any.
    pub fn get(&self, key: &FlowKey<L>) -> Option<T> {
        self.index.get(key).map(|&i| self.entries[i].0)
    }

    /// `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey<L>, T)> {
        self.entries.iter().map(|(v, k)| (k, *v))
    }

    fn slot(&mut self, key: FlowKey<L>) -> (&mut T, bool) {
        if let Some(&i) = self.index.get(&key) {
            (&mut self.entries[i].0, false)
        } else {
            let i = self.entries.len();
            self.entries.push((T::default(), key));
            self.index.insert(key, i);
            (&mut self.entries[i].0, true)
        }
    }

    /// Record `key` with a zero value. Returns `false` when the key
    /// already existed (the value is left alone).
    pub fn insert(&mut self, key: &FlowKey<L>) -> bool {
        self.slot(*key).1
    }

    /// Add `value` to `key`, creating it at zero first if absent. Returns
    /// `true` when the key was newly created.
    pub fn update(&mut self, key: &FlowKey<L>, value: T) -> bool {
        let (slot, created) = self.slot(*key);
        *slot = T::from_wide(slot.to_wide() + value.to_wide());
        created
    }

    /// Overwrite the value recorded for `key`.
    pub fn set(&mut self, key: &FlowKey<L>, value: T) {
        *self.slot(*key).0 = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key4(ip: u32) -> FlowKey<4> {
        FlowKey::from_ip(ip).unwrap()
    }

    fn key8(raw: u64) -> FlowKey<8> {
        FlowKey::from_slice(&raw.to_ne_bytes()).unwrap()
    }

    fn records4(keys: &[u32], lengths: &[i64]) -> Vec<Record<4>> {
        keys.iter()
            .zip(lengths.iter())
            .map(|(&k, &len)| Record {
                flowkey: key4(k),
                timestamp: 0,
                length: len,
            })
            .collect()
    }

    const TEN_KEYS: [u32; 10] = [
        0x1f1f1, 0x2f2f2, 0x1f1f1, 0x3f3f3, 0x4f4f4, 0x1f1f1, 0x2f2f2, 0x3f3f3, 0x5f5f5, 0x1f1f1,
    ];
    const TEN_LENGTHS: [i64; 10] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512];

    #[test]
    fn test_build_in_length() {
        let records = records4(&TEN_KEYS, &TEN_LENGTHS);
        let mut truth: GndTruth<4, i64> = GndTruth::new();
        assert!(truth.is_empty());
        truth.build(&records, CntMethod::InLength);

        assert!(!truth.is_empty());
        assert_eq!(truth.len(), 5);
        assert_eq!(truth.total(), 1023);
        assert_eq!(truth.get(&key4(0x1f1f1)), Some(1 + 4 + 32 + 512));
        assert_eq!(truth.get(&key4(0x2f2f2)), Some(2 + 64));
        assert_eq!(truth.get(&key4(0x3f3f3)), Some(8 + 128));
        assert_eq!(truth.get(&key4(0x4f4f4)), Some(16));
        assert_eq!(truth.get(&key4(0x5f5f5)), Some(256));

        // Right view is sorted non-increasing and starts at the top flow.
        let values: Vec<i64> = truth.iter().map(|(_, v)| v).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        let (top_key, top_value) = truth.iter().next().unwrap();
        assert_eq!(*top_key, key4(0x1f1f1));
        assert_eq!(top_value, 549);
        assert_eq!(truth.max(), Some(549));
        assert_eq!(truth.min(), Some(16));
        assert_eq!(
            truth.total(),
            truth.iter().map(|(_, v)| v).sum::<i64>()
        );
    }

    #[test]
    fn test_build_in_packet_and_swap() {
        let records = records4(&TEN_KEYS, &TEN_LENGTHS);
        let mut by_len: GndTruth<4, i64> = GndTruth::new();
        let mut by_pkt: GndTruth<4, i64> = GndTruth::new();
        by_len.build(&records, CntMethod::InLength);
        by_pkt.build(&records, CntMethod::InPacket);

        assert_eq!(by_pkt.total(), 10);
        assert_eq!(by_pkt.get(&key4(0x1f1f1)), Some(4));
        assert_eq!(by_pkt.get(&key4(0x4f4f4)), Some(1));

        by_len.swap(&mut by_pkt);
        assert_eq!(by_len.total(), 10);
        assert_eq!(by_pkt.total(), 1023);
        assert_eq!(by_pkt.get(&key4(0x1f1f1)), Some(549));
    }

    #[test]
    fn test_once_only_guard() {
        let records = records4(&TEN_KEYS, &TEN_LENGTHS);
        let mut truth: GndTruth<4, i64> = GndTruth::new();
        truth.build(&records, CntMethod::InLength);
        let before: Vec<(FlowKey<4>, i64)> =
            truth.iter().map(|(k, v)| (*k, v)).collect();

        // Second construction is a no-op with a warning.
        truth.build(&records, CntMethod::InPacket);
        let after: Vec<(FlowKey<4>, i64)> = truth.iter().map(|(k, v)| (*k, v)).collect();
        assert_eq!(before, after);
        assert_eq!(truth.total(), 1023);
    }

    #[test]
    fn test_equal_range() {
        let keys: [u64; 12] = [
            0x1f1f1, 0x2f2f2, 0x1f1f1, 0x3f3f3, 0x4f4f4, 0x1f1f1, 0x2f2f2, 0x3f3f3, 0x5f5f5,
            0x1f1f1, 0x5f5f5, 0x6f6f6,
        ];
        let lengths: [i64; 12] = [1, 2, 1, 1, 5, 1, 3, 3, 2, 1, 2, 5];
        let records: Vec<Record<8>> = keys
            .iter()
            .zip(lengths.iter())
            .map(|(&k, &len)| Record {
                flowkey: key8(k),
                timestamp: 0,
                length: len,
            })
            .collect();

        let mut by_len: GndTruth<8, i64> = GndTruth::new();
        let mut by_pkt: GndTruth<8, i64> = GndTruth::new();
        by_len.build(&records, CntMethod::InLength);
        by_pkt.build(&records, CntMethod::InPacket);
        assert_eq!(by_len.total(), 27);
        assert_eq!(by_pkt.total(), 12);

        let run = by_len.equal_range(4);
        let found: Vec<FlowKey<8>> = run.iter().map(|e| e.1).collect();
        assert_eq!(run.len(), 3);
        for raw in [0x1f1f1u64, 0x3f3f3, 0x5f5f5] {
            assert!(found.contains(&key8(raw)));
        }

        let run = by_len.equal_range(5);
        assert_eq!(run.len(), 3);

        let run = by_pkt.equal_range(4);
        assert_eq!(run.len(), 1);
        assert_eq!(run[0].1, key8(0x1f1f1));

        let run = by_pkt.equal_range(1);
        let found: Vec<FlowKey<8>> = run.iter().map(|e| e.1).collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&key8(0x4f4f4)));
        assert!(found.contains(&key8(0x6f6f6)));

        assert!(by_pkt.equal_range(3).is_empty());
        assert!(by_pkt.equal_range(0).is_empty());
        assert!(by_pkt.equal_range(5).is_empty());
    }

    const THIRTYTWO_KEYS: [u32; 32] = [
        0x1, 0x3, 0x8, 0xa, 0x8, 0xa, 0x1, 0x5, 0x5, 0x2, 0x5, 0x9, 0x1, 0x4, 0x4, 0x6, 0x8, 0x1,
        0x2, 0xa, 0x6, 0x7, 0x1, 0x3, 0x3, 0x3, 0x4, 0x4, 0x7, 0x7, 0x7, 0x7,
    ];

    fn thirtytwo_records() -> Vec<Record<4>> {
        THIRTYTWO_KEYS
            .iter()
            .map(|&k| Record {
                flowkey: key4(k),
                timestamp: 0,
                length: 1,
            })
            .collect()
    }

    #[test]
    fn test_top_k_heavy_hitters() {
        let records = thirtytwo_records();
        let mut truth: GndTruth<4, i32> = GndTruth::new();
        truth.build(&records, CntMethod::InPacket);
        assert_eq!(truth.total(), 32);

        let mut top2: GndTruth<4, i32> = GndTruth::new();
        top2.heavy_hitters_of(&truth, 2.0, HxMethod::TopK).unwrap();
        assert_eq!(top2.len(), 2);
        assert_eq!(top2.get(&key4(0x1)), Some(5));
        assert_eq!(top2.get(&key4(0x7)), Some(5));
        assert_eq!(top2.total(), 10);

        let mut top4: GndTruth<4, i32> = GndTruth::new();
        top4.heavy_hitters_of(&truth, 4.0, HxMethod::TopK).unwrap();
        assert_eq!(top4.len(), 4);
        assert_eq!(top4.get(&key4(0x3)), Some(4));
        assert_eq!(top4.get(&key4(0x4)), Some(4));
        assert_eq!(top4.total(), 18);

        let mut top7: GndTruth<4, i32> = GndTruth::new();
        top7.heavy_hitters_of(&truth, 7.0, HxMethod::TopK).unwrap();
        assert_eq!(top7.len(), 7);
        assert_eq!(top7.total(), 27);
        for raw in [0x5u32, 0x8, 0xa] {
            assert_eq!(top7.get(&key4(raw)), Some(3));
        }
        // Everything kept dominates everything excluded.
        let kept_min = top7.min().unwrap();
        for (key, value) in truth.iter() {
            if !top7.contains(key) {
                assert!(value <= kept_min);
            }
        }

        // Top-K of more flows than exist returns them all.
        let mut all: GndTruth<4, i32> = GndTruth::new();
        all.heavy_hitters_of(&truth, 100.0, HxMethod::TopK).unwrap();
        assert_eq!(all.len(), truth.len());

        let mut bad: GndTruth<4, i32> = GndTruth::new();
        assert!(bad.heavy_hitters_of(&truth, 0.5, HxMethod::TopK).is_err());
    }

    #[test]
    fn test_percentile_heavy_hitters() {
        let records = thirtytwo_records();
        let mut truth: GndTruth<4, i32> = GndTruth::new();
        truth.build(&records, CntMethod::InPacket);

        // Exhaustive sweep against a naive filter.
        for threshold in 0..=32 {
            let mut hh: GndTruth<4, i32> = GndTruth::new();
            hh.heavy_hitters_of(&truth, threshold as f64 / 32.0, HxMethod::Percentile)
                .unwrap();
            let mut expected = 0usize;
            let mut expected_total = 0i64;
            for (key, value) in truth.iter() {
                if i64::from(value) > threshold {
                    expected += 1;
                    expected_total += i64::from(value);
                    assert_eq!(hh.get(key), Some(value));
                }
            }
            assert_eq!(hh.len(), expected);
            assert_eq!(hh.total(), expected_total);
        }

        let mut bad: GndTruth<4, i32> = GndTruth::new();
        assert!(bad
            .heavy_hitters_of(&truth, 1.5, HxMethod::Percentile)
            .is_err());
    }

    #[test]
    fn test_heavy_hitters_moving_and_from_records() {
        let records = thirtytwo_records();
        let mut truth: GndTruth<4, i32> = GndTruth::new();
        truth.build(&records, CntMethod::InPacket);

        let mut moved: GndTruth<4, i32> = GndTruth::new();
        moved
            .heavy_hitters_moving(truth, 2.0, HxMethod::TopK)
            .unwrap();
        assert_eq!(moved.len(), 2);
        assert_eq!(moved.total(), 10);

        let mut direct: GndTruth<4, i32> = GndTruth::new();
        direct
            .heavy_hitters_from_records(&records, CntMethod::InPacket, 2.0, HxMethod::TopK)
            .unwrap();
        assert_eq!(direct.len(), 2);
        assert_eq!(direct.get(&key4(0x1)), Some(5));
        assert_eq!(direct.get(&key4(0x7)), Some(5));
    }

    #[test]
    fn test_heavy_changers() {
        let records = thirtytwo_records();
        let first = &records[..16];
        let second = &records[16..];

        // |first − second| per flow.
        let expected: [(u32, i32); 10] = [
            (0x1, 1),
            (0x2, 0),
            (0x3, 2),
            (0x4, 0),
            (0x5, 3),
            (0x6, 0),
            (0x7, 5),
            (0x8, 1),
            (0x9, 1),
            (0xa, 1),
        ];

        for threshold in 0..=14 {
            let mut hc: GndTruth<4, i32> = GndTruth::new();
            hc.heavy_changers_from_records(
                first,
                second,
                CntMethod::InPacket,
                threshold as f64 / 14.0,
                HxMethod::Percentile,
            )
            .unwrap();
            let expected_count = expected
                .iter()
                .filter(|&&(_, diff)| diff > threshold)
                .count();
            assert_eq!(hc.len(), expected_count);
            for &(raw, diff) in &expected {
                if diff > threshold {
                    assert_eq!(hc.get(&key4(raw)), Some(diff));
                }
            }
        }

        let mut summary_1: GndTruth<4, i32> = GndTruth::new();
        let mut summary_2: GndTruth<4, i32> = GndTruth::new();
        summary_1.build(first, CntMethod::InPacket);
        summary_2.build(second, CntMethod::InPacket);
        assert_eq!(summary_1.len(), 9);
        assert_eq!(summary_1.total(), 16);
        assert_eq!(summary_2.total(), 16);

        let mut top3: GndTruth<4, i32> = GndTruth::new();
        top3.heavy_changers_moving(summary_1, &summary_2, 3.0, HxMethod::TopK)
            .unwrap();
        assert_eq!(top3.len(), 3);
        assert_eq!(top3.get(&key4(0x3)), Some(2));
        assert_eq!(top3.get(&key4(0x5)), Some(3));
        assert_eq!(top3.get(&key4(0x7)), Some(5));
        assert_eq!(top3.total(), 10);

        let mut summary_4: GndTruth<4, i32> = GndTruth::new();
        let mut summary_5: GndTruth<4, i32> = GndTruth::new();
        summary_4.build(first, CntMethod::InPacket);
        summary_5.build(second, CntMethod::InPacket);
        let mut top7: GndTruth<4, i32> = GndTruth::new();
        top7.heavy_changers_of(&summary_4, &summary_5, 7.0, HxMethod::TopK)
            .unwrap();
        assert_eq!(top7.len(), 7);
        assert_eq!(summary_4.len(), 9);
        assert_eq!(summary_4.total(), 16);
        assert_eq!(top7.total(), 14);

        // Heavy changers are symmetric in their arguments.
        let mut reversed: GndTruth<4, i32> = GndTruth::new();
        reversed
            .heavy_changers_of(&summary_5, &summary_4, 7.0, HxMethod::TopK)
            .unwrap();
        assert_eq!(reversed.len(), top7.len());
        assert_eq!(reversed.total(), top7.total());
        for (key, value) in top7.iter() {
            assert_eq!(reversed.get(key), Some(value));
        }
    }

    #[test]
    fn test_estimation() {
        let mut estimate: Estimation<4, i32> = Estimation::new();
        let (k1, k2, k3, k4) = (key4(1), key4(2), key4(3), key4(4));

        estimate.update(&k1, 100);
        assert_eq!(estimate.get(&k1), Some(100));
        assert_eq!(estimate.len(), 1);
        assert!(!estimate.contains(&k4));

        assert!(estimate.insert(&k2));
        assert_eq!(estimate.get(&k2), Some(0));
        assert!(!estimate.update(&k2, 3));
        assert_eq!(estimate.get(&k2), Some(3));

        assert!(estimate.update(&k3, 2022));
        assert_eq!(estimate.len(), 3);
        assert!(!estimate.insert(&k3));
        assert_eq!(estimate.get(&k3), Some(2022));

        assert!(estimate.insert(&k4));
        assert_eq!(estimate.len(), 4);
        assert!(estimate.contains(&k4));
        assert_eq!(estimate.get(&k4), Some(0));

        estimate.set(&k4, 7);
        assert_eq!(estimate.get(&k4), Some(7));

        // Insertion order is preserved.
        let order: Vec<FlowKey<4>> = estimate.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec![k1, k2, k3, k4]);
    }
}
