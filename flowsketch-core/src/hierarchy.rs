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

//! Counter hierarchy
//!
//! A cascading bank of narrow counters. Updates land in a wide layer of
//! cheap counters; whenever one overflows, the carry is hashed up into a
//! smaller layer of counters, and so on. Reads recover the full layer-0
//! values by solving a sparse least-squares system per layer boundary,
//! restricted to the counters whose overflow-witness bit is set.
//!
//! Updates are buffered: nothing is hashed or propagated until the first
//! read after an update, which flushes the pending deltas through every
//! layer and re-runs the decoder. The decoded layer-0 vector is cached, so
//! consecutive reads without intervening updates are O(1).
//!
//! The hierarchy assumes the tracked values stay non-negative (negative
//! *deltas* are fine); otherwise the recovery error is unbounded. Prime
//! layer sizes are recommended.

use std::collections::BTreeMap;

use ndarray::Array1;

use crate::bitarray::BitArray;
use crate::error::{MeterError, Result};
use crate::hash::FlowHasher;
use crate::packed::{CounterInt, DynInt};

type CarryOver = BTreeMap<usize, i128>;

/// Multi-layer overflow-propagating counter bank with sparse recovery.
pub struct CounterHierarchy<T, H> {
    no_cnt: Vec<usize>,
    width_cnt: Vec<usize>,
    no_hash: Vec<usize>,
    hash_fns: Vec<Vec<H>>,
    counters: Vec<Vec<DynInt<T>>>,
    witness: Vec<BitArray>,
    /// Exact copy of the layer-0 updates, for diagnostics.
    shadow: Vec<i128>,
    /// Cached layer-0 decode; valid whenever `pending` is empty.
    decoded: Vec<f64>,
    pending: CarryOver,
}

impl<T: CounterInt, H: FlowHasher + Default> CounterHierarchy<T, H> {
    /// Construct a hierarchy from its architectural parameters: per-layer
    /// counter counts, per-layer counter widths in bits, and the hash
    /// fan-out between each pair of adjacent layers.
    ///
    /// Shape requirements, violated ones fail with
    /// [`MeterError::Misconfigured`]:
    /// - at least one layer, `no_cnt` and `width_cnt` of equal length and
    ///   `no_hash` exactly one shorter;
    /// - no zero entries anywhere;
    /// - the widths sum to at most `8·sizeof(T)`.
    pub fn new(no_cnt: &[usize], width_cnt: &[usize], no_hash: &[usize]) -> Result<Self> {
        if no_cnt.is_empty() {
            return Err(MeterError::Misconfigured(
                "counter hierarchy needs at least one layer".into(),
            ));
        }
        let layers = no_cnt.len();
        if width_cnt.len() != layers {
            return Err(MeterError::Misconfigured(format!(
                "width_cnt should have {} entries, got {}",
                layers,
                width_cnt.len()
            )));
        }
        if no_hash.len() + 1 != layers {
            return Err(MeterError::Misconfigured(format!(
                "no_hash should have {} entries, got {}",
                layers - 1,
                no_hash.len()
            )));
        }
        if no_cnt.iter().any(|&m| m == 0) {
            return Err(MeterError::Misconfigured("zero entry in no_cnt".into()));
        }
        if width_cnt.iter().any(|&w| w == 0) {
            return Err(MeterError::Misconfigured("zero entry in width_cnt".into()));
        }
        if no_hash.iter().any(|&h| h == 0) {
            return Err(MeterError::Misconfigured("zero entry in no_hash".into()));
        }
        let mut total_width = 0usize;
        for &w in width_cnt {
            total_width = total_width.checked_add(w).ok_or_else(|| {
                MeterError::Misconfigured("aggregate counter width overflows".into())
            })?;
        }
        if total_width > T::BITS as usize {
            return Err(MeterError::Misconfigured(format!(
                "aggregate counter width {} exceeds the {} bits of the backing type",
                total_width,
                T::BITS
            )));
        }

        let hash_fns = no_hash
            .iter()
            .map(|&h| (0..h).map(|_| H::default()).collect())
            .collect();
        let counters = no_cnt
            .iter()
            .zip(width_cnt.iter())
            .map(|(&m, &w)| (0..m).map(|_| DynInt::new(w)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        let witness = no_cnt.iter().map(|&m| BitArray::new(m)).collect();

        Ok(Self {
            no_cnt: no_cnt.to_vec(),
            width_cnt: width_cnt.to_vec(),
            no_hash: no_hash.to_vec(),
            hash_fns,
            counters,
            witness,
            shadow: vec![0; no_cnt[0]],
            decoded: vec![0.0; no_cnt[0]],
            pending: CarryOver::new(),
        })
    }

    /// Number of layers.
    pub fn layers(&self) -> usize {
        self.no_cnt.len()
    }

    /// Number of addressable (layer-0) counters.
    pub fn len(&self) -> usize {
        self.no_cnt[0]
    }

    pub fn is_empty(&self) -> bool {
        self.no_cnt[0] == 0
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.no_cnt[0] {
            return Err(MeterError::OutOfRange {
                index,
                bound: self.no_cnt[0],
            });
        }
        Ok(())
    }

    /// Buffer a delta against counter `index`. No hashing or propagation
    /// happens until the next read.
    pub fn update(&mut self, index: usize, delta: T) -> Result<()> {
        self.check_index(index)?;
        let wide = delta.to_wide();
        if wide < 0 && !T::SIGNED {
            return Err(MeterError::BadArgument(
                "negative delta on an unsigned counter hierarchy".into(),
            ));
        }
        *self.pending.entry(index).or_default() += wide;
        self.shadow[index] += wide;
        Ok(())
    }

    /// The decoded value of counter `index`, flushing buffered updates
    /// first if any. Fails with [`MeterError::CounterOverflow`] if a carry
    /// escapes the top layer during the flush.
    pub fn read(&mut self, index: usize) -> Result<T> {
        self.check_index(index)?;
        if !self.pending.is_empty() {
            self.flush()?;
            self.decode()?;
        }
        Ok(T::from_wide(self.decoded[index] as i128))
    }

    /// The exact value of counter `index` as if no hierarchy were in place.
    pub fn original(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        Ok(T::from_wide(self.shadow[index]))
    }

    /// Apply the pending deltas layer by layer, marking witnesses and
    /// hashing carries upward.
    fn flush(&mut self) -> Result<()> {
        let layers = self.layers();
        let mut updates = std::mem::take(&mut self.pending);
        for layer in 0..layers {
            let mut next = CarryOver::new();
            for (&index, &delta) in &updates {
                let carry = self.counters[layer][index].add_wide(delta)?;
                if carry != 0 {
                    self.witness[layer].set(index);
                    if layer + 1 == layers {
                        return Err(MeterError::CounterOverflow {
                            carry: carry as i64,
                        });
                    }
                    for hash in &self.hash_fns[layer] {
                        let upper = hash.hash_index(index) as usize % self.no_cnt[layer + 1];
                        *next.entry(upper).or_default() += carry;
                    }
                }
            }
            updates = next;
        }
        Ok(())
    }

    /// Recover the layer-0 values from the flushed counters, top layer
    /// down, caching the result.
    fn decode(&mut self) -> Result<()> {
        let layers = self.layers();
        let mut higher: Vec<f64> = self.counters[layers - 1]
            .iter()
            .map(|c| c.value().to_f64())
            .collect();
        for layer in (0..layers - 1).rev() {
            higher = self.decode_layer(layer, &higher);
        }
        self.decoded = higher;
        Ok(())
    }

    /// Solve for the carry totals that left `layer`, then re-assemble the
    /// layer's full values from carries and residues.
    fn decode_layer(&self, layer: usize, higher: &[f64]) -> Vec<f64> {
        let rows = self.no_cnt[layer + 1];
        let cols = self.no_cnt[layer];
        debug_assert_eq!(higher.len(), rows);

        let mut triplets = Vec::new();
        for i in 0..cols {
            if !self.witness[layer].get(i) {
                continue;
            }
            for hash in &self.hash_fns[layer] {
                let row = hash.hash_index(i) as usize % rows;
                triplets.push((row, i, 1.0));
            }
        }

        let solution = if triplets.is_empty() {
            Array1::zeros(cols)
        } else {
            let matrix = SparseMatrix::from_triplets(rows, cols, triplets);
            let b = Array1::from_iter(higher.iter().copied());
            matrix.least_squares(&b)
        };

        (0..cols)
            .map(|i| {
                let carried = if self.witness[layer].get(i) {
                    let units = (solution[i] + 0.5).floor() as i128;
                    (units << self.width_cnt[layer]) as f64
                } else {
                    0.0
                };
                carried + self.counters[layer][i].value().to_f64()
            })
            .collect()
    }

    /// Steady-state footprint: counters plus witness bits, rounded up to
    /// bytes, plus the hash vectors.
    pub fn size(&self) -> usize {
        let mut bits = 0usize;
        for (&m, &w) in self.no_cnt.iter().zip(self.width_cnt.iter()) {
            bits += m * (w + 1);
        }
        let mut bytes = bits.div_ceil(8);
        for &h in &self.no_hash {
            bytes += h * std::mem::size_of::<H>();
        }
        bytes
    }

    /// Footprint of the plain counter array the hierarchy replaces.
    pub fn original_size(&self) -> usize {
        self.no_cnt[0] * std::mem::size_of::<T>()
    }

    /// Reset to the freshly-constructed state. Hash functions are kept.
    pub fn clear(&mut self) {
        for layer in &mut self.counters {
            layer.iter_mut().for_each(DynInt::reset);
        }
        for witness in &mut self.witness {
            witness.reset();
        }
        self.shadow.iter_mut().for_each(|v| *v = 0);
        self.decoded.iter_mut().for_each(|v| *v = 0.0);
        self.pending.clear();
    }
}

/// Row-major sparse matrix built from triplets, duplicates summed.
struct SparseMatrix {
    rows: usize,
    cols: usize,
    by_row: Vec<Vec<(usize, f64)>>,
}

impl SparseMatrix {
    fn from_triplets(rows: usize, cols: usize, triplets: Vec<(usize, usize, f64)>) -> Self {
        let mut summed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (r, c, v) in triplets {
            *summed.entry((r, c)).or_default() += v;
        }
        let mut by_row = vec![Vec::new(); rows];
        for ((r, c), v) in summed {
            by_row[r].push((c, v));
        }
        Self { rows, cols, by_row }
    }

    fn mul(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.rows);
        for (r, row) in self.by_row.iter().enumerate() {
            let mut acc = 0.0;
            for &(c, v) in row {
                acc += v * x[c];
            }
            out[r] = acc;
        }
        out
    }

    fn transpose_mul(&self, r: &Array1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.cols);
        for (row_index, row) in self.by_row.iter().enumerate() {
            let scale = r[row_index];
            if scale == 0.0 {
                continue;
            }
            for &(c, v) in row {
                out[c] += v * scale;
            }
        }
        out
    }

    /// Minimise `‖A·x − b‖₂` by conjugate gradient on the normal
    /// equations. Deterministic: fixed iteration cap and tolerance, no
    /// randomisation.
    fn least_squares(&self, b: &Array1<f64>) -> Array1<f64> {
        let mut x = Array1::zeros(self.cols);
        let mut residual = b.clone();
        let mut s = self.transpose_mul(&residual);
        let mut p = s.clone();
        let mut gamma = s.dot(&s);
        if gamma == 0.0 {
            return x;
        }
        let threshold = gamma * 1e-28;
        let max_iter = 4 * self.rows.max(self.cols) + 16;
        for _ in 0..max_iter {
            if gamma <= threshold {
                break;
            }
            let q = self.mul(&p);
            let qq = q.dot(&q);
            if qq == 0.0 {
                break;
            }
            let alpha = gamma / qq;
            x.scaled_add(alpha, &p);
            residual.scaled_add(-alpha, &q);
            s = self.transpose_mul(&residual);
            let gamma_next = s.dot(&s);
            let beta = gamma_next / gamma;
            p.mapv_inplace(|v| v * beta);
            p += &s;
            gamma = gamma_next;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Deterministic stand-in for the seeded hash family: consecutive
    /// instances cycle through four fixed index maps.
    #[derive(Debug)]
    struct TestHash {
        shape: u64,
    }

    thread_local! {
        static NEXT_SHAPE: Cell<u64> = const { Cell::new(0) };
    }

    fn reset_test_hashes() {
        NEXT_SHAPE.with(|c| c.set(0));
    }

    impl Default for TestHash {
        fn default() -> Self {
            let shape = NEXT_SHAPE.with(|c| {
                let v = c.get();
                c.set(v + 1);
                v
            });
            TestHash { shape }
        }
    }

    impl FlowHasher for TestHash {
        fn hash_bytes(&self, bytes: &[u8]) -> u64 {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            let cnt = u64::from_ne_bytes(raw);
            match self.shape % 4 {
                0 | 2 => cnt,
                1 => cnt + 1,
                _ => {
                    if cnt == 2 {
                        cnt
                    } else {
                        cnt + 1
                    }
                }
            }
        }
    }

    const NO_CNT: [usize; 3] = [7, 5, 3];
    const WIDTH_CNT: [usize; 3] = [10, 10, 10];
    const NO_HASH: [usize; 2] = [2, 2];

    fn test_hierarchy() -> CounterHierarchy<i32, TestHash> {
        reset_test_hashes();
        CounterHierarchy::new(&NO_CNT, &WIDTH_CNT, &NO_HASH).unwrap()
    }

    #[test]
    fn test_incremental_write_read_back() {
        let mut ch = test_hierarchy();
        let values: [i32; 7] = [3309568, 356352001, 163842, 10243, 1028, 5, 6];

        for (i, &v) in values.iter().enumerate() {
            ch.update(i, v % 10).unwrap();
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ch.read(i).unwrap(), v % 10);
        }
        for round in 0..10 {
            for (i, &v) in values.iter().enumerate() {
                ch.update(i, v / 10).unwrap();
            }
            for (i, &v) in values.iter().enumerate() {
                let expected = v % 10 + v / 10 * (round + 1);
                assert_eq!(ch.read(i).unwrap(), expected);
                assert_eq!(ch.original(i).unwrap(), expected);
            }
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ch.read(i).unwrap(), v);
            assert_eq!(ch.original(i).unwrap(), v);
        }
    }

    #[test]
    fn test_negative_updates_cancel_carries() {
        let mut ch = test_hierarchy();
        let values: [i32; 7] = [3305086, 3568800, 14322, 10243, 10238, 125, 216];

        for _ in 0..5 {
            for (i, &v) in values.iter().enumerate() {
                ch.update(i, v / 5).unwrap();
            }
        }
        for (i, &v) in values.iter().enumerate() {
            ch.update(i, v).unwrap();
        }
        for (i, &v) in values.iter().enumerate() {
            ch.update(i, -v + v % 5).unwrap();
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ch.read(i).unwrap(), v);
            assert_eq!(ch.original(i).unwrap(), v);
        }
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut ch = test_hierarchy();
        let values: [i32; 7] = [1086, 1321, 22, 10243, 10238, 1124, 1216];

        for _ in 0..5 {
            for (i, &v) in values.iter().enumerate() {
                ch.update(i, v / 5).unwrap();
            }
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ch.read(i).unwrap(), v / 5 * 5);
        }

        ch.clear();
        for i in 0..7 {
            assert_eq!(ch.read(i).unwrap(), 0);
            assert_eq!(ch.original(i).unwrap(), 0);
        }
        for (i, &v) in values.iter().enumerate() {
            ch.update(i, v).unwrap();
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ch.read(i).unwrap(), v);
        }
        for (i, &v) in values.iter().enumerate() {
            ch.update(i, -v + v % 5).unwrap();
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ch.read(i).unwrap(), v % 5);
            assert_eq!(ch.original(i).unwrap(), v % 5);
        }
    }

    #[test]
    fn test_top_layer_overflow() {
        let mut ch = test_hierarchy();
        // Saturate counters 0 and 1 right below the point where the top
        // layer overflows, then push it over.
        let values: [i32; 2] = [1048576, 357564416];
        for _ in 0..10 {
            for (i, &v) in values.iter().enumerate() {
                ch.update(i, v / 10).unwrap();
            }
        }
        for i in 0..7 {
            ch.update(i, 5).unwrap();
        }
        ch.update(0, 1).unwrap();
        assert!(ch.read(0).is_ok());

        ch.update(1, 1).unwrap();
        match ch.read(0) {
            Err(MeterError::CounterOverflow { .. }) => {}
            other => panic!("expected counter overflow, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_shape_validation() {
        reset_test_hashes();
        type Ch = CounterHierarchy<i32, TestHash>;
        assert!(Ch::new(&[], &[3], &[]).is_err());
        assert!(Ch::new(&[3, 5], &[3], &[2]).is_err());
        assert!(Ch::new(&[3, 5], &[3, 4], &[2, 3]).is_err());
        assert!(Ch::new(&[3, 5], &[30, 3], &[2]).is_err());
        assert!(Ch::new(&[100, 50, 0], &[20, 5, 5], &[2, 3]).is_err());
        assert!(Ch::new(&[100, 50, 10], &[20, 0, 5], &[2, 3]).is_err());
        assert!(Ch::new(&[100, 50, 10], &[20, 5, 5], &[0, 3]).is_err());
        assert!(Ch::new(&[100, 50, 10], &[20, 5, 5], &[2, 3]).is_ok());
    }

    #[test]
    fn test_out_of_range_index() {
        let mut ch = test_hierarchy();
        assert!(matches!(
            ch.update(7, 1),
            Err(MeterError::OutOfRange { index: 7, bound: 7 })
        ));
        assert!(ch.read(7).is_err());
        assert!(ch.original(7).is_err());
    }

    #[test]
    fn test_reads_without_updates_hit_cache() {
        let mut ch = test_hierarchy();
        ch.update(3, 42).unwrap();
        let first = ch.read(3).unwrap();
        let second = ch.read(3).unwrap();
        assert_eq!(first, 42);
        assert_eq!(first, second);
    }

    #[test]
    fn test_size_accounting() {
        let ch = test_hierarchy();
        // 7·11 + 5·11 + 3·11 = 165 bits -> 21 bytes, plus 2+2 hashes.
        let expected = 21 + 4 * std::mem::size_of::<TestHash>();
        assert_eq!(ch.size(), expected);
        assert_eq!(ch.original_size(), 7 * std::mem::size_of::<i32>());
    }

    #[test]
    fn test_shadow_matches_when_no_overflow() {
        let mut ch = test_hierarchy();
        for i in 0..7 {
            ch.update(i, (i as i32 * 37) % 1000).unwrap();
        }
        for i in 0..7 {
            assert_eq!(ch.read(i).unwrap(), ch.original(i).unwrap());
        }
    }
}
