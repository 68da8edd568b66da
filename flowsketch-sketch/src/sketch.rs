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

//! The polymorphic sketch contract
//!
//! Every sketch implements [`Sketch`] and overrides the operations it
//! supports; the measurement harness drives sketches exclusively through
//! this trait. Operations a sketch does not override report an error (once
//! per operation, to avoid log bursts) and return defaults.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use flowsketch_core::error::Result;
use flowsketch_core::flowkey::FlowKey;
use flowsketch_core::ground_truth::Estimation;
use flowsketch_core::packed::CounterInt;
use tracing::error;

/// Report an unimplemented operation, once per operation name.
fn unsupported(op: &'static str) {
    static EMITTED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    let mut emitted = EMITTED
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap();
    if emitted.insert(op) {
        error!("sketch does not implement `{op}`, returning a default");
    }
}

/// A sublinear-space approximate traffic summary.
///
/// `L` is the flow-key length in bytes, `T` the counter type. Operations
/// that can trip a counter-hierarchy flush are fallible; a
/// `CounterOverflow` aborts the enclosing read.
pub trait Sketch<const L: usize, T: CounterInt> {
    /// Steady-state footprint in bytes, vectors and hashes included.
    fn size(&self) -> usize {
        unsupported("size");
        0
    }

    /// Footprint of the plain structure this sketch compresses; equals
    /// [`Sketch::size`] for sketches that do not compress anything.
    fn original_size(&self) -> usize {
        self.size()
    }

    /// Set-membership insert.
    fn insert(&mut self, _key: &FlowKey<L>) -> Result<()> {
        unsupported("insert");
        Ok(())
    }

    /// Counter increment.
    fn update(&mut self, _key: &FlowKey<L>, _value: T) -> Result<()> {
        unsupported("update");
        Ok(())
    }

    /// Volume estimate for a flow.
    fn query(&self, _key: &FlowKey<L>) -> Result<T> {
        unsupported("query");
        Ok(T::default())
    }

    /// Membership test.
    fn lookup(&self, _key: &FlowKey<L>) -> Result<bool> {
        unsupported("lookup");
        Ok(false)
    }

    /// Flows whose estimated volume reaches `threshold`.
    fn heavy_hitters(&self, _threshold: f64) -> Result<Estimation<L, T>> {
        unsupported("heavy_hitters");
        Ok(Estimation::new())
    }

    /// Flows whose estimated volume differs from `other`'s by more than
    /// `threshold`.
    fn heavy_changers(
        &self,
        _other: &dyn Sketch<L, T>,
        _threshold: f64,
    ) -> Result<Estimation<L, T>> {
        unsupported("heavy_changers");
        Ok(Estimation::new())
    }

    /// Enumerate every `(key, volume)` pair; reversible sketches only.
    fn decode(&mut self) -> Result<Estimation<L, T>> {
        unsupported("decode");
        Ok(Estimation::new())
    }

    /// Reset to the freshly-constructed state.
    fn clear(&mut self);
}
