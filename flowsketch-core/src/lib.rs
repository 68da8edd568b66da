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

//! FlowSketch core
//!
//! Primitives for measuring high-rate packet streams:
//!
//! - **Flow keys** (`flowkey`): fixed-length byte identifiers for 1-, 2-
//!   and 5-tuple flows.
//! - **Hash family** (`hash`): the keyed 64-bit hash every structure
//!   indexes with, plus the per-process seed sequence and its test hook.
//! - **Packed counters and bit arrays** (`packed`, `bitarray`): the
//!   fixed-width counter with carry-returning addition and the dense
//!   bitset.
//! - **Counter hierarchy** (`hierarchy`): the multi-layer
//!   overflow-propagating counter bank with sparse least-squares
//!   recovery.
//! - **Records** (`data`): the declarative record layout and the binary
//!   stream container.
//! - **Ground truth** (`ground_truth`): exact per-flow aggregates,
//!   heavy-hitter / heavy-changer extraction, and the estimation
//!   container sketches report with.
//!
//! The core is single-threaded: callers parallelise by sharding, not by
//! contention.

pub mod bitarray;
pub mod data;
pub mod error;
pub mod flowkey;
pub mod ground_truth;
pub mod hash;
pub mod hierarchy;
pub mod packed;
pub mod util;

pub use error::{MeterError, Result};
pub use flowkey::FlowKey;
