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

//! FlowSketch sketches
//!
//! The polymorphic [`Sketch`] contract and the concrete traffic
//! summaries:
//!
//! - [`BloomFilter`]: set membership
//! - [`CountingBloomFilter`]: membership with deletion, counter-backed
//! - [`CmSketch`]: per-flow volume, never underestimates
//! - [`ChCmSketch`]: Count-Min over a counter hierarchy
//! - [`CountSketch`]: per-flow volume, median-of-signed-rows
//! - [`HashPipe`]: heavy hitters in a pipelined slot array
//! - [`FlowRadar`]: reversible; decodes every flow back out

pub mod bloom;
pub mod ch_count_min;
pub mod count_min;
pub mod count_sketch;
pub mod counting_bloom;
pub mod flow_radar;
pub mod hash_pipe;
pub mod sketch;

pub use bloom::BloomFilter;
pub use ch_count_min::ChCmSketch;
pub use count_min::CmSketch;
pub use count_sketch::CountSketch;
pub use counting_bloom::CountingBloomFilter;
pub use flow_radar::FlowRadar;
pub use hash_pipe::HashPipe;
pub use sketch::Sketch;
