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

//! FlowSketch tools
//!
//! The pieces around the sketches: the TOML configuration layer
//! (`config`), metric sets (`metrics`), the measurement harness
//! (`tester`) and the per-sketch run flows (`runner`) the `flowsketch`
//! binary dispatches into.

pub mod config;
pub mod metrics;
pub mod runner;
pub mod synth;
pub mod tester;

pub use config::Config;
pub use metrics::{Metric, MetricTable, MetricValue, MetricVec};
pub use tester::SketchTester;
