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

//! Error types shared across the workspace

use thiserror::Error;

/// Failure kinds of the measurement library.
///
/// Repeat invocation of a once-only ground-truth construction is *not* an
/// error: it is reported as a warning and the instance is left unchanged.
#[derive(Error, Debug)]
pub enum MeterError {
    /// Malformed configuration, missing required key or type mismatch.
    #[error("bad config: {0}")]
    BadConfig(String),

    /// Garbled record file or a key length that contradicts the declared
    /// format.
    #[error("bad data: {0}")]
    BadData(String),

    /// An argument outside its legal range.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Bounds violation on flow-key ranges or counter-hierarchy indices.
    #[error("index {index} out of range, limit {bound}")]
    OutOfRange { index: usize, bound: usize },

    /// A carry propagated past the top layer of a counter hierarchy.
    #[error("counter overflow past the top layer, carry {carry}")]
    CounterOverflow { carry: i64 },

    /// Construction-time shape violation.
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MeterError>;
