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

//! Metric sets and collected values
//!
//! A test term in the configuration names the metrics it wants:
//!
//! ```toml
//! [CM.test]
//! query = ["RATE", "ARE", "PODF", "DIST"]
//! query_podf = 0.1
//! query_dist = [0.05, 0.1, 0.5, 1.0]
//! ```
//!
//! `PODF` needs the ancillary `<term>_podf` threshold; `DIST` needs the
//! `<term>_dist` quantile vector, which is sorted, deduplicated and
//! implicitly terminated by `+∞`.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use tracing::error;

use flowsketch_core::error::{MeterError, Result};

use crate::config::Section;

/// The metrics a test can request.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Metric {
    /// Size in bytes.
    Size,
    /// Wall time in microseconds.
    Time,
    /// Processing rate in packets per second.
    Rate,
    /// Average relative error.
    Are,
    /// Average absolute error.
    Aae,
    /// Fraction of exactly-correct answers.
    Acc,
    /// True positive fraction.
    Tp,
    /// False positive fraction.
    Fp,
    /// True negative fraction.
    Tn,
    /// False negative fraction.
    Fn,
    /// Precision.
    Prc,
    /// Recall.
    Rcl,
    /// Harmonic mean of precision and recall.
    F1,
    /// Empirical error distribution over quantiles.
    Dist,
    /// Portion of desired flows: relative error within a tolerance.
    Podf,
    /// Sketch size over the size of the plain structure it replaces.
    Ratio,
}

impl FromStr for Metric {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "SIZE" => Metric::Size,
            "TIME" => Metric::Time,
            "RATE" => Metric::Rate,
            "ARE" => Metric::Are,
            "AAE" => Metric::Aae,
            "ACC" => Metric::Acc,
            "TP" => Metric::Tp,
            "FP" => Metric::Fp,
            "TN" => Metric::Tn,
            "FN" => Metric::Fn,
            "PRC" => Metric::Prc,
            "RCL" => Metric::Rcl,
            "F1" => Metric::F1,
            "DIST" => Metric::Dist,
            "PODF" => Metric::Podf,
            "RATIO" => Metric::Ratio,
            other => {
                return Err(MeterError::BadConfig(format!("unknown metric {other:?}")));
            }
        })
    }
}

/// The metrics requested for one test term, with their ancillary
/// parameters.
#[derive(Clone, Debug, Default)]
pub struct MetricVec {
    set: BTreeSet<Metric>,
    /// Relative-error tolerance for `PODF`.
    pub podf: f64,
    /// Ascending, deduplicated quantiles for `DIST`, ending in `+∞`.
    pub quantiles: Vec<f64>,
}

impl MetricVec {
    /// Read the metric list named `term` from a test section. A missing
    /// term yields an empty vector (the test records nothing).
    pub fn from_section(test: &Section<'_>, term: &str) -> Result<Self> {
        let mut vec = MetricVec::default();
        let Some(names) = test.get_opt::<Vec<String>>(term)? else {
            return Ok(vec);
        };
        for name in &names {
            vec.set.insert(name.parse()?);
        }

        if vec.set.contains(&Metric::Dist) {
            match test.get_opt::<Vec<f64>>(&format!("{term}_dist"))? {
                Some(mut quantiles) if !quantiles.is_empty() => {
                    quantiles.sort_by(|a, b| a.partial_cmp(b).unwrap());
                    quantiles.dedup();
                    if *quantiles.last().unwrap() != f64::INFINITY {
                        quantiles.push(f64::INFINITY);
                    }
                    vec.quantiles = quantiles;
                }
                _ => {
                    error!("bad quantiles for distribution in test {term}");
                    vec.set.remove(&Metric::Dist);
                }
            }
        }
        if vec.set.contains(&Metric::Podf) {
            match test.get_opt::<f64>(&format!("{term}_podf"))? {
                Some(podf) => vec.podf = podf,
                None => {
                    error!("bad threshold for PODF in test {term}");
                    vec.set.remove(&Metric::Podf);
                }
            }
        }
        Ok(vec)
    }

    /// Whether `metric` was requested.
    pub fn has(&self, metric: Metric) -> bool {
        self.set.contains(&metric)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// A collected metric value.
#[derive(Clone, Debug)]
pub enum MetricValue {
    /// A size in bytes.
    Bytes(usize),
    /// A duration in microseconds.
    Micros(i64),
    /// A rate in packets per second.
    PacketRate(f64),
    /// A dimensionless number.
    Scalar(f64),
    /// A fraction reported as a percentage.
    Fraction(f64),
    /// Tolerance and the fraction of flows within it.
    Podf { threshold: f64, fraction: f64 },
    /// Quantiles and the fraction of flows at or below each.
    Dist {
        quantiles: Vec<f64>,
        fractions: Vec<f64>,
    },
}

/// The values one test family collected.
#[derive(Clone, Debug, Default)]
pub struct MetricTable {
    values: BTreeMap<Metric, MetricValue>,
}

impl MetricTable {
    pub fn set(&mut self, metric: Metric, value: MetricValue) {
        self.values.insert(metric, value);
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.values.get(&metric)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &MetricValue)> {
        self.values.iter().map(|(m, v)| (*m, v))
    }
}
