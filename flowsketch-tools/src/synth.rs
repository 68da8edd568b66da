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

//! Synthetic traffic generation
//!
//! Produces record files with realistic hot/cold flow skew for exercising
//! the sketches without a capture file at hand. Flow popularity follows a
//! Zipfian distribution (rejection-inversion sampling, the YCSB approach),
//! packet lengths are drawn uniformly from a configurable band, and
//! timestamps advance monotonically.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use flowsketch_core::data::{DataFormat, Record};
use flowsketch_core::error::{MeterError, Result};
use flowsketch_core::flowkey::FlowKey;

/// Standard Zipf skew (the YCSB default).
pub const DEFAULT_ZIPF_THETA: f64 = 0.99;

/// Zipfian distribution generator over `[0, n)`.
///
/// `P(rank = k) ∝ 1 / k^θ`; sampling is O(1) after an O(n) set-up.
pub struct ZipfianGenerator {
    n: usize,
    theta: f64,
    zeta_n: f64,
    alpha: f64,
    eta: f64,
}

impl ZipfianGenerator {
    /// A generator for `n` items with skew `theta ∈ (0, 1)`.
    pub fn new(n: usize, theta: f64) -> Result<Self> {
        if n == 0 {
            return Err(MeterError::BadArgument(
                "zipfian generator needs at least one item".into(),
            ));
        }
        if !(0.0..1.0).contains(&theta) || theta == 0.0 {
            return Err(MeterError::BadArgument(format!(
                "zipf theta should be in (0, 1), got {theta}"
            )));
        }
        let zeta_2 = Self::zeta(2, theta);
        let zeta_n = Self::zeta(n, theta);
        let alpha = 1.0 / (1.0 - theta);
        let eta = (1.0 - (2.0 / n as f64).powf(1.0 - theta)) / (1.0 - zeta_2 / zeta_n);
        Ok(Self {
            n,
            theta,
            zeta_n,
            alpha,
            eta,
        })
    }

    /// `zeta(n, θ) = Σ_{i=1..n} 1 / i^θ`.
    fn zeta(n: usize, theta: f64) -> f64 {
        (1..=n).map(|i| 1.0 / (i as f64).powf(theta)).sum()
    }

    /// The next rank in `[0, n)`.
    pub fn next<R: Rng>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        let uz = u * self.zeta_n;
        if uz < 1.0 {
            return 0;
        }
        if uz < 1.0 + 0.5f64.powf(self.theta) {
            return 1;
        }
        let rank = (self.n as f64 * (self.eta * u - self.eta + 1.0).powf(self.alpha)) as usize;
        rank.min(self.n - 1)
    }
}

/// Parameters of a synthetic stream.
#[derive(Clone, Debug)]
pub struct SynthConfig {
    /// Number of records to emit.
    pub records: usize,
    /// Number of distinct flows to draw from.
    pub flows: usize,
    /// Zipf skew of flow popularity.
    pub zipf_theta: f64,
    /// Inclusive packet-length band in bytes.
    pub length_range: (i64, i64),
    /// RNG seed, for reproducible files.
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            records: 100_000,
            flows: 1_000,
            zipf_theta: DEFAULT_ZIPF_THETA,
            length_range: (64, 1500),
            seed: 42,
        }
    }
}

/// A deterministic flow key for a rank, spread over the 5-tuple space.
fn synth_key<const L: usize>(rank: usize) -> Result<FlowKey<L>> {
    let src = (rank as u32).wrapping_mul(0x9e3779b9);
    let dst = (rank as u32).wrapping_mul(0x85ebca6b) ^ 0xffff_0000;
    match L {
        4 => FlowKey::from_ip(src),
        8 => FlowKey::from_ip_pair(src, dst),
        13 => FlowKey::from_five_tuple(src, dst, (rank as u16) | 1024, 443, 6),
        _ => Err(MeterError::BadArgument(format!(
            "no tuple shape for key length {L}"
        ))),
    }
}

/// Generate a Zipfian record stream in memory.
pub fn generate<const L: usize>(config: &SynthConfig) -> Result<Vec<Record<L>>> {
    let zipf = ZipfianGenerator::new(config.flows, config.zipf_theta)?;
    let (lo, hi) = config.length_range;
    if lo <= 0 || hi < lo {
        return Err(MeterError::BadArgument(format!(
            "length range should satisfy 0 < lo <= hi, got ({lo}, {hi})"
        )));
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut timestamp = 0i64;
    let mut records = Vec::with_capacity(config.records);
    for _ in 0..config.records {
        let rank = zipf.next(&mut rng);
        // Inter-arrival gaps of 1..20 microseconds.
        timestamp += rng.gen_range(1..20);
        records.push(Record {
            flowkey: synth_key::<L>(rank)?,
            timestamp,
            length: rng.gen_range(lo..=hi),
        });
    }
    Ok(records)
}

/// Generate a stream and write it to `path` in the given layout.
pub fn generate_file<const L: usize>(
    path: impl AsRef<Path>,
    format: &DataFormat,
    config: &SynthConfig,
) -> Result<usize> {
    let records = generate::<L>(config)?;
    let mut writer = BufWriter::new(File::create(path)?);
    let mut buf = vec![0u8; format.record_len()];
    for record in &records {
        format.write_record(record, &mut buf)?;
        writer.write_all(&buf)?;
    }
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use flowsketch_core::data::{CntMethod, StreamData};
    use flowsketch_core::ground_truth::GndTruth;

    #[test]
    fn test_zipfian_is_skewed() {
        let zipf = ZipfianGenerator::new(1000, 0.99).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for _ in 0..10_000 {
            *counts.entry(zipf.next(&mut rng)).or_default() += 1;
        }
        let head: usize = (0..10).filter_map(|i| counts.get(&i)).sum();
        let total: usize = counts.values().sum();
        assert!(
            head as f64 / total as f64 > 0.4,
            "zipfian head too light: {head}/{total}"
        );
    }

    #[test]
    fn test_zipfian_validation() {
        assert!(ZipfianGenerator::new(0, 0.99).is_err());
        assert!(ZipfianGenerator::new(10, 0.0).is_err());
        assert!(ZipfianGenerator::new(10, 1.0).is_err());
        assert!(ZipfianGenerator::new(10, 0.5).is_ok());
    }

    #[test]
    fn test_generate_is_reproducible() {
        let config = SynthConfig {
            records: 500,
            flows: 50,
            ..Default::default()
        };
        let a = generate::<13>(&config).unwrap();
        let b = generate::<13>(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 500);

        let other = SynthConfig {
            seed: 43,
            ..config
        };
        assert_ne!(generate::<13>(&other).unwrap(), a);
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let config = SynthConfig {
            records: 200,
            flows: 20,
            ..Default::default()
        };
        let records = generate::<4>(&config).unwrap();
        assert!(records.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(records
            .iter()
            .all(|r| (64..=1500).contains(&r.length)));
    }

    #[test]
    fn test_generated_file_round_trips() {
        let config = SynthConfig {
            records: 300,
            flows: 30,
            ..Default::default()
        };
        let format = DataFormat::from_fields([
            ("flowkey", 13usize),
            ("length", 2),
            ("padding", 1),
            ("timestamp", 8),
        ])
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.bin");
        let written = generate_file::<13>(&path, &format, &config).unwrap();
        assert_eq!(written, 300);

        let data: StreamData<13> = StreamData::from_file(&path, &format).unwrap();
        assert_eq!(data.len(), 300);
        let mut truth: GndTruth<13, i64> = GndTruth::new();
        truth.build(data.records(), CntMethod::InPacket);
        assert_eq!(truth.total(), 300);
        assert!(truth.len() <= 30);
    }
}
