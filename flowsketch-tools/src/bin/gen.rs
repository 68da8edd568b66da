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

//! Synthetic record-file generator
//!
//! ```bash
//! # 1M records over 10k flows with YCSB-default skew, 13-byte keys
//! flowsketch-gen -o records.bin --records 1000000 --flows 10000
//! ```
//!
//! The emitted layout is `flowkey, length(2), padding(1), timestamp(8)`,
//! matching the format strings in `demos/sketches.toml`.

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use flowsketch_core::data::DataFormat;
use flowsketch_tools::synth::{generate_file, SynthConfig, DEFAULT_ZIPF_THETA};

/// Generate a synthetic record file with Zipfian flow popularity.
#[derive(Parser)]
#[command(name = "flowsketch-gen")]
#[command(version)]
struct Cli {
    /// Output record file
    #[arg(short, long)]
    output: PathBuf,

    /// Number of records to emit
    #[arg(long, default_value_t = 100_000)]
    records: usize,

    /// Number of distinct flows
    #[arg(long, default_value_t = 1_000)]
    flows: usize,

    /// Flow key length in bytes (4, 8 or 13)
    #[arg(short, long, default_value_t = 13)]
    key_len: usize,

    /// Zipf skew of flow popularity, in (0, 1)
    #[arg(long, default_value_t = DEFAULT_ZIPF_THETA)]
    zipf: f64,

    /// Smallest packet length in bytes
    #[arg(long, default_value_t = 64)]
    min_len: i64,

    /// Largest packet length in bytes
    #[arg(long, default_value_t = 1500)]
    max_len: i64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.max_len > 0xffff {
        bail!("max length {} does not fit the 2-byte length field", cli.max_len);
    }
    let config = SynthConfig {
        records: cli.records,
        flows: cli.flows,
        zipf_theta: cli.zipf,
        length_range: (cli.min_len, cli.max_len),
        seed: cli.seed,
    };
    let format = DataFormat::from_fields([
        ("flowkey", cli.key_len),
        ("length", 2),
        ("padding", 1),
        ("timestamp", 8),
    ])?;

    let written = match cli.key_len {
        4 => generate_file::<4>(&cli.output, &format, &config)?,
        8 => generate_file::<8>(&cli.output, &format, &config)?,
        13 => generate_file::<13>(&cli.output, &format, &config)?,
        other => bail!("unsupported flow key length {other}"),
    };
    println!(
        "wrote {written} records ({} bytes) to {}",
        written * format.record_len(),
        cli.output.display()
    );
    Ok(())
}
