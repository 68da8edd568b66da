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

//! FlowSketch driver
//!
//! ```bash
//! # Drive the Count-Min sketch configured under [CM] in sketches.toml
//! flowsketch -c sketches.toml count-min
//!
//! # Same, but read the [MyCM] table instead of the default [CM]
//! flowsketch -c sketches.toml count-min --table MyCM
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use flowsketch_tools::config::{parse_data_format, Config};
use flowsketch_tools::runner;

/// Drive a sketch through the measurement harness.
#[derive(Parser)]
#[command(name = "flowsketch")]
#[command(about = "Measure traffic sketches against ground truth")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Raise verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Which sketch to drive
    #[arg(value_enum)]
    sketch: SketchKind,

    /// Configuration table to read; defaults to the sketch's canonical
    /// table name
    #[arg(short, long)]
    table: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SketchKind {
    BloomFilter,
    CountingBloom,
    CountMin,
    ChCountMin,
    CountSketch,
    HashPipe,
    FlowRadar,
}

impl SketchKind {
    fn default_table(self) -> &'static str {
        match self {
            SketchKind::BloomFilter => "BF",
            SketchKind::CountingBloom => "CBF",
            SketchKind::CountMin => "CM",
            SketchKind::ChCountMin => "CHCM",
            SketchKind::CountSketch => "CS",
            SketchKind::HashPipe => "HP",
            SketchKind::FlowRadar => "FR",
        }
    }
}

fn run<const L: usize>(kind: SketchKind, config: &Config, root: &str) -> anyhow::Result<()> {
    match kind {
        SketchKind::BloomFilter => runner::run_bloom_filter::<L>(config, root)?,
        SketchKind::CountingBloom => runner::run_counting_bloom::<L>(config, root)?,
        SketchKind::CountMin => runner::run_count_min::<L>(config, root)?,
        SketchKind::ChCountMin => runner::run_ch_count_min::<L>(config, root)?,
        SketchKind::CountSketch => runner::run_count_sketch::<L>(config, root)?,
        SketchKind::HashPipe => runner::run_hash_pipe::<L>(config, root)?,
        SketchKind::FlowRadar => runner::run_flow_radar::<L>(config, root)?,
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let root = cli
        .table
        .unwrap_or_else(|| cli.sketch.default_table().to_string());

    // The record key length in the config picks the monomorphisation.
    let data_section = config.section(&format!("{root}.data"))?;
    let format = parse_data_format(&data_section)?;
    match format.key_len() {
        4 => run::<4>(cli.sketch, &config, &root),
        8 => run::<8>(cli.sketch, &config, &root),
        13 => run::<13>(cli.sketch, &config, &root),
        other => bail!("unsupported flow key length {other}"),
    }
}
