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

//! Per-sketch run flows
//!
//! Each `run_*` function reads one sketch's `para` / `test` / `data`
//! (and `ch`) tables out of the configuration, loads the record file,
//! builds ground truth, drives the relevant harness families and prints
//! the report. The counter type is `i64` throughout, wide enough for byte
//! counting.

use flowsketch_core::data::{CntMethod, StreamData};
use flowsketch_core::error::{MeterError, Result};
use flowsketch_core::ground_truth::{GndTruth, HxMethod};
use flowsketch_sketch::{
    BloomFilter, ChCmSketch, CmSketch, CountSketch, CountingBloomFilter, FlowRadar, HashPipe,
};

use crate::config::{parse_cnt_method, parse_data_format, parse_hx_method, Config};
use crate::tester::SketchTester;

struct Prepared<const L: usize> {
    data: StreamData<L>,
    data_file: String,
    cnt_method: CntMethod,
}

/// Load the record file named by `<root>.data`.
fn prepare<const L: usize>(config: &Config, root: &str) -> Result<Prepared<L>> {
    let data_section = config.section(&format!("{root}.data"))?;
    let data_file: String = data_section.get("data")?;
    let format = parse_data_format(&data_section)?;
    let cnt_method = parse_cnt_method(&data_section)?;
    let data = StreamData::from_file(&data_file, &format)?;
    Ok(Prepared {
        data,
        data_file,
        cnt_method,
    })
}

fn announce<const L: usize>(prepared: &Prepared<L>, truth: &GndTruth<L, i64>) {
    println!(
        "DataSet: {} records with {} keys ({})",
        prepared.data.len(),
        truth.len(),
        prepared.data_file
    );
}

/// Read `sample` from the test table and split off the insert prefix.
fn sample_cut<const L: usize>(config: &Config, root: &str, data: &StreamData<L>) -> Result<usize> {
    let sample: f64 = config.section(&format!("{root}.test"))?.get("sample")?;
    if !(sample > 0.0 && sample <= 1.0) {
        return Err(MeterError::BadArgument(format!(
            "sample rate should be in (0, 1], got {sample}"
        )));
    }
    Ok((sample * data.len() as f64) as usize)
}

/// Bloom filter: insert a sampled prefix, look up every flow.
pub fn run_bloom_filter<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let num_bits: usize = para.get("num_bits")?;
    let num_hash: usize = para.get("num_hash")?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let cut = sample_cut(config, root, &prepared.data)?;

    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    let mut sample_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), CntMethod::InPacket);
    sample_truth.build(prepared.data.range(0, cut)?, CntMethod::InPacket);
    announce(&prepared, &gnd_truth);

    let mut sketch: BloomFilter<L> = BloomFilter::new(num_bits, num_hash)?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Bloom Filter", config, format!("{root}.test"));
    tester.test_insert(&mut sketch, prepared.data.range(0, cut)?)?;
    tester.test_lookup(&sketch, &gnd_truth, &sample_truth)?;
    tester.test_size(&sketch)?;
    tester.show();
    Ok(())
}

/// Counting Bloom filter: same flow as the Bloom filter.
pub fn run_counting_bloom<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let num_cnt: usize = para.get("num_cnt")?;
    let num_hash: usize = para.get("num_hash")?;
    let cnt_length: usize = para.get("cnt_length")?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let cut = sample_cut(config, root, &prepared.data)?;

    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    let mut sample_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), CntMethod::InPacket);
    sample_truth.build(prepared.data.range(0, cut)?, CntMethod::InPacket);
    announce(&prepared, &gnd_truth);

    let mut sketch: CountingBloomFilter<L> =
        CountingBloomFilter::new(num_cnt, num_hash, cnt_length)?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Counting Bloom Filter", config, format!("{root}.test"));
    tester.test_insert(&mut sketch, prepared.data.range(0, cut)?)?;
    tester.test_lookup(&sketch, &gnd_truth, &sample_truth)?;
    tester.test_size(&sketch)?;
    tester.show();
    Ok(())
}

/// Count-Min: update the whole stream, query every flow.
pub fn run_count_min<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let depth: usize = para.get("depth")?;
    let width: usize = para.get("width")?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), prepared.cnt_method);
    announce(&prepared, &gnd_truth);

    let mut sketch: CmSketch<L, i64> = CmSketch::new(depth, width)?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Count Min", config, format!("{root}.test"));
    tester.test_update(&mut sketch, prepared.data.records(), prepared.cnt_method)?;
    tester.test_query(&sketch, &gnd_truth)?;
    tester.test_size(&sketch)?;
    tester.show();
    Ok(())
}

/// Count-Min over a counter hierarchy; reads the extra `ch` table.
pub fn run_ch_count_min<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let depth: usize = para.get("depth")?;
    let width: usize = para.get("width")?;
    let ch = config.section(&format!("{root}.ch"))?;
    let cnt_no_ratio: f64 = ch.get("cnt_no_ratio")?;
    let width_cnt: Vec<usize> = ch.get("width_cnt")?;
    let no_hash: Vec<usize> = ch.get("no_hash")?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), prepared.cnt_method);
    announce(&prepared, &gnd_truth);

    let mut sketch: ChCmSketch<L, i64> =
        ChCmSketch::new(depth, width, cnt_no_ratio, &width_cnt, &no_hash)?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Count Min with CH", config, format!("{root}.test"));
    tester.test_update(&mut sketch, prepared.data.records(), prepared.cnt_method)?;
    tester.test_query(&sketch, &gnd_truth)?;
    tester.test_size(&sketch)?;
    tester.show();
    Ok(())
}

/// Count sketch: update the whole stream, query every flow.
pub fn run_count_sketch<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let depth: usize = para.get("depth")?;
    let width: usize = para.get("width")?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), prepared.cnt_method);
    announce(&prepared, &gnd_truth);

    let mut sketch: CountSketch<L, i64> = CountSketch::new(depth, width)?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Count Sketch", config, format!("{root}.test"));
    tester.test_update(&mut sketch, prepared.data.records(), prepared.cnt_method)?;
    tester.test_query(&sketch, &gnd_truth)?;
    tester.test_size(&sketch)?;
    tester.show();
    Ok(())
}

/// Hash-Pipe: update the whole stream, extract heavy hitters.
pub fn run_hash_pipe<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let depth: usize = para.get("depth")?;
    let width: usize = para.get("width")?;
    let data_section = config.section(&format!("{root}.data"))?;
    let threshold: f64 = data_section.get("threshold_heavy_hitter")?;
    let hx_method = parse_hx_method(&data_section)?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), prepared.cnt_method);
    let mut gnd_truth_heavy_hitters: GndTruth<L, i64> = GndTruth::new();
    gnd_truth_heavy_hitters.heavy_hitters_of(&gnd_truth, threshold, hx_method)?;
    announce(&prepared, &gnd_truth);

    let mut sketch: HashPipe<L, i64> = HashPipe::new(depth, width)?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Hash Pipe", config, format!("{root}.test"));
    tester.test_update(&mut sketch, prepared.data.records(), prepared.cnt_method)?;

    // The ground truth keeps flows strictly above the percentile bar,
    // while the sketch compares with >=; align the sketch threshold.
    let sketch_threshold = match hx_method {
        HxMethod::TopK => gnd_truth_heavy_hitters
            .min()
            .map(|v| v as f64)
            .unwrap_or(0.0),
        HxMethod::Percentile => (gnd_truth.total() as f64 * threshold).floor() + 1.0,
    };
    tester.test_heavy_hitter(&sketch, sketch_threshold, &gnd_truth_heavy_hitters)?;
    tester.test_size(&sketch)?;
    tester.show();
    Ok(())
}

/// Flow-Radar: update the whole stream, decode it back.
pub fn run_flow_radar<const L: usize>(config: &Config, root: &str) -> Result<()> {
    let para = config.section(&format!("{root}.para"))?;
    let flow_filter_bit: usize = para.get("flow_filter_bit")?;
    let flow_filter_hash: usize = para.get("flow_filter_hash")?;
    let count_table_num: usize = para.get("count_table_num")?;
    let count_table_hash: usize = para.get("count_table_hash")?;

    let prepared: Prepared<L> = prepare(config, root)?;
    let mut gnd_truth: GndTruth<L, i64> = GndTruth::new();
    gnd_truth.build(prepared.data.records(), prepared.cnt_method);
    announce(&prepared, &gnd_truth);

    let mut sketch: FlowRadar<L, i64> = FlowRadar::new(
        flow_filter_bit,
        flow_filter_hash,
        count_table_num,
        count_table_hash,
    )?;
    let mut tester: SketchTester<L, i64> =
        SketchTester::new("Flow Radar", config, format!("{root}.test"));
    tester.test_size(&sketch)?;
    tester.test_update(&mut sketch, prepared.data.records(), prepared.cnt_method)?;
    tester.test_decode(&mut sketch, &gnd_truth)?;
    tester.show();
    Ok(())
}
