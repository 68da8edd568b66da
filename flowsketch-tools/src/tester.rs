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

//! Measurement harness
//!
//! [`SketchTester`] drives a sketch through one test family per call
//! (`size`, `insert`, `lookup`, `update`, `query`, `heavy_hitter`,
//! `heavy_changer`, `decode`), timing each individual operation on a
//! monotonic clock at microsecond resolution, scoring the answers against
//! ground truth, and keeping whichever metrics the configuration asked
//! for. [`SketchTester::show`] renders everything collected as a
//! fixed-width table with unit auto-scaling.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use flowsketch_core::data::{CntMethod, Record};
use flowsketch_core::error::Result;
use flowsketch_core::ground_truth::GndTruth;
use flowsketch_core::packed::CounterInt;
use flowsketch_sketch::Sketch;

use crate::config::Config;
use crate::metrics::{Metric, MetricTable, MetricValue, MetricVec};

pub struct SketchTester<'a, const L: usize, T> {
    show_name: String,
    config: &'a Config,
    test_path: String,
    size: MetricTable,
    insert: MetricTable,
    lookup: MetricTable,
    update: MetricTable,
    query: MetricTable,
    heavy_hitter: MetricTable,
    heavy_changer: MetricTable,
    decode: MetricTable,
    _counter: PhantomData<T>,
}

fn micros(elapsed: Duration) -> i64 {
    elapsed.as_micros() as i64
}

fn rate(count: usize, elapsed: Duration) -> f64 {
    count as f64 / micros(elapsed).max(1) as f64 * 1e6
}

fn precision_recall(tp: f64, fp: f64, fn_: f64) -> (f64, f64, f64) {
    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

impl<'a, const L: usize, T: CounterInt> SketchTester<'a, L, T> {
    /// `show_name` heads the report; `test_path` is the dotted path of the
    /// table holding the metric lists (e.g. `"CM.test"`).
    pub fn new(show_name: impl Into<String>, config: &'a Config, test_path: impl Into<String>) -> Self {
        Self {
            show_name: show_name.into(),
            config,
            test_path: test_path.into(),
            size: MetricTable::default(),
            insert: MetricTable::default(),
            lookup: MetricTable::default(),
            update: MetricTable::default(),
            query: MetricTable::default(),
            heavy_hitter: MetricTable::default(),
            heavy_changer: MetricTable::default(),
            decode: MetricTable::default(),
            _counter: PhantomData,
        }
    }

    fn metric_vec(&self, term: &str) -> Result<MetricVec> {
        MetricVec::from_section(&self.config.section(&self.test_path)?, term)
    }

    /// Record the sketch's footprint, and its compression ratio where
    /// requested.
    pub fn test_size(&mut self, sketch: &dyn Sketch<L, T>) -> Result<()> {
        let metrics = self.metric_vec("size")?;
        if metrics.has(Metric::Size) {
            self.size.set(Metric::Size, MetricValue::Bytes(sketch.size()));
        }
        if metrics.has(Metric::Ratio) {
            let original = sketch.original_size().max(1);
            self.size.set(
                Metric::Ratio,
                MetricValue::Scalar(sketch.size() as f64 / original as f64),
            );
        }
        Ok(())
    }

    /// Insert every record of the range, timing each insert.
    pub fn test_insert(
        &mut self,
        sketch: &mut dyn Sketch<L, T>,
        records: &[Record<L>],
    ) -> Result<()> {
        let metrics = self.metric_vec("insert")?;
        let mut elapsed = Duration::ZERO;
        for record in records {
            let tick = Instant::now();
            sketch.insert(&record.flowkey)?;
            elapsed += tick.elapsed();
        }
        if metrics.has(Metric::Rate) {
            self.insert
                .set(Metric::Rate, MetricValue::PacketRate(rate(records.len(), elapsed)));
        }
        if metrics.has(Metric::Time) {
            self.insert
                .set(Metric::Time, MetricValue::Micros(micros(elapsed)));
        }
        Ok(())
    }

    /// Update the sketch with every record of the range, timing each
    /// update.
    pub fn test_update(
        &mut self,
        sketch: &mut dyn Sketch<L, T>,
        records: &[Record<L>],
        cnt_method: CntMethod,
    ) -> Result<()> {
        let metrics = self.metric_vec("update")?;
        let mut elapsed = Duration::ZERO;
        for record in records {
            let delta = match cnt_method {
                CntMethod::InLength => T::from_wide(record.length as i128),
                CntMethod::InPacket => T::from_wide(1),
            };
            let tick = Instant::now();
            sketch.update(&record.flowkey, delta)?;
            elapsed += tick.elapsed();
        }
        if metrics.has(Metric::Rate) {
            self.update
                .set(Metric::Rate, MetricValue::PacketRate(rate(records.len(), elapsed)));
        }
        if metrics.has(Metric::Time) {
            self.update
                .set(Metric::Time, MetricValue::Micros(micros(elapsed)));
        }
        Ok(())
    }

    /// Query every flow of the ground truth and score the estimates.
    pub fn test_query(
        &mut self,
        sketch: &dyn Sketch<L, T>,
        gnd_truth: &GndTruth<L, T>,
    ) -> Result<()> {
        let metrics = self.metric_vec("query")?;
        let measure_dist = metrics.has(Metric::Dist);

        let mut elapsed = Duration::ZERO;
        let mut are = 0.0;
        let mut aae = 0.0;
        let mut correct = 0.0;
        let mut podf_cnt = 0.0;
        let mut dist = vec![0.0; metrics.quantiles.len()];

        for (key, truth) in gnd_truth.iter() {
            let tick = Instant::now();
            let estimate = sketch.query(key)?;
            elapsed += tick.elapsed();

            let absolute = (truth.to_wide() - estimate.to_wide()).abs() as f64;
            let relative = absolute / truth.to_f64();
            if relative <= metrics.podf {
                podf_cnt += 1.0;
            }
            are += relative;
            aae += absolute;
            if estimate == truth {
                correct += 1.0;
            }
            if measure_dist {
                let slot = metrics.quantiles.partition_point(|&q| q < relative);
                dist[slot] += 1.0;
            }
        }

        let flows = gnd_truth.len().max(1) as f64;
        if metrics.has(Metric::Rate) {
            self.query
                .set(Metric::Rate, MetricValue::PacketRate(rate(gnd_truth.len(), elapsed)));
        }
        if metrics.has(Metric::Are) {
            self.query.set(Metric::Are, MetricValue::Scalar(are / flows));
        }
        if metrics.has(Metric::Aae) {
            self.query.set(Metric::Aae, MetricValue::Scalar(aae / flows));
        }
        if metrics.has(Metric::Acc) {
            self.query
                .set(Metric::Acc, MetricValue::Fraction(correct / flows));
        }
        if metrics.has(Metric::Podf) {
            self.query.set(
                Metric::Podf,
                MetricValue::Podf {
                    threshold: metrics.podf,
                    fraction: podf_cnt / flows,
                },
            );
        }
        if measure_dist {
            for value in &mut dist {
                *value /= flows;
            }
            self.query.set(
                Metric::Dist,
                MetricValue::Dist {
                    quantiles: metrics.quantiles.clone(),
                    fractions: dist,
                },
            );
        }
        Ok(())
    }

    /// Look up every flow of the ground truth; positives are scored
    /// against the sampled subset that was actually inserted.
    pub fn test_lookup(
        &mut self,
        sketch: &dyn Sketch<L, T>,
        gnd_truth: &GndTruth<L, T>,
        sample: &GndTruth<L, T>,
    ) -> Result<()> {
        let metrics = self.metric_vec("lookup")?;

        let mut elapsed = Duration::ZERO;
        let (mut tp, mut fp, mut tn, mut fn_) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for (key, _) in gnd_truth.iter() {
            let tick = Instant::now();
            let found = sketch.lookup(key)?;
            elapsed += tick.elapsed();
            match (found, sample.contains(key)) {
                (true, true) => tp += 1.0,
                (true, false) => fp += 1.0,
                (false, false) => tn += 1.0,
                (false, true) => fn_ += 1.0,
            }
        }

        let flows = gnd_truth.len().max(1) as f64;
        let (precision, recall, f1) = precision_recall(tp, fp, fn_);
        if metrics.has(Metric::Rate) {
            self.lookup
                .set(Metric::Rate, MetricValue::PacketRate(rate(gnd_truth.len(), elapsed)));
        }
        if metrics.has(Metric::Tp) {
            self.lookup.set(Metric::Tp, MetricValue::Fraction(tp / flows));
        }
        if metrics.has(Metric::Fp) {
            self.lookup.set(Metric::Fp, MetricValue::Fraction(fp / flows));
        }
        if metrics.has(Metric::Tn) {
            self.lookup.set(Metric::Tn, MetricValue::Fraction(tn / flows));
        }
        if metrics.has(Metric::Fn) {
            self.lookup
                .set(Metric::Fn, MetricValue::Fraction(fn_ / flows));
        }
        if metrics.has(Metric::Acc) {
            self.lookup
                .set(Metric::Acc, MetricValue::Fraction((tp + tn) / flows));
        }
        if metrics.has(Metric::Prc) {
            self.lookup.set(Metric::Prc, MetricValue::Fraction(precision));
        }
        if metrics.has(Metric::Rcl) {
            self.lookup.set(Metric::Rcl, MetricValue::Fraction(recall));
        }
        if metrics.has(Metric::F1) {
            self.lookup.set(Metric::F1, MetricValue::Scalar(f1));
        }
        Ok(())
    }

    /// Ask the sketch for its heavy hitters and score them against the
    /// ground-truth heavy hitters.
    pub fn test_heavy_hitter(
        &mut self,
        sketch: &dyn Sketch<L, T>,
        threshold: f64,
        gnd_truth_heavy_hitters: &GndTruth<L, T>,
    ) -> Result<()> {
        let metrics = self.metric_vec("heavyhitter")?;

        let tick = Instant::now();
        let detected = sketch.heavy_hitters(threshold)?;
        let elapsed = tick.elapsed();

        let (mut tp, mut fn_, mut are) = (0.0f64, 0.0f64, 0.0f64);
        for (key, truth) in gnd_truth_heavy_hitters.iter() {
            match detected.get(key) {
                Some(estimate) => {
                    tp += 1.0;
                    are += (estimate.to_wide() - truth.to_wide()).abs() as f64 / truth.to_f64();
                }
                None => fn_ += 1.0,
            }
        }
        let fp = detected.len() as f64 - tp;
        let (precision, recall, f1) = precision_recall(tp, fp, fn_);

        let table = &mut self.heavy_hitter;
        if metrics.has(Metric::Time) {
            table.set(Metric::Time, MetricValue::Micros(micros(elapsed)));
        }
        if metrics.has(Metric::Are) {
            table.set(Metric::Are, MetricValue::Scalar(are / tp.max(1.0)));
        }
        if metrics.has(Metric::Prc) {
            table.set(Metric::Prc, MetricValue::Fraction(precision));
        }
        if metrics.has(Metric::Rcl) {
            table.set(Metric::Rcl, MetricValue::Fraction(recall));
        }
        if metrics.has(Metric::F1) {
            table.set(Metric::F1, MetricValue::Scalar(f1));
        }
        Ok(())
    }

    /// Ask the first sketch for the heavy changers against the second and
    /// score them against the ground-truth heavy changers.
    pub fn test_heavy_changer(
        &mut self,
        first: &dyn Sketch<L, T>,
        second: &dyn Sketch<L, T>,
        threshold: f64,
        gnd_truth_heavy_changers: &GndTruth<L, T>,
    ) -> Result<()> {
        let metrics = self.metric_vec("heavychanger")?;

        let tick = Instant::now();
        let detected = first.heavy_changers(second, threshold)?;
        let elapsed = tick.elapsed();

        let (mut tp, mut fn_, mut are) = (0.0f64, 0.0f64, 0.0f64);
        for (key, truth) in gnd_truth_heavy_changers.iter() {
            match detected.get(key) {
                Some(estimate) => {
                    tp += 1.0;
                    are += (estimate.to_wide() - truth.to_wide()).abs() as f64 / truth.to_f64();
                }
                None => fn_ += 1.0,
            }
        }
        let fp = detected.len() as f64 - tp;
        let (precision, recall, f1) = precision_recall(tp, fp, fn_);

        let table = &mut self.heavy_changer;
        if metrics.has(Metric::Time) {
            table.set(Metric::Time, MetricValue::Micros(micros(elapsed)));
        }
        if metrics.has(Metric::Are) {
            table.set(Metric::Are, MetricValue::Scalar(are / tp.max(1.0)));
        }
        if metrics.has(Metric::Prc) {
            table.set(Metric::Prc, MetricValue::Fraction(precision));
        }
        if metrics.has(Metric::Rcl) {
            table.set(Metric::Rcl, MetricValue::Fraction(recall));
        }
        if metrics.has(Metric::F1) {
            table.set(Metric::F1, MetricValue::Scalar(f1));
        }
        Ok(())
    }

    /// Decode the sketch and score the enumerated flows against ground
    /// truth.
    pub fn test_decode(
        &mut self,
        sketch: &mut dyn Sketch<L, T>,
        gnd_truth: &GndTruth<L, T>,
    ) -> Result<()> {
        let metrics = self.metric_vec("decode")?;

        let tick = Instant::now();
        let decoded = sketch.decode()?;
        let elapsed = tick.elapsed();

        let (mut tp, mut fn_) = (0.0f64, 0.0f64);
        let (mut are, mut aae, mut correct) = (0.0f64, 0.0f64, 0.0f64);
        for (key, truth) in gnd_truth.iter() {
            match decoded.get(key) {
                Some(estimate) => {
                    tp += 1.0;
                    let absolute = (estimate.to_wide() - truth.to_wide()).abs() as f64;
                    are += absolute / truth.to_f64();
                    aae += absolute;
                    if estimate == truth {
                        correct += 1.0;
                    }
                }
                None => fn_ += 1.0,
            }
        }
        let fp = decoded.len() as f64 - tp;
        let (precision, recall, f1) = precision_recall(tp, fp, fn_);
        let flows = gnd_truth.len().max(1) as f64;

        let table = &mut self.decode;
        if metrics.has(Metric::Time) {
            table.set(Metric::Time, MetricValue::Micros(micros(elapsed)));
        }
        if metrics.has(Metric::Are) {
            table.set(Metric::Are, MetricValue::Scalar(are / tp.max(1.0)));
        }
        if metrics.has(Metric::Aae) {
            table.set(Metric::Aae, MetricValue::Scalar(aae / tp.max(1.0)));
        }
        if metrics.has(Metric::Acc) {
            table.set(Metric::Acc, MetricValue::Fraction(correct / flows));
        }
        if metrics.has(Metric::Prc) {
            table.set(Metric::Prc, MetricValue::Fraction(precision));
        }
        if metrics.has(Metric::Rcl) {
            table.set(Metric::Rcl, MetricValue::Fraction(recall));
        }
        if metrics.has(Metric::F1) {
            table.set(Metric::F1, MetricValue::Scalar(f1));
        }
        Ok(())
    }

    /// Render everything collected as a fixed-width table.
    pub fn show(&self) {
        println!("============ {:^18} ============", self.show_name);
        show_table(&self.size, "Size");
        show_table(&self.insert, "Insert");
        show_table(&self.lookup, "Lookup");
        show_table(&self.update, "Update");
        show_table(&self.query, "Query");
        show_table(&self.heavy_hitter, "HH");
        show_table(&self.heavy_changer, "HC");
        show_table(&self.decode, "Decode");
        println!("============================================");
    }

    /// Access a family's collected values (used by the integration
    /// tests).
    pub fn collected(&self, family: &str) -> &MetricTable {
        match family {
            "size" => &self.size,
            "insert" => &self.insert,
            "lookup" => &self.lookup,
            "update" => &self.update,
            "query" => &self.query,
            "heavy_hitter" => &self.heavy_hitter,
            "heavy_changer" => &self.heavy_changer,
            _ => &self.decode,
        }
    }
}

fn show_table(table: &MetricTable, prefix: &str) {
    for (metric, value) in table.iter() {
        match (metric, value) {
            (Metric::Size, MetricValue::Bytes(bytes)) => {
                println!("{:>15}: {}", "Mem Footprint", fmt_bytes(*bytes));
            }
            (Metric::Ratio, MetricValue::Scalar(ratio)) => {
                println!("{:>15}: {}", format!("{prefix} Ratio"), fmt_g(*ratio));
            }
            (Metric::Time, MetricValue::Micros(us)) => {
                println!("{:>15}: {}", format!("{prefix} Time"), fmt_time(*us));
            }
            (Metric::Rate, MetricValue::PacketRate(rate)) => {
                println!("{:>15}: {}", format!("{prefix} Rate"), fmt_rate(*rate));
            }
            (Metric::Are, MetricValue::Scalar(are)) => {
                println!("{:>15}: {}", format!("{prefix} ARE"), fmt_g(*are));
            }
            (Metric::Aae, MetricValue::Scalar(aae)) => {
                println!("{:>15}: {}", format!("{prefix} AAE"), fmt_g(*aae));
            }
            (Metric::Acc, MetricValue::Fraction(acc)) => {
                println!("{:>15}: {}", format!("{prefix} Acc"), fmt_pct(*acc));
            }
            (Metric::Tp, MetricValue::Fraction(tp)) => {
                println!("{:>15}: {}", format!("{prefix} TP"), fmt_pct(*tp));
            }
            (Metric::Fp, MetricValue::Fraction(fp)) => {
                println!("{:>15}: {}", format!("{prefix} FP"), fmt_pct(*fp));
            }
            (Metric::Tn, MetricValue::Fraction(tn)) => {
                println!("{:>15}: {}", format!("{prefix} TN"), fmt_pct(*tn));
            }
            (Metric::Fn, MetricValue::Fraction(fn_)) => {
                println!("{:>15}: {}", format!("{prefix} FN"), fmt_pct(*fn_));
            }
            (Metric::Prc, MetricValue::Fraction(precision)) => {
                println!("{:>15}: {}", format!("{prefix} Prec"), fmt_pct(*precision));
            }
            (Metric::Rcl, MetricValue::Fraction(recall)) => {
                println!("{:>15}: {}", format!("{prefix} RCL"), fmt_pct(*recall));
            }
            (Metric::F1, MetricValue::Scalar(f1)) => {
                println!("{:>15}: {}", format!("{prefix} F1"), fmt_g(*f1));
            }
            (Metric::Podf, MetricValue::Podf { threshold, fraction }) => {
                println!(
                    "{:>15}: {}",
                    format!("{prefix} <={}%", fmt_g(*threshold * 100.0)),
                    fmt_pct(*fraction)
                );
            }
            (Metric::Dist, MetricValue::Dist { quantiles, fractions }) => {
                for (quantile, fraction) in quantiles.iter().zip(fractions.iter()) {
                    let label = if quantile.is_infinite() {
                        format!("{prefix} RE<=inf")
                    } else {
                        format!("{prefix} RE<={}", fmt_g(*quantile))
                    };
                    println!("{:>15}: {}", label, fmt_pct(*fraction));
                }
            }
            _ => {}
        }
    }
}

/// Render a float the way `%g` would: up to six digits after the point,
/// trailing zeros trimmed.
fn fmt_g(x: f64) -> String {
    if !x.is_finite() {
        return format!("{x}");
    }
    if x == 0.0 {
        return "0".to_string();
    }
    if x.abs() >= 1e-4 && x.abs() < 1e15 {
        let mut s = format!("{x:.6}");
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    } else {
        format!("{x:e}")
    }
}

fn fmt_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1 << 20 {
        format!("{} kB", fmt_g(bytes as f64 / 1024.0))
    } else {
        format!("{} MB", fmt_g(bytes as f64 / 1024.0 / 1024.0))
    }
}

fn fmt_time(us: i64) -> String {
    if us < 1_000 {
        format!("{us} us")
    } else if us < 1_000_000 {
        format!("{} ms", fmt_g(us as f64 / 1e3))
    } else {
        format!("{} s", fmt_g(us as f64 / 1e6))
    }
}

fn fmt_rate(rate: f64) -> String {
    if rate < 1e3 {
        format!("{} pac/s", fmt_g(rate))
    } else if rate < 1e6 {
        format!("{} Kpac/s", fmt_g(rate / 1e3))
    } else {
        format!("{} Mpac/s", fmt_g(rate / 1e6))
    }
}

fn fmt_pct(fraction: f64) -> String {
    format!("{}%", fmt_g(fraction * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_g() {
        assert_eq!(fmt_g(0.0), "0");
        assert_eq!(fmt_g(1.0), "1");
        assert_eq!(fmt_g(0.5), "0.5");
        assert_eq!(fmt_g(123.456), "123.456");
        assert_eq!(fmt_g(0.125), "0.125");
        assert_eq!(fmt_g(-2.5), "-2.5");
    }

    #[test]
    fn test_unit_scaling() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(2048), "2 kB");
        assert_eq!(fmt_bytes(3 << 20), "3 MB");
        assert_eq!(fmt_time(900), "900 us");
        assert_eq!(fmt_time(1500), "1.5 ms");
        assert_eq!(fmt_time(2_000_000), "2 s");
        assert_eq!(fmt_rate(500.0), "500 pac/s");
        assert_eq!(fmt_rate(2500.0), "2.5 Kpac/s");
        assert_eq!(fmt_rate(3_000_000.0), "3 Mpac/s");
    }

    #[test]
    fn test_precision_recall() {
        let (p, r, f1) = precision_recall(8.0, 2.0, 2.0);
        assert!((p - 0.8).abs() < 1e-12);
        assert!((r - 0.8).abs() < 1e-12);
        assert!((f1 - 0.8).abs() < 1e-12);

        let (p, r, f1) = precision_recall(0.0, 0.0, 0.0);
        assert_eq!((p, r, f1), (0.0, 0.0, 0.0));
    }
}
