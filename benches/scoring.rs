//! Benchmarks for instrument scoring and scanning.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cwhscore::prelude::*;

/// Deterministic pseudo-random walk
fn generate_series(n: usize) -> Series {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0;
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = (price + change).max(1.0);
    let h = o.max(c) + volatility * 0.5;
    let l = (o.min(c) - volatility * 0.5).max(0.5);

    bars.push(Candle::new(o, h, l, c, 1000.0 + (i % 17) as f64 * 50.0));
    price = c;
  }

  Series::new(bars).unwrap()
}

/// Serves the same generated series for every symbol.
struct InMemory(Series);

impl HistoryProvider for InMemory {
  fn fetch(&self, _symbol: &str, _lookback: Lookback) -> std::result::Result<Series, FetchError> {
    Ok(self.0.clone())
  }
}

fn bench_score_instrument(c: &mut Criterion) {
  let series = generate_series(65);
  let scorer = Scorer::with_defaults();

  c.bench_function("score_instrument_3mo", |b| {
    b.iter(|| black_box(scorer.score_instrument(black_box(&series))))
  });
}

fn bench_scaling(c: &mut Criterion) {
  let scorer = Scorer::with_defaults();
  let mut group = c.benchmark_group("scaling");

  for size in [65, 250, 1000].iter() {
    let series = generate_series(*size);
    group.bench_with_input(BenchmarkId::new("score", size), size, |b, _| {
      b.iter(|| black_box(scorer.score_instrument(black_box(&series))))
    });
  }

  group.finish();
}

fn bench_patterns_only(c: &mut Criterion) {
  let series = generate_series(250);
  let scorer = PatternScorer::with_defaults();
  let names: Vec<&str> = BuiltinRecognizer::NAMES.to_vec();

  c.bench_function("pattern_score_all_250_bars", |b| {
    b.iter(|| black_box(scorer.score(black_box(&series), &names, 20)))
  });
}

fn bench_scan(c: &mut Criterion) {
  let config = ScanConfig { max_concurrency: 4, pacing_ms: 0, ..ScanConfig::default() };
  let scanner =
    Scanner::new(Scorer::with_defaults(), InMemory(generate_series(65)), config).unwrap();
  let instruments: Vec<Instrument> =
    (0..32).map(|i| Instrument::new(format!("{}", 1000 + i), format!("Company {i}"))).collect();

  c.bench_function("scan_32_instruments", |b| {
    b.iter(|| black_box(scanner.run(black_box(&instruments))))
  });
}

criterion_group!(benches, bench_score_instrument, bench_scaling, bench_patterns_only, bench_scan);

criterion_main!(benches);
