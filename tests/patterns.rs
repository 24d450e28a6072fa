//! Integration tests for the candlestick recognizers through the public
//! dispatch API, on a caller-defined bar type.

use cwhscore::prelude::*;

/// Bars from some other data source; only the `OHLCV` trait is required.
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        1000.0
    }
}

/// Ten small alternating bars around 100 (body 1, range 2).
fn make_quiet(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                TestBar::new(100.0, 100.5, 98.5, 99.0)
            } else {
                TestBar::new(99.0, 100.5, 98.5, 100.0)
            }
        })
        .collect()
}

fn last_hit(name: &str, bars: &[TestBar]) -> Option<Direction> {
    let recognizer = BuiltinRecognizer::from_name(name).expect("known pattern");
    let hits = recognizer.scan(bars);
    assert_eq!(hits.len(), bars.len());
    hits.last().copied().flatten()
}

// ============================================================
// DISPATCH
// ============================================================

#[test]
fn test_every_name_resolves() {
    assert_eq!(BuiltinRecognizer::NAMES.len(), 11);
    for name in BuiltinRecognizer::NAMES {
        let r = BuiltinRecognizer::from_name(name).unwrap();
        assert_eq!(r.name(), *name);
        assert!((1..=4).contains(&r.min_bars()), "{name}");
    }
}

#[test]
fn test_name_spellings() {
    for spelling in ["CDLHAMMER", "CDL_HAMMER", "hammer", "Hammer"] {
        assert_eq!(BuiltinRecognizer::from_name(spelling).map(|r| r.name()), Some("CDLHAMMER"));
    }
    assert_eq!(
        "CDL3WHITESOLDIERS".parse::<BuiltinRecognizer>().map(|r| r.name()),
        Ok("CDL3WHITESOLDIERS")
    );
    assert_eq!(
        "CDLABANDONEDBABY".parse::<BuiltinRecognizer>().map(|r| r.name()),
        Err(ScoreError::UnknownSignal("CDLABANDONEDBABY".into()))
    );
}

#[test]
fn test_default_table_covers_every_recognizer() {
    let table = PatternTable::default();
    for name in BuiltinRecognizer::NAMES {
        assert!(table.get(name).is_some(), "{name} has no weight");
    }
}

#[test]
fn test_scan_is_none_during_warmup() {
    let bars = make_quiet(3);
    let strike = BuiltinRecognizer::from_name("CDL3LINESTRIKE").unwrap();
    assert_eq!(strike.scan(&bars), vec![None, None, None]);
    assert!(strike.scan::<TestBar>(&[]).is_empty());
}

#[test]
fn test_quiet_market_has_no_patterns() {
    let bars = make_quiet(20);
    for name in BuiltinRecognizer::NAMES {
        let recognizer = BuiltinRecognizer::from_name(name).unwrap();
        assert!(recognizer.scan(&bars).iter().all(Option::is_none), "{name} fired on quiet bars");
    }
}

// ============================================================
// MULTI BAR PATTERNS
// ============================================================

#[test]
fn test_morning_star_detection() {
    let mut bars = make_quiet(10);
    bars.push(TestBar::new(100.0, 100.2, 96.8, 97.0));
    bars.push(TestBar::new(96.0, 96.3, 95.5, 96.2));
    bars.push(TestBar::new(96.5, 99.6, 96.4, 99.5));
    assert_eq!(last_hit("CDLMORNINGSTAR", &bars), Some(Direction::Bullish));
    assert_eq!(last_hit("CDLEVENINGSTAR", &bars), None);
}

#[test]
fn test_evening_star_detection() {
    let mut bars = make_quiet(10);
    bars.push(TestBar::new(99.0, 102.2, 98.8, 102.0));
    bars.push(TestBar::new(102.8, 103.2, 102.6, 103.0));
    bars.push(TestBar::new(102.5, 102.6, 99.4, 99.5));
    assert_eq!(last_hit("CDLEVENINGSTAR", &bars), Some(Direction::Bearish));
}

#[test]
fn test_three_white_soldiers_detection() {
    let mut bars = make_quiet(10);
    bars.push(TestBar::new(99.0, 101.05, 98.9, 101.0));
    bars.push(TestBar::new(100.5, 102.55, 100.4, 102.5));
    bars.push(TestBar::new(102.0, 104.05, 101.9, 104.0));
    assert_eq!(last_hit("CDL3WHITESOLDIERS", &bars), Some(Direction::Bullish));
}

#[test]
fn test_three_line_strike_both_ways() {
    let mut bull = make_quiet(10);
    bull.push(TestBar::new(99.0, 100.6, 98.9, 100.5));
    bull.push(TestBar::new(100.3, 101.6, 100.2, 101.5));
    bull.push(TestBar::new(101.3, 102.6, 101.2, 102.5));
    bull.push(TestBar::new(102.8, 102.9, 98.7, 98.8));
    assert_eq!(last_hit("CDL3LINESTRIKE", &bull), Some(Direction::Bullish));

    let mut bear = make_quiet(10);
    bear.push(TestBar::new(101.0, 101.1, 99.4, 99.5));
    bear.push(TestBar::new(99.7, 99.8, 98.4, 98.5));
    bear.push(TestBar::new(98.7, 98.8, 97.4, 97.5));
    bear.push(TestBar::new(97.2, 101.3, 97.1, 101.2));
    assert_eq!(last_hit("CDL3LINESTRIKE", &bear), Some(Direction::Bearish));
}

#[test]
fn test_engulfing_both_ways() {
    let bull = vec![TestBar::new(10.0, 10.2, 8.8, 9.0), TestBar::new(8.9, 10.6, 8.8, 10.5)];
    assert_eq!(last_hit("CDLENGULFING", &bull), Some(Direction::Bullish));
    let bear = vec![TestBar::new(9.0, 10.2, 8.8, 10.0), TestBar::new(10.1, 10.2, 8.5, 8.7)];
    assert_eq!(last_hit("CDLENGULFING", &bear), Some(Direction::Bearish));
}

// ============================================================
// SCORER OVER RECOGNIZERS
// ============================================================

#[test]
fn test_pattern_scorer_on_morning_star() {
    let mut bars: Vec<Candle> = make_quiet(10)
        .iter()
        .map(|b| Candle::new(b.o, b.h, b.l, b.c, 1000.0))
        .collect();
    bars.push(Candle::new(100.0, 100.2, 96.8, 97.0, 1000.0));
    bars.push(Candle::new(96.0, 96.3, 95.5, 96.2, 1000.0));
    bars.push(Candle::new(96.5, 99.6, 96.4, 99.5, 1000.0));
    let series = Series::new(bars).unwrap();

    let sub = PatternScorer::with_defaults().score(&series, &["morning_star", "CDLEVENINGSTAR"], 20);
    assert_eq!(sub.score, 5);
    assert_eq!(sub.labels, vec!["Morning Star"]);
    assert_eq!(sub.outcomes[0].name(), "CDLMORNINGSTAR");
    assert_eq!(sub.outcomes[1].points(), 0);
}

#[test]
fn test_pattern_scorer_short_series_skips() {
    let series = Series::new(vec![Candle::new(10.0, 10.5, 9.5, 10.2, 100.0)]).unwrap();
    let sub = PatternScorer::with_defaults().score(&series, &["CDL3LINESTRIKE"], 20);
    assert_eq!(sub.score, 0);
    assert_eq!(
        sub.outcomes[0],
        SignalOutcome::Skipped {
            name: "CDL3LINESTRIKE".into(),
            reason: ScoreError::InsufficientData { need: 4, got: 1 },
        }
    );
}
