//! Scanning many instruments concurrently.
//!
//! Each instrument is one task on a bounded rayon pool: fetch its history,
//! score it, send the result back over a channel. Workers pause after every
//! task to throttle the history provider. A task that fails, finds no data or
//! panics is dropped from the results and reported in
//! [`ScanOutcome::skipped`]; the rest of the scan carries on.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Instant;

use serde::Serialize;

use crate::config::ScanConfig;
use crate::directory::{to_symbol, Instrument};
use crate::history::HistoryProvider;
use crate::scoring::{ScoreBreakdown, Scorer};
use crate::ScoreError;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ScoreError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why an instrument contributed no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("history fetch failed: {0}")]
    Fetch(String),

    #[error("no price history")]
    EmptyHistory,

    #[error("scoring panicked: {0}")]
    Panicked(String),
}

/// One scored instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    /// Bare instrument code, without the provider suffix
    pub code: String,
    pub name: String,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedInstrument {
    pub code: String,
    pub reason: SkipReason,
}

/// Everything a scan produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanOutcome {
    /// Sorted by total score, highest first
    pub results: Vec<ScanResult>,
    pub skipped: Vec<SkippedInstrument>,
}

impl ScanOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn top(&self, n: usize) -> &[ScanResult] {
        &self.results[..n.min(self.results.len())]
    }
}

type TaskOutput = Result<ScanResult, SkippedInstrument>;

/// Scores a list of instruments with one shared [`Scorer`].
pub struct Scanner<P> {
    scorer: Scorer,
    provider: P,
    config: ScanConfig,
    pool: rayon::ThreadPool,
}

impl<P: HistoryProvider> Scanner<P> {
    pub fn new(scorer: Scorer, provider: P, config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|i| format!("cwhscore-scan-{i}"))
            .build()?;
        Ok(Self {
            scorer,
            provider,
            config,
            pool,
        })
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan without progress reporting.
    pub fn run(&self, instruments: &[Instrument]) -> ScanOutcome {
        self.run_with_progress(instruments, |_, _| {})
    }

    /// Scan, calling `progress(done, total)` on this thread after each
    /// completed instrument, in completion order.
    pub fn run_with_progress<F>(&self, instruments: &[Instrument], mut progress: F) -> ScanOutcome
    where
        F: FnMut(usize, usize),
    {
        let total = instruments.len();
        let mut outcome = ScanOutcome::default();
        if total == 0 {
            return outcome;
        }

        let started = Instant::now();
        tracing::info!(
            instruments = total,
            workers = self.config.max_concurrency,
            lookback = %self.config.lookback,
            "scan started"
        );

        let (tx, rx) = mpsc::channel::<TaskOutput>();
        let pacing = self.config.pacing();
        self.pool.in_place_scope(|scope| {
            for instrument in instruments {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let output = catch_unwind(AssertUnwindSafe(|| self.score_one(instrument)))
                        .unwrap_or_else(|payload| {
                            Err(SkippedInstrument {
                                code: instrument.code.clone(),
                                reason: SkipReason::Panicked(panic_message(&*payload)),
                            })
                        });
                    // the receiver outlives every task
                    let _ = tx.send(output);
                    if !pacing.is_zero() {
                        std::thread::sleep(pacing);
                    }
                });
            }
            drop(tx);

            for (done, output) in rx.iter().enumerate() {
                match output {
                    Ok(result) => outcome.results.push(result),
                    Err(skipped) => {
                        tracing::warn!(code = %skipped.code, reason = %skipped.reason, "instrument dropped from scan");
                        outcome.skipped.push(skipped);
                    },
                }
                progress(done + 1, total);
            }
        });

        outcome
            .results
            .sort_by(|a, b| b.breakdown.total_score.total_cmp(&a.breakdown.total_score));
        tracing::info!(
            scored = outcome.results.len(),
            skipped = outcome.skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );
        outcome
    }

    fn score_one(&self, instrument: &Instrument) -> TaskOutput {
        let skip = |reason| SkippedInstrument {
            code: instrument.code.clone(),
            reason,
        };
        let symbol = to_symbol(&instrument.code, &self.config.symbol_suffix);
        let series = self
            .provider
            .fetch(&symbol, self.config.lookback)
            .map_err(|e| skip(SkipReason::Fetch(e.to_string())))?;
        if series.is_empty() {
            return Err(skip(SkipReason::EmptyHistory));
        }
        tracing::debug!(code = %instrument.code, bars = series.len(), "scoring instrument");
        Ok(ScanResult {
            code: instrument.code.clone(),
            name: instrument.name.clone(),
            breakdown: self.scorer.score_instrument(&series),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{FetchError, Lookback};
    use crate::{Candle, Series};

    struct Fixed;

    impl HistoryProvider for Fixed {
        fn fetch(&self, symbol: &str, _lookback: Lookback) -> Result<Series, FetchError> {
            match symbol {
                "EMPTY" => Ok(Series::empty()),
                "FAIL" => Err(FetchError::Provider("timeout".into())),
                "BOOM" => panic!("provider bug"),
                _ => {
                    let bars = (0..60)
                        .map(|i| {
                            let c = 100.0 + i as f64;
                            Candle::new(c - 0.5, c + 1.0, c - 1.0, c, 1000.0)
                        })
                        .collect();
                    Ok(Series::new(bars).expect("valid bars"))
                },
            }
        }
    }

    fn config() -> ScanConfig {
        ScanConfig {
            max_concurrency: 2,
            pacing_ms: 0,
            ..ScanConfig::default()
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let scanner = Scanner::new(Scorer::with_defaults(), Fixed, config()).unwrap();
        let instruments: Vec<_> = ["OK1", "EMPTY", "FAIL", "BOOM", "OK2"]
            .iter()
            .map(|c| Instrument::new(*c, *c))
            .collect();
        let mut calls = Vec::new();
        let outcome = scanner.run_with_progress(&instruments, |done, total| calls.push((done, total)));

        let mut codes: Vec<_> = outcome.results.iter().map(|r| r.code.as_str()).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec!["OK1", "OK2"]);
        assert_eq!(outcome.skipped.len(), 3);
        assert_eq!(calls.len(), 5);
        assert_eq!(calls.last(), Some(&(5, 5)));

        let reason = |code: &str| outcome.skipped.iter().find(|s| s.code == code).map(|s| s.reason.clone());
        assert_eq!(reason("EMPTY"), Some(SkipReason::EmptyHistory));
        assert!(matches!(reason("FAIL"), Some(SkipReason::Fetch(_))));
        assert_eq!(reason("BOOM"), Some(SkipReason::Panicked("provider bug".into())));
    }

    #[test]
    fn test_empty_instrument_list() {
        let scanner = Scanner::new(Scorer::with_defaults(), Fixed, config()).unwrap();
        let outcome = scanner.run(&[]);
        assert!(outcome.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cfg = ScanConfig {
            max_concurrency: 0,
            ..ScanConfig::default()
        };
        assert!(Scanner::new(Scorer::with_defaults(), Fixed, cfg).is_err());
    }

    #[test]
    fn test_top_is_bounded() {
        let outcome = ScanOutcome::default();
        assert!(outcome.top(5).is_empty());
    }
}
