//! Price history sources.
//!
//! The scan path only sees the [`HistoryProvider`] trait; any `Err` or empty
//! series it returns drops that instrument from the scan. [`CsvHistoryProvider`]
//! serves per-symbol CSV files from a directory.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{Candle, OHLCVExt, ScoreError, Series};

/// Error type for history fetches.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no history for {symbol}")]
    NotFound { symbol: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing column `{column}`")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("invalid history: {0}")]
    Invalid(#[from] ScoreError),

    /// Failure reported by a remote or custom provider (timeouts included).
    #[error("provider error: {0}")]
    Provider(String),
}

// ============================================================
// LOOKBACK
// ============================================================

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lookback {
    #[default]
    ThreeMonths,
    SixMonths,
    OneYear,
    /// The last `n` bars
    Bars(usize),
}

impl Lookback {
    /// Calendar months covered, `None` for a bar count.
    pub fn months(self) -> Option<u32> {
        match self {
            Lookback::ThreeMonths => Some(3),
            Lookback::SixMonths => Some(6),
            Lookback::OneYear => Some(12),
            Lookback::Bars(_) => None,
        }
    }

    /// Keep only the bars this lookback covers, counting back from the last one.
    pub fn trim(self, mut rows: Vec<(NaiveDate, Candle)>) -> Vec<(NaiveDate, Candle)> {
        match self {
            Lookback::Bars(n) => {
                let skip = rows.len().saturating_sub(n);
                rows.drain(..skip);
                rows
            },
            months => {
                let Some(last) = rows.last().map(|(d, _)| *d) else {
                    return rows;
                };
                let span = Months::new(months.months().unwrap_or(3));
                match last.checked_sub_months(span) {
                    Some(cutoff) => rows.into_iter().filter(|(d, _)| *d >= cutoff).collect(),
                    None => rows,
                }
            },
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::ThreeMonths => f.write_str("3mo"),
            Lookback::SixMonths => f.write_str("6mo"),
            Lookback::OneYear => f.write_str("1y"),
            Lookback::Bars(n) => write!(f, "{n}d"),
        }
    }
}

impl FromStr for Lookback {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "3mo" => Ok(Lookback::ThreeMonths),
            "6mo" => Ok(Lookback::SixMonths),
            "1y" | "12mo" => Ok(Lookback::OneYear),
            _ => s
                .strip_suffix('d')
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .map(Lookback::Bars)
                .ok_or_else(|| ScoreError::InvalidConfig(format!("unrecognised lookback `{s}`"))),
        }
    }
}

impl TryFrom<String> for Lookback {
    type Error = ScoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Lookback> for String {
    fn from(l: Lookback) -> Self {
        l.to_string()
    }
}

// ============================================================
// PROVIDER TRAIT
// ============================================================

/// Abstract interface for fetching daily bars.
///
/// Implementations own their timeouts and retries. An empty series means "no
/// data" and is not an error.
pub trait HistoryProvider: Send + Sync {
    fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<Series, FetchError>;
}

// ============================================================
// CSV PROVIDER
// ============================================================

/// Reads `<dir>/<symbol>.csv` with a `Date,Open,High,Low,Close,Volume` header
/// (case-insensitive, extra columns ignored).
///
/// Rows with a missing or non-finite value, an unparseable date, or
/// inconsistent prices are dropped. Remaining rows are sorted by date, and
/// the last row wins for a repeated date.
#[derive(Debug, Clone)]
pub struct CsvHistoryProvider {
    dir: PathBuf,
}

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

impl CsvHistoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Load every usable row of one file, sorted and de-duplicated by date.
    pub fn load_rows(path: &Path) -> Result<Vec<(NaiveDate, Candle)>, FetchError> {
        let file = File::open(path).map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let csv_err = |source| FetchError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let headers = reader.headers().map_err(csv_err)?.clone();
        let mut idx = [0usize; 6];
        for (slot, column) in idx.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(column))
                .ok_or_else(|| FetchError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })?;
        }

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            match parse_row(&record, &idx) {
                Some(row) => rows.push(row),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            tracing::debug!(path = %path.display(), dropped, "dropped unusable history rows");
        }

        rows.sort_by_key(|(d, _)| *d);
        // keep the last row for each date
        rows.reverse();
        rows.dedup_by_key(|(d, _)| *d);
        rows.reverse();
        Ok(rows)
    }
}

fn parse_row(record: &csv::StringRecord, idx: &[usize; 6]) -> Option<(NaiveDate, Candle)> {
    let date = parse_date(record.get(idx[0])?)?;
    let mut values = [0.0f64; 5];
    for (v, &i) in values.iter_mut().zip(&idx[1..]) {
        let parsed: f64 = record.get(i)?.parse().ok()?;
        if !parsed.is_finite() {
            return None;
        }
        *v = parsed;
    }
    let [open, high, low, close, volume] = values;
    let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    let candle = Candle::new(open, high, low, close, volume).with_timestamp(timestamp);
    candle.validate().ok()?;
    Some((date, candle))
}

/// `2024-05-01`, `2024/05/01`, or a timestamp starting with either.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%Y/%m/%d"))
        .ok()
}

impl HistoryProvider for CsvHistoryProvider {
    fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<Series, FetchError> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(FetchError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        read_series(&path, lookback)
    }
}

/// Load one history file directly, trimmed to `lookback`.
pub fn read_series(path: &Path, lookback: Lookback) -> Result<Series, FetchError> {
    let rows = lookback.trim(CsvHistoryProvider::load_rows(path)?);
    Ok(Series::new(rows.into_iter().map(|(_, c)| c).collect())?)
}
