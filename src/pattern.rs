//! Weighted candlestick pattern scoring.
//!
//! Every selected pattern is run over the whole series, then only the trailing
//! window is inspected. Bullish patterns carry positive weights, bearish ones
//! negative weights; the signed sum is clamped only at the end.

use serde::{Deserialize, Serialize};

use crate::detectors::{canonical_name, BuiltinRecognizer, CandleContext};
use crate::{Direction, Result, ScoreError, Series, SignalOutcome, SubScore};

/// Bars at the end of the series searched for pattern hits
pub const DEFAULT_WINDOW: usize = 10;

// ============================================================
// WEIGHT TABLE
// ============================================================

/// Signed weight and display label of one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// TA-Lib function name, stored in canonical `CDL...` form
    pub name: String,
    pub weight: i32,
    pub label: String,
}

static DEFAULT_PATTERN_TABLE: [(&str, i32, &str); 11] = [
    ("CDLMORNINGSTAR", 5, "Morning Star"),
    ("CDL3WHITESOLDIERS", 6, "Three White Soldiers"),
    ("CDLENGULFING", 4, "Bullish Engulfing"),
    ("CDLPIERCING", 4, "Piercing Line"),
    ("CDLHAMMER", 4, "Hammer"),
    ("CDLDRAGONFLYDOJI", 3, "Dragonfly Doji"),
    ("CDL3LINESTRIKE", 3, "Bullish Three-Line Strike"),
    ("CDLMATCHINGLOW", 3, "Matching Low"),
    ("CDLEVENINGSTAR", -5, "Evening Star"),
    ("CDLDARKCLOUDCOVER", -4, "Dark Cloud Cover"),
    ("CDLSHOOTINGSTAR", -3, "Shooting Star"),
];

/// Immutable pattern → (weight, label) table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PatternEntry>", into = "Vec<PatternEntry>")]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_PATTERN_TABLE
                .iter()
                .map(|&(name, weight, label)| PatternEntry {
                    name: name.to_string(),
                    weight,
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

impl PatternTable {
    /// Build a custom table. Names are canonicalised and must be unique.
    pub fn new(entries: Vec<PatternEntry>) -> Result<Self> {
        let mut out: Vec<PatternEntry> = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.name = canonical_name(&entry.name);
            if out.iter().any(|e| e.name == entry.name) {
                return Err(ScoreError::InvalidConfig(format!(
                    "pattern {} listed twice",
                    entry.name
                )));
            }
            out.push(entry);
        }
        Ok(Self { entries: out })
    }

    /// Look up by any accepted spelling of the name.
    pub fn get(&self, name: &str) -> Option<&PatternEntry> {
        let key = canonical_name(name);
        self.entries.iter().find(|e| e.name == key)
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

impl TryFrom<Vec<PatternEntry>> for PatternTable {
    type Error = ScoreError;

    fn try_from(entries: Vec<PatternEntry>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<PatternTable> for Vec<PatternEntry> {
    fn from(table: PatternTable) -> Self {
        table.entries
    }
}

// ============================================================
// SCORER
// ============================================================

/// Scores recent candlestick patterns against a signed weight table.
#[derive(Debug, Clone)]
pub struct PatternScorer {
    table: PatternTable,
    window: usize,
}

impl Default for PatternScorer {
    fn default() -> Self {
        Self {
            table: PatternTable::default(),
            window: DEFAULT_WINDOW,
        }
    }
}

impl PatternScorer {
    pub fn new(table: PatternTable, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(ScoreError::InvalidValue("pattern window must be > 0"));
        }
        Ok(Self { table, window })
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Evaluate `selected` in order; the signed sum is clamped to `[0, max_score]`.
    pub fn score<S: AsRef<str>>(&self, series: &Series, selected: &[S], max_score: u32) -> SubScore {
        let bars = series.bars();
        let ctx = CandleContext::compute_all(bars);
        let outcomes = selected
            .iter()
            .map(|name| self.outcome(series, &ctx, name.as_ref()))
            .collect();
        SubScore::from_outcomes(outcomes, max_score)
    }

    fn outcome(&self, series: &Series, ctx: &[CandleContext], name: &str) -> SignalOutcome {
        match self.check(series, ctx, name) {
            Ok((entry, triggered)) => SignalOutcome::Evaluated {
                name: entry.name.clone(),
                label: entry.label.clone(),
                triggered,
                points: entry.weight,
            },
            Err(reason) => {
                tracing::debug!(signal = name, %reason, "pattern signal skipped");
                SignalOutcome::Skipped {
                    name: name.to_string(),
                    reason,
                }
            },
        }
    }

    fn check(&self, series: &Series, ctx: &[CandleContext], name: &str) -> Result<(&PatternEntry, bool)> {
        let entry = self
            .table
            .get(name)
            .ok_or_else(|| ScoreError::UnknownSignal(name.to_string()))?;
        let recognizer: BuiltinRecognizer = entry.name.parse()?;

        let need = recognizer.min_bars();
        if series.len() < need {
            return Err(ScoreError::InsufficientData {
                need,
                got: series.len(),
            });
        }

        let hits = recognizer.scan_with(series.bars(), ctx);
        let recent = &hits[hits.len().saturating_sub(self.window)..];
        let wanted = match entry.weight {
            w if w > 0 => Some(Direction::Bullish),
            w if w < 0 => Some(Direction::Bearish),
            _ => None,
        };
        let triggered = wanted.is_some_and(|dir| recent.iter().any(|hit| *hit == Some(dir)));
        Ok((entry, triggered))
    }
}
