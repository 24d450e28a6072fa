//! Technical indicator scoring.
//!
//! Each selected rule is evaluated against the most recent bar only. A rule
//! that triggers adds its points from the [`TechnicalTable`]; a rule that
//! cannot be evaluated is recorded as skipped and never aborts the others.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::indicators::{self, latest, previous};
use crate::params::{as_period, ParamMeta, Tunable};
use crate::{Result, ScoreError, Series, SignalOutcome, SubScore};

// ============================================================
// RULES
// ============================================================

/// The indicator rules the scorer knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TechnicalRule {
    /// close > SMA
    Sma,
    /// close > EMA
    Ema,
    /// MACD line > signal line
    Macd,
    /// RSI in the neutral band, or oversold when configured
    Rsi,
    /// close above the anchor band and the middle band rising
    Bbands,
    /// ADX at or above the trend threshold
    Adx,
    /// OBV rose on the last bar
    Obv,
    /// ATR below its own rolling mean
    Atr,
    /// close above Parabolic SAR
    Sar,
    /// fast SMA above slow SMA and fast SMA rising
    GoldenCross,
}

impl TechnicalRule {
    pub const ALL: [TechnicalRule; 10] = [
        TechnicalRule::Sma,
        TechnicalRule::Ema,
        TechnicalRule::Macd,
        TechnicalRule::Rsi,
        TechnicalRule::Bbands,
        TechnicalRule::Adx,
        TechnicalRule::Obv,
        TechnicalRule::Atr,
        TechnicalRule::Sar,
        TechnicalRule::GoldenCross,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TechnicalRule::Sma => "SMA",
            TechnicalRule::Ema => "EMA",
            TechnicalRule::Macd => "MACD",
            TechnicalRule::Rsi => "RSI",
            TechnicalRule::Bbands => "BBANDS",
            TechnicalRule::Adx => "ADX",
            TechnicalRule::Obv => "OBV",
            TechnicalRule::Atr => "ATR",
            TechnicalRule::Sar => "SAR",
            TechnicalRule::GoldenCross => "GOLDENCROSS",
        }
    }
}

impl fmt::Display for TechnicalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TechnicalRule {
    type Err = ScoreError;

    /// Case-insensitive; separators are ignored (`golden_cross` works).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        TechnicalRule::ALL
            .into_iter()
            .find(|r| r.name() == key)
            .ok_or_else(|| ScoreError::UnknownSignal(s.to_string()))
    }
}

// ============================================================
// POINTS TABLE
// ============================================================

/// Points and display label of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalEntry {
    pub rule: TechnicalRule,
    pub points: i32,
    pub label: String,
}

static DEFAULT_TECHNICAL_TABLE: [(TechnicalRule, i32, &str); 10] = [
    (TechnicalRule::Sma, 2, "Close above SMA20"),
    (TechnicalRule::Ema, 2, "Close above EMA20"),
    (TechnicalRule::Macd, 3, "MACD above signal"),
    (TechnicalRule::Rsi, 2, "RSI in neutral zone (40-60)"),
    (TechnicalRule::Bbands, 3, "Bollinger middle rising, close above"),
    (TechnicalRule::Adx, 2, "ADX 25+ (strong trend)"),
    (TechnicalRule::Obv, 2, "OBV rising"),
    (TechnicalRule::Atr, 1, "ATR below average (volatility easing)"),
    (TechnicalRule::Sar, 2, "Trading above SAR"),
    (TechnicalRule::GoldenCross, 4, "Golden cross (SMA20 > SMA50)"),
];

/// Immutable rule → (points, label) table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TechnicalEntry>", into = "Vec<TechnicalEntry>")]
pub struct TechnicalTable {
    entries: Vec<TechnicalEntry>,
}

impl Default for TechnicalTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_TECHNICAL_TABLE
                .iter()
                .map(|&(rule, points, label)| TechnicalEntry {
                    rule,
                    points,
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

impl TechnicalTable {
    /// Build a custom table. A rule may appear at most once.
    pub fn new(entries: Vec<TechnicalEntry>) -> Result<Self> {
        for (i, e) in entries.iter().enumerate() {
            if entries[..i].iter().any(|p| p.rule == e.rule) {
                return Err(ScoreError::InvalidConfig(format!(
                    "technical rule {} listed twice",
                    e.rule
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, rule: TechnicalRule) -> Option<&TechnicalEntry> {
        self.entries.iter().find(|e| e.rule == rule)
    }

    pub fn entries(&self) -> &[TechnicalEntry] {
        &self.entries
    }

    /// Highest score the table can produce with every rule triggered.
    pub fn max_points(&self) -> i64 {
        self.entries.iter().map(|e| i64::from(e.points.max(0))).sum()
    }
}

impl TryFrom<Vec<TechnicalEntry>> for TechnicalTable {
    type Error = ScoreError;

    fn try_from(entries: Vec<TechnicalEntry>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<TechnicalTable> for Vec<TechnicalEntry> {
    fn from(table: TechnicalTable) -> Self {
        table.entries
    }
}

// ============================================================
// PARAMETERS
// ============================================================

/// Which Bollinger band the close is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandAnchor {
    #[default]
    Middle,
    Lower,
}

/// Indicator periods and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalParams {
    pub sma_period: usize,
    pub ema_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub rsi_neutral_low: f64,
    pub rsi_neutral_high: f64,
    /// RSI below this also triggers; unset by default
    pub rsi_oversold: Option<f64>,
    pub bband_period: usize,
    pub bband_width: f64,
    pub bband_anchor: BandAnchor,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub atr_period: usize,
    pub atr_average_period: usize,
    pub sar_acceleration: f64,
    pub sar_maximum: f64,
    pub golden_fast: usize,
    pub golden_slow: usize,
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 20,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            rsi_neutral_low: 40.0,
            rsi_neutral_high: 60.0,
            rsi_oversold: None,
            bband_period: 20,
            bband_width: 2.0,
            bband_anchor: BandAnchor::Middle,
            adx_period: 14,
            adx_threshold: 25.0,
            atr_period: 14,
            atr_average_period: 30,
            sar_acceleration: 0.02,
            sar_maximum: 0.2,
            golden_fast: 20,
            golden_slow: 50,
        }
    }
}

impl TechnicalParams {
    pub fn with_defaults() -> Self {
        Self::default()
    }
}

static TECHNICAL_PARAMS: [ParamMeta; 19] = [
    ParamMeta::period("sma_period", 20.0, (2.0, 200.0, 5.0), "SMA length"),
    ParamMeta::period("ema_period", 20.0, (2.0, 200.0, 5.0), "EMA length"),
    ParamMeta::period("macd_fast", 12.0, (2.0, 50.0, 1.0), "MACD fast EMA"),
    ParamMeta::period("macd_slow", 26.0, (3.0, 100.0, 1.0), "MACD slow EMA"),
    ParamMeta::period("macd_signal", 9.0, (2.0, 50.0, 1.0), "MACD signal EMA"),
    ParamMeta::period("rsi_period", 14.0, (2.0, 100.0, 1.0), "RSI length"),
    ParamMeta::level("rsi_neutral_low", 40.0, (0.0, 100.0, 5.0), "Lower edge of the neutral RSI band"),
    ParamMeta::level("rsi_neutral_high", 60.0, (0.0, 100.0, 5.0), "Upper edge of the neutral RSI band"),
    ParamMeta::level("rsi_oversold", 0.0, (0.0, 100.0, 5.0), "RSI below this also triggers (0 = off)"),
    ParamMeta::period("bband_period", 20.0, (2.0, 200.0, 5.0), "Bollinger length"),
    ParamMeta::level("bband_width", 2.0, (0.5, 5.0, 0.5), "Bollinger width in standard deviations"),
    ParamMeta::period("adx_period", 14.0, (2.0, 100.0, 1.0), "ADX length"),
    ParamMeta::level("adx_threshold", 25.0, (0.0, 100.0, 5.0), "ADX trend threshold"),
    ParamMeta::period("atr_period", 14.0, (2.0, 100.0, 1.0), "ATR length"),
    ParamMeta::period("atr_average_period", 30.0, (2.0, 200.0, 5.0), "Rolling mean of ATR"),
    ParamMeta::ratio("sar_acceleration", 0.02, (0.001, 1.0, 0.01), "SAR acceleration start and step"),
    ParamMeta::ratio("sar_maximum", 0.2, (0.001, 1.0, 0.05), "SAR acceleration cap"),
    ParamMeta::period("golden_fast", 20.0, (2.0, 200.0, 5.0), "Golden cross fast SMA"),
    ParamMeta::period("golden_slow", 50.0, (3.0, 400.0, 10.0), "Golden cross slow SMA"),
];

impl Tunable for TechnicalParams {
    fn param_meta() -> &'static [ParamMeta] {
        &TECHNICAL_PARAMS
    }

    fn get_param(&self, name: &str) -> Option<f64> {
        let value = match name {
            "sma_period" => self.sma_period as f64,
            "ema_period" => self.ema_period as f64,
            "macd_fast" => self.macd_fast as f64,
            "macd_slow" => self.macd_slow as f64,
            "macd_signal" => self.macd_signal as f64,
            "rsi_period" => self.rsi_period as f64,
            "rsi_neutral_low" => self.rsi_neutral_low,
            "rsi_neutral_high" => self.rsi_neutral_high,
            "rsi_oversold" => self.rsi_oversold.unwrap_or(0.0),
            "bband_period" => self.bband_period as f64,
            "bband_width" => self.bband_width,
            "adx_period" => self.adx_period as f64,
            "adx_threshold" => self.adx_threshold,
            "atr_period" => self.atr_period as f64,
            "atr_average_period" => self.atr_average_period as f64,
            "sar_acceleration" => self.sar_acceleration,
            "sar_maximum" => self.sar_maximum,
            "golden_fast" => self.golden_fast as f64,
            "golden_slow" => self.golden_slow as f64,
            _ => return None,
        };
        Some(value)
    }

    fn set_param(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            "sma_period" => self.sma_period = as_period(value),
            "ema_period" => self.ema_period = as_period(value),
            "macd_fast" => self.macd_fast = as_period(value),
            "macd_slow" => self.macd_slow = as_period(value),
            "macd_signal" => self.macd_signal = as_period(value),
            "rsi_period" => self.rsi_period = as_period(value),
            "rsi_neutral_low" => self.rsi_neutral_low = value,
            "rsi_neutral_high" => self.rsi_neutral_high = value,
            "rsi_oversold" => self.rsi_oversold = (value > 0.0).then_some(value),
            "bband_period" => self.bband_period = as_period(value),
            "bband_width" => self.bband_width = value,
            "adx_period" => self.adx_period = as_period(value),
            "adx_threshold" => self.adx_threshold = value,
            "atr_period" => self.atr_period = as_period(value),
            "atr_average_period" => self.atr_average_period = as_period(value),
            "sar_acceleration" => self.sar_acceleration = value,
            "sar_maximum" => self.sar_maximum = value,
            "golden_fast" => self.golden_fast = as_period(value),
            "golden_slow" => self.golden_slow = as_period(value),
            _ => return Err(ScoreError::InvalidConfig(format!("unknown technical parameter `{name}`"))),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let periods = [
            self.sma_period,
            self.ema_period,
            self.macd_fast,
            self.macd_slow,
            self.macd_signal,
            self.rsi_period,
            self.bband_period,
            self.adx_period,
            self.atr_period,
            self.atr_average_period,
            self.golden_fast,
            self.golden_slow,
        ];
        if periods.contains(&0) {
            return Err(ScoreError::InvalidValue("indicator periods must be > 0"));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ScoreError::InvalidConfig("macd_fast must be shorter than macd_slow".into()));
        }
        if self.golden_fast >= self.golden_slow {
            return Err(ScoreError::InvalidConfig("golden_fast must be shorter than golden_slow".into()));
        }
        if !(0.0..=100.0).contains(&self.rsi_neutral_low)
            || !(0.0..=100.0).contains(&self.rsi_neutral_high)
            || self.rsi_neutral_low > self.rsi_neutral_high
        {
            return Err(ScoreError::InvalidConfig(format!(
                "RSI neutral band [{}, {}] is not inside [0, 100]",
                self.rsi_neutral_low, self.rsi_neutral_high
            )));
        }
        if let Some(level) = self.rsi_oversold {
            if !(0.0..=100.0).contains(&level) {
                return Err(ScoreError::OutOfRange {
                    field: "rsi_oversold",
                    value: level,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        if self.bband_width.is_nan() || self.bband_width <= 0.0 {
            return Err(ScoreError::InvalidValue("bband_width must be > 0"));
        }
        let sar_ok = self.sar_acceleration > 0.0 && self.sar_maximum.is_finite() && self.sar_acceleration <= self.sar_maximum;
        if !sar_ok {
            return Err(ScoreError::InvalidConfig(
                "sar_acceleration must be positive and not above sar_maximum".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// SCORER
// ============================================================

/// Price and volume columns of one series, extracted once per scoring call.
struct Columns {
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

impl Columns {
    fn of(series: &Series) -> Self {
        Self {
            high: series.highs(),
            low: series.lows(),
            close: series.closes(),
            volume: series.volumes(),
        }
    }

    fn len(&self) -> usize {
        self.close.len()
    }

    /// Indicator value at the last bar, distinguishing short history from an
    /// undefined result.
    fn at_end(&self, line: &[f64], need: usize, what: &'static str) -> Result<f64> {
        self.require(need)?;
        latest(line).ok_or(ScoreError::NumericFailure(what))
    }

    /// Indicator value one bar before the last.
    fn before_end(&self, line: &[f64], need: usize, what: &'static str) -> Result<f64> {
        self.require(need)?;
        previous(line).ok_or(ScoreError::NumericFailure(what))
    }

    fn require(&self, need: usize) -> Result<()> {
        if self.len() < need {
            return Err(ScoreError::InsufficientData {
                need,
                got: self.len(),
            });
        }
        Ok(())
    }

    fn last_close(&self) -> Result<f64> {
        self.at_end(&self.close, 1, "close")
    }
}

/// Scores the latest bar of a series against a selection of indicator rules.
#[derive(Debug, Clone, Default)]
pub struct TechnicalScorer {
    table: TechnicalTable,
    params: TechnicalParams,
}

impl TechnicalScorer {
    pub fn new(table: TechnicalTable, params: TechnicalParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { table, params })
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &TechnicalTable {
        &self.table
    }

    pub fn params(&self) -> &TechnicalParams {
        &self.params
    }

    /// Evaluate `selected` in order; the result is clamped to `[0, max_score]`.
    pub fn score<S: AsRef<str>>(&self, series: &Series, selected: &[S], max_score: u32) -> SubScore {
        let cols = Columns::of(series);
        let outcomes = selected
            .iter()
            .map(|name| self.outcome(&cols, name.as_ref()))
            .collect();
        SubScore::from_outcomes(outcomes, max_score)
    }

    /// Whether a single rule triggers on the latest bar of `series`.
    pub fn evaluate(&self, rule: TechnicalRule, series: &Series) -> Result<bool> {
        self.check(rule, &Columns::of(series))
    }

    fn outcome(&self, cols: &Columns, name: &str) -> SignalOutcome {
        let resolved = name.parse::<TechnicalRule>().and_then(|rule| {
            let entry = self
                .table
                .get(rule)
                .ok_or_else(|| ScoreError::UnknownSignal(name.to_string()))?;
            Ok((entry, self.check(rule, cols)?))
        });

        match resolved {
            Ok((entry, triggered)) => SignalOutcome::Evaluated {
                name: entry.rule.name().to_string(),
                label: entry.label.clone(),
                triggered,
                points: entry.points,
            },
            Err(reason) => {
                tracing::debug!(signal = name, %reason, "technical signal skipped");
                SignalOutcome::Skipped {
                    name: name.to_string(),
                    reason,
                }
            },
        }
    }

    fn check(&self, rule: TechnicalRule, cols: &Columns) -> Result<bool> {
        let p = &self.params;
        let close = cols.last_close()?;

        match rule {
            TechnicalRule::Sma => {
                let line = indicators::sma(&cols.close, p.sma_period);
                Ok(close > cols.at_end(&line, p.sma_period, "SMA")?)
            },
            TechnicalRule::Ema => {
                let line = indicators::ema(&cols.close, p.ema_period);
                Ok(close > cols.at_end(&line, p.ema_period, "EMA")?)
            },
            TechnicalRule::Macd => {
                let m = indicators::macd(&cols.close, p.macd_fast, p.macd_slow, p.macd_signal);
                let need = p.macd_slow + p.macd_signal - 1;
                let line = cols.at_end(&m.macd, need, "MACD")?;
                let signal = cols.at_end(&m.signal, need, "MACD signal")?;
                Ok(line > signal)
            },
            TechnicalRule::Rsi => {
                let line = indicators::rsi(&cols.close, p.rsi_period);
                let rsi = cols.at_end(&line, p.rsi_period + 1, "RSI")?;
                let neutral = (p.rsi_neutral_low..=p.rsi_neutral_high).contains(&rsi);
                let oversold = p.rsi_oversold.is_some_and(|level| rsi < level);
                Ok(neutral || oversold)
            },
            TechnicalRule::Bbands => {
                let bands = indicators::bollinger(&cols.close, p.bband_period, p.bband_width);
                let need = p.bband_period + 1;
                let middle = cols.at_end(&bands.middle, need, "Bollinger middle")?;
                let middle_before = cols.before_end(&bands.middle, need, "Bollinger middle")?;
                let anchor = match p.bband_anchor {
                    BandAnchor::Middle => middle,
                    BandAnchor::Lower => cols.at_end(&bands.lower, need, "Bollinger lower")?,
                };
                Ok(close > anchor && middle > middle_before)
            },
            TechnicalRule::Adx => {
                let line = indicators::adx(&cols.high, &cols.low, &cols.close, p.adx_period);
                Ok(cols.at_end(&line, 2 * p.adx_period, "ADX")? >= p.adx_threshold)
            },
            TechnicalRule::Obv => {
                let change = indicators::diff(&indicators::obv(&cols.close, &cols.volume));
                Ok(cols.at_end(&change, 2, "OBV")? > 0.0)
            },
            TechnicalRule::Atr => {
                let atr = indicators::atr(&cols.high, &cols.low, &cols.close, p.atr_period);
                let average = indicators::rolling_mean(&atr, p.atr_average_period);
                let need = p.atr_period + p.atr_average_period;
                Ok(cols.at_end(&atr, need, "ATR")? < cols.at_end(&average, need, "ATR average")?)
            },
            TechnicalRule::Sar => {
                let sar =
                    indicators::parabolic_sar(&cols.high, &cols.low, p.sar_acceleration, p.sar_maximum);
                Ok(close > cols.at_end(&sar, 2, "SAR")?)
            },
            TechnicalRule::GoldenCross => {
                let fast = indicators::sma(&cols.close, p.golden_fast);
                let slow = indicators::sma(&cols.close, p.golden_slow);
                let need = p.golden_slow.max(p.golden_fast + 1);
                let fast_now = cols.at_end(&fast, need, "fast SMA")?;
                let fast_before = cols.before_end(&fast, need, "fast SMA")?;
                let slow_now = cols.at_end(&slow, need, "slow SMA")?;
                Ok(fast_now > slow_now && fast_now > fast_before)
            },
        }
    }
}
