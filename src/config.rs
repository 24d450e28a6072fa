//! Scoring and scan configuration.
//!
//! Every struct carries its defaults in a `Default` impl and deserializes with
//! `#[serde(default)]`, so a JSON file only needs the keys it changes.
//!
//! ```json
//! {
//!   "scoring": {
//!     "bands": { "technical_max": 25, "pattern_max": 25 },
//!     "shape": { "depth_max": 0.35 },
//!     "indicators": ["SMA", "MACD", "GOLDENCROSS"]
//!   },
//!   "scan": { "max_concurrency": 4, "lookback": "1y" }
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::aggregate::ScoreBands;
use crate::history::Lookback;
use crate::params::Tunable;
use crate::pattern::{PatternTable, DEFAULT_WINDOW};
use crate::shape::CupHandleParams;
use crate::technical::{TechnicalParams, TechnicalRule, TechnicalTable};
use crate::{Result, ScoreError};

// ============================================================
// SCORING
// ============================================================

/// Everything the scoring pipeline needs for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub bands: ScoreBands,
    pub shape: CupHandleParams,
    pub technical: TechnicalParams,
    pub technical_table: TechnicalTable,
    pub pattern_table: PatternTable,
    /// Trailing bars searched for pattern hits
    pub pattern_window: usize,
    /// Selected technical rules, evaluated in this order
    pub indicators: Vec<String>,
    /// Selected candlestick patterns, evaluated in this order
    pub patterns: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let pattern_table = PatternTable::default();
        Self {
            bands: ScoreBands::default(),
            shape: CupHandleParams::default(),
            technical: TechnicalParams::default(),
            technical_table: TechnicalTable::default(),
            patterns: pattern_table.names().map(str::to_string).collect(),
            pattern_table,
            pattern_window: DEFAULT_WINDOW,
            indicators: TechnicalRule::ALL.iter().map(|r| r.name().to_string()).collect(),
        }
    }
}

impl ScoringConfig {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Structural checks only. Unknown signal names are not an error here;
    /// the scorers record them as skipped.
    pub fn validate(&self) -> Result<()> {
        self.bands.validate()?;
        self.shape.validate()?;
        self.technical.validate()?;
        if self.pattern_window == 0 {
            return Err(ScoreError::InvalidValue("pattern_window must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// SCAN
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads fetching and scoring in parallel
    pub max_concurrency: usize,
    /// Pause after each completed instrument, per worker
    pub pacing_ms: u64,
    pub lookback: Lookback,
    /// Appended to each instrument code to form the provider symbol
    pub symbol_suffix: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            pacing_ms: 150,
            lookback: Lookback::ThreeMonths,
            symbol_suffix: String::new(),
        }
    }
}

impl ScanConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ScoreError::InvalidValue("max_concurrency must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// TOP LEVEL
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub scan: ScanConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.scan.validate()
    }
}

/// Read a JSON config file, fill missing keys with defaults and validate.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

// ============================================================
// PROFILES
// ============================================================

/// Named presets for the score bands and history length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreProfile {
    /// 50 / 30 / 20 over three months
    #[default]
    Swing,
    /// 50 / 25 / 25 over one year
    Balanced,
}

impl ScoreProfile {
    pub const ALL: [ScoreProfile; 2] = [ScoreProfile::Swing, ScoreProfile::Balanced];

    pub fn bands(self) -> ScoreBands {
        match self {
            ScoreProfile::Swing => ScoreBands::default(),
            ScoreProfile::Balanced => ScoreBands {
                shape_weight: 50.0,
                technical_max: 25,
                pattern_max: 25,
            },
        }
    }

    pub fn lookback(self) -> Lookback {
        match self {
            ScoreProfile::Swing => Lookback::ThreeMonths,
            ScoreProfile::Balanced => Lookback::OneYear,
        }
    }

    pub fn config(self) -> Config {
        let mut config = Config::default();
        config.scoring.bands = self.bands();
        config.scan.lookback = self.lookback();
        config
    }
}

impl fmt::Display for ScoreProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreProfile::Swing => f.write_str("swing"),
            ScoreProfile::Balanced => f.write_str("balanced"),
        }
    }
}

impl FromStr for ScoreProfile {
    type Err = ScoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swing" => Ok(ScoreProfile::Swing),
            "balanced" => Ok(ScoreProfile::Balanced),
            other => Err(ScoreError::InvalidConfig(format!("unknown profile `{other}`"))),
        }
    }
}
