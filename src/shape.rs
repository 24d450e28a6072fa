//! Cup-with-handle chart shape detection.
//!
//! A cup is a decline from a peak into a trough followed by a climb back out;
//! the handle is a shallow pullback over the most recent bars, ideally on
//! rising volume. The detector is binary: the shape either qualifies or is
//! rejected with the first condition it failed.

use serde::{Deserialize, Serialize};

use crate::indicators::mean;
use crate::params::{as_flag, as_period, ParamMeta, Tunable};
use crate::{Result, ScoreError, Series};

// ============================================================
// PARAMETERS
// ============================================================

/// Tunable thresholds of the cup-with-handle detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CupHandleParams {
    /// Inclusive minimum series length
    pub min_bars: usize,
    /// Cup depth band `1 - trough / peak`
    pub depth_min: f64,
    pub depth_max: f64,
    /// Minimum climb from the trough to the last close
    pub recovery_min: f64,
    /// Bars in each half of the handle comparison
    pub handle_window: usize,
    /// Required relative drop of the recent-half mean
    pub pullback_epsilon: f64,
    /// Maximum drawdown from the previous half's high to the recent half's low
    pub handle_drop_max: f64,
    pub require_volume_confirmation: bool,
    pub volume_window: usize,
    pub volume_reference_window: usize,
    /// Whether too little history for the volume check counts as a pass
    pub volume_missing_passes: bool,
}

impl Default for CupHandleParams {
    fn default() -> Self {
        Self {
            min_bars: 40,
            depth_min: 0.10,
            depth_max: 0.40,
            recovery_min: 0.15,
            handle_window: 10,
            pullback_epsilon: 0.005,
            handle_drop_max: 0.15,
            require_volume_confirmation: true,
            volume_window: 10,
            volume_reference_window: 20,
            volume_missing_passes: false,
        }
    }
}

impl CupHandleParams {
    pub fn with_defaults() -> Self {
        Self::default()
    }
}

static CUP_HANDLE_PARAMS: [ParamMeta; 11] = [
    ParamMeta::period("min_bars", 40.0, (2.0, 1000.0, 10.0), "Inclusive minimum series length"),
    ParamMeta::ratio("depth_min", 0.10, (0.0, 1.0, 0.05), "Minimum cup depth (1 - trough/peak)"),
    ParamMeta::ratio("depth_max", 0.40, (0.0, 1.0, 0.05), "Maximum cup depth (1 - trough/peak)"),
    ParamMeta::ratio("recovery_min", 0.15, (0.0, 10.0, 0.05), "Minimum climb from trough to last close"),
    ParamMeta::period("handle_window", 10.0, (1.0, 250.0, 1.0), "Bars in each handle half"),
    ParamMeta::ratio("pullback_epsilon", 0.005, (0.0, 1.0, 0.005), "Required relative drop of the recent-half mean"),
    ParamMeta::ratio("handle_drop_max", 0.15, (0.0, 1.0, 0.05), "Max drawdown from previous-half high to recent-half low"),
    ParamMeta::flag("require_volume_confirmation", true, "Require rising volume"),
    ParamMeta::period("volume_window", 10.0, (1.0, 250.0, 1.0), "Recent volume bars"),
    ParamMeta::period("volume_reference_window", 20.0, (1.0, 250.0, 1.0), "Reference volume bars before the recent ones"),
    ParamMeta::flag("volume_missing_passes", false, "Short history passes the volume check"),
];

impl Tunable for CupHandleParams {
    fn param_meta() -> &'static [ParamMeta] {
        &CUP_HANDLE_PARAMS
    }

    fn get_param(&self, name: &str) -> Option<f64> {
        let value = match name {
            "min_bars" => self.min_bars as f64,
            "depth_min" => self.depth_min,
            "depth_max" => self.depth_max,
            "recovery_min" => self.recovery_min,
            "handle_window" => self.handle_window as f64,
            "pullback_epsilon" => self.pullback_epsilon,
            "handle_drop_max" => self.handle_drop_max,
            "require_volume_confirmation" => f64::from(u8::from(self.require_volume_confirmation)),
            "volume_window" => self.volume_window as f64,
            "volume_reference_window" => self.volume_reference_window as f64,
            "volume_missing_passes" => f64::from(u8::from(self.volume_missing_passes)),
            _ => return None,
        };
        Some(value)
    }

    fn set_param(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            "min_bars" => self.min_bars = as_period(value),
            "depth_min" => self.depth_min = value,
            "depth_max" => self.depth_max = value,
            "recovery_min" => self.recovery_min = value,
            "handle_window" => self.handle_window = as_period(value),
            "pullback_epsilon" => self.pullback_epsilon = value,
            "handle_drop_max" => self.handle_drop_max = value,
            "require_volume_confirmation" => self.require_volume_confirmation = as_flag(value),
            "volume_window" => self.volume_window = as_period(value),
            "volume_reference_window" => self.volume_reference_window = as_period(value),
            "volume_missing_passes" => self.volume_missing_passes = as_flag(value),
            _ => return Err(ScoreError::InvalidConfig(format!("unknown shape parameter `{name}`"))),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let ratios = [
            ("depth_min", self.depth_min),
            ("depth_max", self.depth_max),
            ("pullback_epsilon", self.pullback_epsilon),
            ("handle_drop_max", self.handle_drop_max),
        ];
        for (field, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScoreError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if !self.recovery_min.is_finite() || self.recovery_min < 0.0 {
            return Err(ScoreError::InvalidValue("recovery_min must be a non-negative number"));
        }
        if self.depth_min > self.depth_max {
            return Err(ScoreError::InvalidConfig(format!(
                "depth_min ({}) exceeds depth_max ({})",
                self.depth_min, self.depth_max
            )));
        }
        if self.handle_window == 0 || self.volume_window == 0 || self.volume_reference_window == 0 {
            return Err(ScoreError::InvalidValue("shape windows must be > 0"));
        }
        if self.min_bars < 2 * self.handle_window {
            return Err(ScoreError::InvalidConfig(format!(
                "min_bars ({}) is shorter than two handle windows ({})",
                self.min_bars,
                2 * self.handle_window
            )));
        }
        Ok(())
    }
}

// ============================================================
// VERDICT
// ============================================================

/// Why a series did not qualify as a cup with handle.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ShapeRejection {
    #[error("need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("peak close is not positive")]
    NonPositivePeak,

    #[error("cup depth {depth:.3} outside the accepted band")]
    DepthOutOfBand { depth: f64 },

    #[error("recovery {recovery:.3} from the trough is too weak")]
    WeakRecovery { recovery: f64 },

    #[error("no pullback into a handle")]
    NoPullback,

    #[error("handle drawdown {drop:.3} is too deep")]
    HandleTooDeep { drop: f64 },

    #[error("recent volume is not above the reference window")]
    VolumeNotRising,

    #[error("too little history for the volume check")]
    VolumeHistoryMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ShapeVerdict {
    Detected,
    Rejected(ShapeRejection),
}

impl ShapeVerdict {
    #[inline]
    pub fn is_detected(&self) -> bool {
        matches!(self, ShapeVerdict::Detected)
    }

    pub fn rejection(&self) -> Option<&ShapeRejection> {
        match self {
            ShapeVerdict::Detected => None,
            ShapeVerdict::Rejected(r) => Some(r),
        }
    }
}

// ============================================================
// DETECTOR
// ============================================================

/// Cup-with-handle detector. Stateless apart from its parameters.
#[derive(Debug, Clone, Default)]
pub struct CupHandleDetector {
    params: CupHandleParams,
}

impl CupHandleDetector {
    /// Build a detector, rejecting inconsistent parameters.
    pub fn new(params: CupHandleParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &CupHandleParams {
        &self.params
    }

    /// True when every active condition holds.
    pub fn detect(&self, series: &Series) -> bool {
        self.evaluate(series).is_detected()
    }

    /// Check every condition in order and report the first failure.
    pub fn evaluate(&self, series: &Series) -> ShapeVerdict {
        match self.check(series) {
            Ok(()) => ShapeVerdict::Detected,
            Err(r) => ShapeVerdict::Rejected(r),
        }
    }

    fn check(&self, series: &Series) -> std::result::Result<(), ShapeRejection> {
        let p = &self.params;
        let closes = series.closes();
        let n = closes.len();

        if n < p.min_bars || n < 2 * p.handle_window {
            return Err(ShapeRejection::InsufficientData {
                need: p.min_bars.max(2 * p.handle_window),
                got: n,
            });
        }

        // trough: first occurrence of the lowest close
        let (trough_at, trough) = closes
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, c)| if c < best.1 { (i, c) } else { best });

        let left_peak = if trough_at == 0 {
            closes[0]
        } else {
            max_of(&closes[..trough_at])
        };
        let right_peak = max_of(&closes[trough_at..]);
        let peak = left_peak.max(right_peak);
        if !peak.is_finite() || peak <= 0.0 {
            return Err(ShapeRejection::NonPositivePeak);
        }

        let depth = 1.0 - trough / peak;
        if depth < p.depth_min || depth > p.depth_max {
            return Err(ShapeRejection::DepthOutOfBand { depth });
        }

        let last = closes[n - 1];
        let recovery = if trough > 0.0 {
            (last - trough) / trough
        } else {
            f64::NAN
        };
        if recovery.is_nan() || recovery < p.recovery_min {
            return Err(ShapeRejection::WeakRecovery { recovery });
        }

        self.check_handle(&closes)?;

        if p.require_volume_confirmation {
            self.check_volume(&series.volumes())?;
        }

        Ok(())
    }

    fn check_handle(&self, closes: &[f64]) -> std::result::Result<(), ShapeRejection> {
        let p = &self.params;
        let n = closes.len();
        let recent = &closes[n - p.handle_window..];
        let previous = &closes[n - 2 * p.handle_window..n - p.handle_window];

        let (Some(recent_mean), Some(previous_mean)) = (mean(recent), mean(previous)) else {
            return Err(ShapeRejection::NoPullback);
        };
        if recent_mean > previous_mean * (1.0 - p.pullback_epsilon) {
            return Err(ShapeRejection::NoPullback);
        }

        let previous_high = max_of(previous);
        let recent_low = recent.iter().copied().fold(f64::INFINITY, f64::min);
        let drop = (previous_high - recent_low) / previous_high;
        if drop > p.handle_drop_max {
            return Err(ShapeRejection::HandleTooDeep { drop });
        }
        Ok(())
    }

    fn check_volume(&self, volumes: &[f64]) -> std::result::Result<(), ShapeRejection> {
        let p = &self.params;
        let n = volumes.len();
        let needed = p.volume_window + p.volume_reference_window;
        if n < needed {
            return if p.volume_missing_passes {
                Ok(())
            } else {
                Err(ShapeRejection::VolumeHistoryMissing)
            };
        }

        let split = n - p.volume_window;
        let recent = mean(&volumes[split..]);
        let reference = mean(&volumes[split - p.volume_reference_window..split]);
        match (recent, reference) {
            (Some(r), Some(f)) if r > f => Ok(()),
            _ => Err(ShapeRejection::VolumeNotRising),
        }
    }
}

#[inline]
fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}
