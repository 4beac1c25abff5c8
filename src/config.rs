//! Pipeline configuration: one JSON document covering every stage, with
//! defaults for anything omitted.  Validation happens once at startup so
//! the per-frame code never re-checks its parameters.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::depth::DepthConfig;
use crate::gesture::{ClassifierConfig, DebounceConfig};
use crate::rotation::AngleConfig;
use crate::swipe::SwipeConfig;

// ── Errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("zone_boundaries must not be empty")]
    EmptyBoundaries,
    #[error("zone boundary {0} outside the open interval (0, 180)")]
    BoundaryOutOfRange(f32),
    #[error("zone boundaries must be strictly increasing ({prev} then {next})")]
    BoundariesNotIncreasing { prev: f32, next: f32 },
    #[error("{name} must be at least 1")]
    ZeroLength { name: &'static str },
    #[error("depth range inverted: min {min} mm, max {max} mm")]
    DepthRangeInverted { min: u16, max: u16 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("swipe duration window inverted: min {min} s, max {max} s")]
    DurationWindowInverted { min: f64, max: f64 },
    #[error("swipe velocity window inverted: min {min} px/s, max {max} px/s")]
    VelocityWindowInverted { min: f32, max: f32 },
}

// ── PipelineConfig ─────────────────────────────────────────

/// Top-level configuration for the whole pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub depth: DepthConfig,
    pub classifier: ClassifierConfig,
    pub debounce: DebounceConfig,
    pub angle: AngleConfig,
    pub swipe: SwipeConfig,
    /// Strictly increasing zone boundaries in degrees; N boundaries
    /// define N+1 rotation zones over [0, 180].
    pub zone_boundaries: Vec<f32>,
    /// Seconds without a hand before the no-hand event fires.
    pub no_hand_delay_s: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            depth: DepthConfig::default(),
            classifier: ClassifierConfig::default(),
            debounce: DebounceConfig::default(),
            angle: AngleConfig::default(),
            swipe: SwipeConfig::default(),
            zone_boundaries: vec![60.0, 90.0, 120.0],
            no_hand_delay_s: 3.0,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zone_boundaries.is_empty() {
            return Err(ConfigError::EmptyBoundaries);
        }
        for b in &self.zone_boundaries {
            if !(*b > 0.0 && *b < 180.0) {
                return Err(ConfigError::BoundaryOutOfRange(*b));
            }
        }
        for pair in self.zone_boundaries.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ConfigError::BoundariesNotIncreasing {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }

        if self.angle.smoothing_window == 0 {
            return Err(ConfigError::ZeroLength {
                name: "angle.smoothing_window",
            });
        }
        if self.angle.calibration_samples == 0 {
            return Err(ConfigError::ZeroLength {
                name: "angle.calibration_samples",
            });
        }
        if self.debounce.open_streak == 0 {
            return Err(ConfigError::ZeroLength {
                name: "debounce.open_streak",
            });
        }
        if self.debounce.fist_streak == 0 {
            return Err(ConfigError::ZeroLength {
                name: "debounce.fist_streak",
            });
        }

        if self.depth.min_depth_mm >= self.depth.max_depth_mm {
            return Err(ConfigError::DepthRangeInverted {
                min: self.depth.min_depth_mm,
                max: self.depth.max_depth_mm,
            });
        }

        if self.swipe.buffer_len == 0 {
            return Err(ConfigError::ZeroLength {
                name: "swipe.buffer_len",
            });
        }
        if self.swipe.start_samples < 2 || self.swipe.start_samples > self.swipe.buffer_len {
            return Err(ConfigError::ZeroLength {
                name: "swipe.start_samples",
            });
        }
        if self.swipe.min_distance_px <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "swipe.min_distance_px",
                value: self.swipe.min_distance_px as f64,
            });
        }
        if self.swipe.min_duration_s >= self.swipe.max_duration_s {
            return Err(ConfigError::DurationWindowInverted {
                min: self.swipe.min_duration_s,
                max: self.swipe.max_duration_s,
            });
        }
        if self.swipe.min_velocity >= self.swipe.max_velocity {
            return Err(ConfigError::VelocityWindowInverted {
                min: self.swipe.min_velocity,
                max: self.swipe.max_velocity,
            });
        }
        if self.no_hand_delay_s <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "no_hand_delay_s",
                value: self.no_hand_delay_s,
            });
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"zone_boundaries": [45.0, 135.0], "swipe": {"min_distance_px": 120.0}}"#,
        )
        .unwrap();
        assert_eq!(config.zone_boundaries, vec![45.0, 135.0]);
        assert_eq!(config.swipe.min_distance_px, 120.0);
        // Everything not mentioned stays at its default.
        assert_eq!(config.swipe.buffer_len, 18);
        assert_eq!(config.no_hand_delay_s, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_boundaries() {
        let mut config = PipelineConfig::default();
        config.zone_boundaries = vec![];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyBoundaries)
        ));

        config.zone_boundaries = vec![60.0, 60.0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoundariesNotIncreasing { .. })
        ));

        config.zone_boundaries = vec![0.0, 90.0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoundaryOutOfRange(_))
        ));

        config.zone_boundaries = vec![90.0, 181.0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoundaryOutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_windows() {
        let mut config = PipelineConfig::default();
        config.swipe.min_duration_s = 3.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationWindowInverted { .. })
        ));

        let mut config = PipelineConfig::default();
        config.depth.min_depth_mm = 2500;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DepthRangeInverted { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_lengths() {
        let mut config = PipelineConfig::default();
        config.angle.smoothing_window = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLength { .. })
        ));
    }
}
