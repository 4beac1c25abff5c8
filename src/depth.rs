//! Depth validation: accept or reject a hand detection using the stereo
//! depth map, with a distance-aware variance tolerance.
//!
//! Depth noise grows with range, so the allowed standard deviation over the
//! sampled region widens as the hand moves away.  The sampled region itself
//! also grows for far hands, where the apparent hand size shrinks and a
//! small window would under-sample.

use serde::Deserialize;
use tracing::debug;

use crate::hand::Point;

// ── DepthMap ───────────────────────────────────────────────

/// A depth map aligned to the camera frame.  Values are millimeters;
/// zero marks an invalid (unmatched) pixel.
#[derive(Debug, Clone)]
pub struct DepthMap {
    width: usize,
    height: usize,
    data: Vec<u16>,
}

impl DepthMap {
    /// Build a map from row-major data.  A size mismatch is "no map".
    pub fn new(width: usize, height: usize, data: Vec<u16>) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Depth at a pixel, or `None` when outside the map.
    pub fn get(&self, x: i64, y: i64) -> Option<u16> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }
}

/// Per-frame depth record from the upstream detector.
#[derive(Debug, Deserialize)]
pub struct DepthRecord {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl DepthRecord {
    pub fn into_map(self) -> Option<DepthMap> {
        DepthMap::new(self.width, self.height, self.data)
    }
}

// ── Config ─────────────────────────────────────────────────

/// Depth validation thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Nearest acceptable center depth (mm).
    pub min_depth_mm: u16,
    /// Farthest acceptable center depth (mm).
    pub max_depth_mm: u16,
    /// ROI half-width (px) for hands nearer than `roi_pivot_mm`.
    pub roi_half_near: i64,
    /// ROI half-width (px) for hands at or beyond `roi_pivot_mm`.
    pub roi_half_far: i64,
    /// Center depth at which the ROI switches from near to far sizing (mm).
    pub roi_pivot_mm: u16,
    /// Minimum count of valid pixels in the ROI.
    pub min_valid_pixels: usize,
    /// Allowed std at and below `tolerance_pivot_mm` (mm).
    pub base_tolerance_mm: f32,
    /// Extra allowed std per mm of mean depth beyond the pivot.
    pub tolerance_slope: f32,
    /// Mean depth where the tolerance starts widening (mm).
    pub tolerance_pivot_mm: f32,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            min_depth_mm: 300,
            max_depth_mm: 2000,
            roi_half_near: 18,
            roi_half_far: 26,
            roi_pivot_mm: 1000,
            min_valid_pixels: 30,
            base_tolerance_mm: 80.0,
            tolerance_slope: 0.08,
            tolerance_pivot_mm: 800.0,
        }
    }
}

// ── Verdict ────────────────────────────────────────────────

/// Why a detection was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthRejection {
    /// Hand center falls outside the depth map.
    OutsideMap,
    /// Center depth invalid or outside the working range.
    OutOfRange,
    /// Too few valid depth samples around the center.
    TooFewSamples,
    /// Depth variance over the ROI exceeds the distance-aware limit.
    Unstable,
}

impl DepthRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutsideMap => "outside-map",
            Self::OutOfRange => "out-of-range",
            Self::TooFewSamples => "too-few-samples",
            Self::Unstable => "unstable",
        }
    }
}

/// Result of validating one detection against the depth map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthCheck {
    Accepted {
        /// Mean depth over valid ROI pixels (mm).
        mean_mm: f32,
        /// 1 - std/limit, clipped to [0,1].
        confidence: f32,
    },
    Rejected(DepthRejection),
}

impl DepthCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

// ── Validator ──────────────────────────────────────────────

/// Stateless depth gate for hand detections.
#[derive(Debug, Clone)]
pub struct DepthValidator {
    pub config: DepthConfig,
}

impl DepthValidator {
    pub fn new(config: DepthConfig) -> Self {
        Self { config }
    }

    /// Validate a hand center against the depth map.
    pub fn check(&self, center: Point, map: &DepthMap) -> DepthCheck {
        let cx = center.x.round() as i64;
        let cy = center.y.round() as i64;

        let center_depth = match map.get(cx, cy) {
            Some(d) => d,
            None => return DepthCheck::Rejected(DepthRejection::OutsideMap),
        };
        if center_depth == 0
            || center_depth < self.config.min_depth_mm
            || center_depth > self.config.max_depth_mm
        {
            return DepthCheck::Rejected(DepthRejection::OutOfRange);
        }

        let half = if center_depth < self.config.roi_pivot_mm {
            self.config.roi_half_near
        } else {
            self.config.roi_half_far
        };

        // Mean/std over valid pixels in the clipped square ROI.
        let x1 = (cx - half).max(0);
        let x2 = (cx + half).min(map.width() as i64 - 1);
        let y1 = (cy - half).max(0);
        let y2 = (cy + half).min(map.height() as i64 - 1);

        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for y in y1..=y2 {
            for x in x1..=x2 {
                if let Some(d) = map.get(x, y) {
                    if d > 0 {
                        let v = d as f64;
                        count += 1;
                        sum += v;
                        sum_sq += v * v;
                    }
                }
            }
        }

        if count < self.config.min_valid_pixels {
            return DepthCheck::Rejected(DepthRejection::TooFewSamples);
        }

        let mean = sum / count as f64;
        let var = (sum_sq / count as f64 - mean * mean).max(0.0);
        let std = var.sqrt() as f32;
        let mean = mean as f32;

        let limit = self.config.base_tolerance_mm
            + self.config.tolerance_slope * (mean - self.config.tolerance_pivot_mm).max(0.0);
        if std > limit {
            debug!(mean_mm = mean, std_mm = std, limit_mm = limit, "depth gate: unstable");
            return DepthCheck::Rejected(DepthRejection::Unstable);
        }

        let confidence = (1.0 - std / limit.max(1.0)).clamp(0.0, 1.0);
        DepthCheck::Accepted {
            mean_mm: mean,
            confidence,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_map(size: usize, value: u16) -> DepthMap {
        DepthMap::new(size, size, vec![value; size * size]).unwrap()
    }

    #[test]
    fn test_map_size_mismatch_is_none() {
        assert!(DepthMap::new(4, 4, vec![0; 15]).is_none());
        assert!(DepthMap::new(0, 4, vec![]).is_none());
        assert!(DepthMap::new(4, 4, vec![0; 16]).is_some());
    }

    #[test]
    fn test_accepts_flat_region() {
        let validator = DepthValidator::new(DepthConfig::default());
        let map = flat_map(64, 800);
        match validator.check(Point::new(32.0, 32.0), &map) {
            DepthCheck::Accepted {
                mean_mm,
                confidence,
            } => {
                assert!((mean_mm - 800.0).abs() < 0.5);
                // Zero variance over a flat plate: full confidence.
                assert!((confidence - 1.0).abs() < 1e-6);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        let validator = DepthValidator::new(DepthConfig::default());
        let too_near = flat_map(64, 200);
        assert_eq!(
            validator.check(Point::new(32.0, 32.0), &too_near),
            DepthCheck::Rejected(DepthRejection::OutOfRange),
        );
        let too_far = flat_map(64, 2500);
        assert_eq!(
            validator.check(Point::new(32.0, 32.0), &too_far),
            DepthCheck::Rejected(DepthRejection::OutOfRange),
        );
        let invalid = flat_map(64, 0);
        assert_eq!(
            validator.check(Point::new(32.0, 32.0), &invalid),
            DepthCheck::Rejected(DepthRejection::OutOfRange),
        );
    }

    #[test]
    fn test_rejects_outside_map() {
        let validator = DepthValidator::new(DepthConfig::default());
        let map = flat_map(64, 800);
        assert_eq!(
            validator.check(Point::new(-5.0, 10.0), &map),
            DepthCheck::Rejected(DepthRejection::OutsideMap),
        );
        assert_eq!(
            validator.check(Point::new(10.0, 200.0), &map),
            DepthCheck::Rejected(DepthRejection::OutsideMap),
        );
    }

    #[test]
    fn test_rejects_sparse_roi() {
        let validator = DepthValidator::new(DepthConfig::default());
        // Valid center pixel but everything around it invalid.
        let size = 64;
        let mut data = vec![0u16; size * size];
        data[32 * size + 32] = 800;
        let map = DepthMap::new(size, size, data).unwrap();
        assert_eq!(
            validator.check(Point::new(32.0, 32.0), &map),
            DepthCheck::Rejected(DepthRejection::TooFewSamples),
        );
    }

    #[test]
    fn test_rejects_high_variance() {
        let validator = DepthValidator::new(DepthConfig::default());
        // Alternate 500/1100 mm: mean 800, std ~300 against an 80 mm limit.
        let size = 64;
        let data: Vec<u16> = (0..size * size)
            .map(|i| if i % 2 == 0 { 500 } else { 1100 })
            .collect();
        let map = DepthMap::new(size, size, data).unwrap();
        assert_eq!(
            validator.check(Point::new(32.0, 32.0), &map),
            DepthCheck::Rejected(DepthRejection::Unstable),
        );
    }

    #[test]
    fn test_tolerance_widens_with_distance() {
        let validator = DepthValidator::new(DepthConfig::default());
        // std ~100 mm would fail the 80 mm base limit, but at 1800 mm mean
        // the limit is 80 + 0.08 * 1000 = 160.
        let size = 64;
        let data: Vec<u16> = (0..size * size)
            .map(|i| if i % 2 == 0 { 1700 } else { 1900 })
            .collect();
        let map = DepthMap::new(size, size, data).unwrap();
        assert!(validator.check(Point::new(32.0, 32.0), &map).is_accepted());

        // The same spread at 800 mm mean fails: limit stays at 80.
        let data: Vec<u16> = (0..size * size)
            .map(|i| if i % 2 == 0 { 700 } else { 900 })
            .collect();
        let map = DepthMap::new(size, size, data).unwrap();
        assert_eq!(
            validator.check(Point::new(32.0, 32.0), &map),
            DepthCheck::Rejected(DepthRejection::Unstable),
        );
    }

    #[test]
    fn test_far_hand_uses_wider_roi() {
        let config = DepthConfig::default();
        let validator = DepthValidator::new(config);
        // Far plate at 1500 mm with a valid ring only between the near and
        // far ROI radii: the wide ROI must pick those pixels up.
        let size = 80;
        let c = 40i64;
        let mut data = vec![0u16; size * size];
        for y in 0..size as i64 {
            for x in 0..size as i64 {
                let d = (x - c).abs().max((y - c).abs());
                if (d > 18 && d <= 26) || (x == c && y == c) {
                    data[(y as usize) * size + x as usize] = 1500;
                }
            }
        }
        let map = DepthMap::new(size, size, data).unwrap();
        assert!(validator.check(Point::new(40.0, 40.0), &map).is_accepted());
    }

    #[test]
    fn test_depth_record_into_map() {
        let record = DepthRecord {
            width: 2,
            height: 2,
            data: vec![1, 2, 3, 4],
        };
        let map = record.into_map().unwrap();
        assert_eq!(map.get(1, 1), Some(4));
        assert_eq!(map.get(2, 0), None);
    }
}
