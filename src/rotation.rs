//! Wrist rotation: raw angle estimation, median smoothing, neutral-pose
//! calibration, and the pure angle-to-zone mapping.
//!
//! Angle convention (y-down screen coordinates): fingers pointing at the
//! physical LEFT edge of the frame read ~0°, straight UP reads ~90°, and
//! RIGHT reads ~180°.  The sign handling here was a recurring source of
//! mirroring bugs upstream, so the convention is pinned by tests against
//! physical left/up/right vectors rather than trusted from the formula.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::debug;

use crate::hand::{landmark, LandmarkFrame};

// ── Raw angle ──────────────────────────────────────────────

/// Wrist rotation angle in degrees, from the wrist→middle-MCP vector.
/// Returns `None` for a degenerate (near zero-length) vector.
pub fn wrist_angle(frame: &LandmarkFrame) -> Option<f32> {
    let wrist = frame.point(landmark::WRIST);
    let mcp = frame.point(landmark::MIDDLE_MCP);
    let dx = mcp.x - wrist.x;
    let dy = mcp.y - wrist.y;
    if (dx * dx + dy * dy).sqrt() < 1e-3 {
        return None;
    }

    // atan2 with y negated for image coordinates, folded to orientation
    // (0..180), then inverted so LEFT=0 and RIGHT=180.
    let mut ang = (-dy).atan2(dx).to_degrees();
    if ang < 0.0 {
        ang += 360.0;
    }
    if ang > 180.0 {
        ang = 360.0 - ang;
    }
    ang = 180.0 - ang;
    Some(ang.clamp(0.0, 180.0))
}

// ── Config ─────────────────────────────────────────────────

/// Angle smoothing and calibration parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AngleConfig {
    /// Median window length over raw samples.
    pub smoothing_window: usize,
    /// A raw sample further than this from the previous accepted sample
    /// is treated as a landmark teleport and replaced by it (degrees).
    pub max_jump_deg: f32,
    /// Smoothed samples collected before the neutral offset is fixed.
    pub calibration_samples: usize,
}

impl Default for AngleConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            max_jump_deg: 30.0,
            calibration_samples: 10,
        }
    }
}

// ── Smoother ───────────────────────────────────────────────

/// Bounded-FIFO median smoother with spike rejection.  Median rather
/// than mean: one teleported landmark frame must not drag the output.
/// The rejection gate is itself bounded, so a sustained jump to a new
/// orientation gets through after a few frames instead of latching.
#[derive(Debug, Clone)]
pub struct AngleSmoother {
    window: VecDeque<f32>,
    capacity: usize,
    max_jump_deg: f32,
    last_accepted: Option<f32>,
    rejected_streak: u32,
}

/// Out-of-range samples in a row before the gate concedes the hand
/// really is at a new orientation (e.g. after a tracking gap) rather
/// than teleporting for a frame.
const MAX_REJECTED_STREAK: u32 = 3;

impl AngleSmoother {
    pub fn new(capacity: usize, max_jump_deg: f32) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            max_jump_deg,
            last_accepted: None,
            rejected_streak: 0,
        }
    }

    /// Push one raw sample and return the current median.
    pub fn push(&mut self, raw: f32) -> f32 {
        let accepted = match self.last_accepted {
            Some(prev) if (raw - prev).abs() > self.max_jump_deg => {
                self.rejected_streak += 1;
                if self.rejected_streak >= MAX_REJECTED_STREAK {
                    self.rejected_streak = 0;
                    raw
                } else {
                    prev
                }
            }
            _ => {
                self.rejected_streak = 0;
                raw
            }
        };
        self.last_accepted = Some(accepted);

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(accepted);
        median(self.window.iter().copied())
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_accepted = None;
        self.rejected_streak = 0;
    }
}

/// Median of a non-empty sequence (mean of the middle pair when even).
fn median(values: impl Iterator<Item = f32>) -> f32 {
    let mut v: Vec<f32> = values.collect();
    debug_assert!(!v.is_empty());
    v.sort_by(f32::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

// ── Calibrator ─────────────────────────────────────────────

/// Neutral-pose calibration: the median of the first N smoothed angles
/// defines the user's relaxed pose, which is shifted onto 90°.
#[derive(Debug, Clone)]
pub struct Calibrator {
    samples: Vec<f32>,
    needed: usize,
    offset: f32,
    calibrated: bool,
}

impl Calibrator {
    pub fn new(needed: usize) -> Self {
        Self {
            samples: Vec::with_capacity(needed),
            needed,
            offset: 0.0,
            calibrated: false,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Feed one smoothed angle.  During collection the angle passes
    /// through unchanged; from the completing sample onward the neutral
    /// offset is applied and the result clamped to [0,180].
    pub fn feed(&mut self, angle: f32) -> f32 {
        if !self.calibrated {
            self.samples.push(angle);
            if self.samples.len() >= self.needed {
                let neutral = median(self.samples.iter().copied());
                self.offset = 90.0 - neutral;
                self.calibrated = true;
                self.samples.clear();
                debug!(offset_deg = self.offset, "neutral calibration complete");
            } else {
                return angle;
            }
        }
        (angle + self.offset).clamp(0.0, 180.0)
    }

    /// Drop the offset and collected samples, forcing recalibration.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.offset = 0.0;
        self.calibrated = false;
    }
}

// ── Tracker ────────────────────────────────────────────────

/// Full angle chain: raw estimate → spike gate → median → calibration.
#[derive(Debug, Clone)]
pub struct AngleTracker {
    smoother: AngleSmoother,
    calibrator: Calibrator,
    last_angle: Option<f32>,
}

impl AngleTracker {
    pub fn new(config: &AngleConfig) -> Self {
        Self {
            smoother: AngleSmoother::new(config.smoothing_window, config.max_jump_deg),
            calibrator: Calibrator::new(config.calibration_samples),
            last_angle: None,
        }
    }

    /// Process one frame; `None` when no usable angle this frame.
    pub fn update(&mut self, frame: &LandmarkFrame) -> Option<f32> {
        let raw = wrist_angle(frame)?;
        let smoothed = self.smoother.push(raw);
        let calibrated = self.calibrator.feed(smoothed);
        self.last_angle = Some(calibrated);
        Some(calibrated)
    }

    pub fn last_angle(&self) -> Option<f32> {
        self.last_angle
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_calibrated()
    }

    pub fn reset(&mut self) {
        self.smoother.reset();
        self.calibrator.reset();
        self.last_angle = None;
    }
}

// ── Position mapping ───────────────────────────────────────

/// One of the fixed angular zones, or the no-position sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPosition {
    /// No angle this frame (also the initial value).  Reported to the
    /// wire as zone index 0.
    None,
    /// 1-based zone index.
    Zone(u8),
}

impl RotationPosition {
    /// Wire index: 0 for none, 1..=N for zones.
    pub fn index(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zone(n) => *n,
        }
    }
}

/// Pure angle→zone mapping over fixed, strictly increasing boundaries.
/// N boundaries yield N+1 zones covering [0,180] without overlap or gap.
#[derive(Debug, Clone)]
pub struct PositionMapper {
    boundaries: Vec<f32>,
}

impl PositionMapper {
    /// Boundaries must already be validated (see `config::validate`).
    pub fn new(boundaries: Vec<f32>) -> Self {
        Self { boundaries }
    }

    pub fn zone_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Map an angle to its zone.  `None` angle maps to the sentinel.
    pub fn map(&self, angle: Option<f32>) -> RotationPosition {
        let angle = match angle {
            Some(a) => a,
            None => return RotationPosition::None,
        };
        let mut zone = 1u8;
        for b in &self.boundaries {
            if angle >= *b {
                zone += 1;
            } else {
                break;
            }
        }
        RotationPosition::Zone(zone)
    }
}

// ── Tests ──────────────────────────────────────────────────
