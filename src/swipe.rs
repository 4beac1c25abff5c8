//! Horizontal swipe detection over the palm-center trajectory.
//!
//! A swipe is a sustained rightward motion of the palm center: started by
//! three consecutive advancing samples, accumulated while detecting, and
//! confirmed only when distance, duration, velocity and straightness all
//! pass.  Confirmation arms a cooldown so one physical motion cannot fire
//! twice.  Losing the hand mid-gesture aborts and clears the trajectory;
//! a failed validation aborts but keeps the trajectory, since the samples
//! may still seed the next attempt.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::hand::Point;

// ── Config ─────────────────────────────────────────────────

/// Swipe gating parameters.  Distances are pixels, durations seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    /// Trajectory ring capacity in samples.
    pub buffer_len: usize,
    /// Consecutive advancing samples that open a gesture.
    pub start_samples: usize,
    /// Minimum per-step advance while opening (px).
    pub start_step_px: f32,
    /// Total rightward travel required to confirm (px).
    pub min_distance_px: f32,
    /// Gesture duration window (s).
    pub min_duration_s: f64,
    pub max_duration_s: f64,
    /// Mean horizontal velocity window (px/s).
    pub min_velocity: f32,
    pub max_velocity: f32,
    /// Peak vertical drift allowed, as a fraction of horizontal travel.
    pub max_y_deviation_ratio: f32,
    /// A single backward step larger than this aborts the gesture (px).
    pub reversal_px: f32,
    /// Quiet period after a confirmed swipe (s).
    pub cooldown_s: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            buffer_len: 18,
            start_samples: 3,
            start_step_px: 3.0,
            min_distance_px: 90.0,
            min_duration_s: 0.2,
            max_duration_s: 2.0,
            min_velocity: 35.0,
            max_velocity: 900.0,
            max_y_deviation_ratio: 0.35,
            reversal_px: 12.0,
            cooldown_s: 0.8,
        }
    }
}

// ── State ──────────────────────────────────────────────────

/// One timestamped trajectory point.
#[derive(Debug, Clone, Copy)]
struct TrajectorySample {
    pos: Point,
    t: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipePhase {
    Idle,
    Detecting,
}

impl SwipePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Detecting => "detecting",
        }
    }
}

/// Lifetime counters, reported by `status` and reset independently of
/// the detection state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwipeStats {
    /// Swipes confirmed and reported.
    pub confirmed: u64,
    /// Gestures that reached the distance gate but failed validation.
    pub filtered: u64,
    /// Gestures abandoned before the distance gate (timeout, reversal,
    /// hand loss).
    pub aborted: u64,
}

/// Snapshot of the gesture in flight, for status reporting.
#[derive(Debug, Clone, Copy)]
pub struct SwipeProgress {
    pub phase: SwipePhase,
    /// Rightward travel so far (px); zero while idle.
    pub distance_px: f32,
    pub elapsed_s: f64,
}

// ── Detector ───────────────────────────────────────────────

#[derive(Debug)]
pub struct SwipeDetector {
    config: SwipeConfig,
    buffer: VecDeque<TrajectorySample>,
    phase: SwipePhase,
    start: Option<TrajectorySample>,
    /// Peak |y - start.y| seen during the current gesture.
    max_y_dev: f32,
    /// The gesture reached the distance gate but has not passed every
    /// validation criterion yet; at timeout it counts as filtered
    /// rather than aborted.
    pending_validation: bool,
    cooldown_until: f64,
    stats: SwipeStats,
}

impl SwipeDetector {
    pub fn new(config: SwipeConfig) -> Self {
        let capacity = config.buffer_len;
        Self {
            config,
            buffer: VecDeque::with_capacity(capacity),
            phase: SwipePhase::Idle,
            start: None,
            max_y_dev: 0.0,
            pending_validation: false,
            cooldown_until: 0.0,
            stats: SwipeStats::default(),
        }
    }

    /// Feed one frame's palm center.  Returns `true` exactly on the frame
    /// that confirms a swipe.  `None` means the hand was not seen this
    /// frame; that aborts any gesture in flight and drops the trajectory,
    /// so stale samples from before the gap cannot seed a false start.
    pub fn update(&mut self, center: Option<Point>, now_s: f64) -> bool {
        let center = match center {
            Some(c) => c,
            None => {
                if self.phase == SwipePhase::Detecting {
                    debug!("swipe aborted: hand lost");
                    self.stats.aborted += 1;
                }
                self.abort();
                self.buffer.clear();
                return false;
            }
        };

        self.push_sample(center, now_s);

        match self.phase {
            SwipePhase::Idle => {
                if now_s < self.cooldown_until {
                    return false;
                }
                if let Some(start) = self.detect_start() {
                    trace!(x = start.pos.x, t = start.t, "swipe start");
                    self.phase = SwipePhase::Detecting;
                    self.start = Some(start);
                    self.max_y_dev = 0.0;
                }
                false
            }
            SwipePhase::Detecting => self.track(center, now_s),
        }
    }

    fn push_sample(&mut self, pos: Point, t: f64) {
        if self.buffer.len() == self.config.buffer_len {
            self.buffer.pop_front();
        }
        self.buffer.push_back(TrajectorySample { pos, t });
    }

    /// A gesture opens when the last `start_samples` samples each advance
    /// rightward by more than the start step.  The earliest of them
    /// becomes the gesture origin.
    fn detect_start(&self) -> Option<TrajectorySample> {
        let n = self.config.start_samples;
        if self.buffer.len() < n {
            return None;
        }
        let first = self.buffer.len() - n;
        for i in first..self.buffer.len() - 1 {
            let step = self.buffer[i + 1].pos.x - self.buffer[i].pos.x;
            if step <= self.config.start_step_px {
                return None;
            }
        }
        Some(self.buffer[first])
    }

    fn track(&mut self, center: Point, now_s: f64) -> bool {
        let start = match self.start {
            Some(s) => s,
            None => {
                self.abort();
                return false;
            }
        };

        let elapsed = (now_s - start.t).max(0.0);
        if elapsed > self.config.max_duration_s {
            // A gesture that reached the distance gate but never passed
            // validation is a filtered false positive, not an abandoned
            // motion.
            if self.pending_validation {
                debug!(elapsed_s = elapsed, "swipe filtered: failed validation");
                self.stats.filtered += 1;
            } else {
                debug!(elapsed_s = elapsed, "swipe aborted: timeout");
                self.stats.aborted += 1;
            }
            self.abort();
            return false;
        }

        // Single-step reversal: compare against the previous sample, not
        // the origin, so a brief backward jerk kills the gesture.
        if self.buffer.len() >= 2 {
            let prev = self.buffer[self.buffer.len() - 2];
            if center.x - prev.pos.x < -self.config.reversal_px {
                debug!("swipe aborted: reversal");
                self.stats.aborted += 1;
                self.abort();
                return false;
            }
        }

        // Cumulative drift back past the origin: the motion has undone
        // itself even if no single step was abrupt.
        let dx = center.x - start.pos.x;
        if dx < -self.config.reversal_px {
            debug!(dx, "swipe aborted: drifted back past origin");
            self.stats.aborted += 1;
            self.abort();
            return false;
        }

        let y_dev = (center.y - start.pos.y).abs();
        if y_dev > self.max_y_dev {
            self.max_y_dev = y_dev;
        }

        if dx < self.config.min_distance_px {
            return false;
        }
        self.validate(dx, elapsed, now_s)
    }

    /// Distance gate passed; check the remaining criteria.  Failures
    /// keep the gesture open so a later frame can still confirm; the
    /// timeout in `track` resolves whatever never does.
    fn validate(&mut self, dx: f32, elapsed: f64, now_s: f64) -> bool {
        self.pending_validation = true;
        if elapsed < self.config.min_duration_s {
            return false;
        }
        let velocity = dx / elapsed as f32;
        if velocity < self.config.min_velocity || velocity > self.config.max_velocity {
            trace!(velocity, "swipe pending: velocity outside window");
            return false;
        }
        if self.max_y_dev / dx > self.config.max_y_deviation_ratio {
            trace!(y_dev = self.max_y_dev, dx, "swipe pending: vertical drift");
            return false;
        }

        self.stats.confirmed += 1;
        self.cooldown_until = now_s + self.config.cooldown_s;
        debug!(dx, elapsed_s = elapsed, velocity, "swipe confirmed");
        self.abort();
        self.buffer.clear();
        true
    }

    /// Return to idle, keeping the trajectory buffer and cooldown.
    fn abort(&mut self) {
        self.phase = SwipePhase::Idle;
        self.start = None;
        self.max_y_dev = 0.0;
        self.pending_validation = false;
    }

    pub fn progress(&self, now_s: f64) -> SwipeProgress {
        match (self.phase, self.start, self.buffer.back()) {
            (SwipePhase::Detecting, Some(start), Some(last)) => SwipeProgress {
                phase: SwipePhase::Detecting,
                distance_px: (last.pos.x - start.pos.x).max(0.0),
                elapsed_s: (now_s - start.t).max(0.0),
            },
            _ => SwipeProgress {
                phase: SwipePhase::Idle,
                distance_px: 0.0,
                elapsed_s: 0.0,
            },
        }
    }

    pub fn stats(&self) -> SwipeStats {
        self.stats
    }

    /// Clear detection state, trajectory and cooldown.  Counters survive;
    /// see `reset_statistics`.
    pub fn reset(&mut self) {
        self.abort();
        self.buffer.clear();
        self.cooldown_until = 0.0;
    }

    pub fn reset_statistics(&mut self) {
        self.stats = SwipeStats::default();
    }
}

// ── Tests ──────────────────────────────────────────────────
