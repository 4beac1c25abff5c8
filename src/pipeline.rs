//! The event pipeline: one noisy landmark frame in, zero or more
//! confirmed events out.
//!
//! Stage order per frame: depth gate, hand-state classification and
//! debounce, rotation-zone tracking, swipe detection, no-hand timeout.
//! Each output channel is deduplicated independently, so the consumer
//! only ever sees changes.

use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::config::PipelineConfig;
use crate::depth::{DepthCheck, DepthMap, DepthValidator};
use crate::gesture::{HandState, HandStateClassifier, StateDebouncer};
use crate::hand::LandmarkFrame;
use crate::rotation::{AngleTracker, PositionMapper, RotationPosition};
use crate::swipe::{SwipeDetector, SwipePhase, SwipeStats};

// ── Events ─────────────────────────────────────────────────

/// A confirmed, deduplicated pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Confirmed hand-state change (never UNKNOWN).
    Gesture(HandState),
    /// Entered a rotation zone (1-based).
    Zone(u8),
    /// No hand seen for the configured delay.
    NoHand,
    /// A swipe passed every gate.
    SwipeConfirmed,
}

impl Event {
    /// Wire token for the UDP consumer.
    pub fn token(&self) -> String {
        match self {
            Event::Gesture(HandState::Fisted) => "gesture/zero".to_string(),
            Event::Gesture(HandState::Open) => "gesture/five".to_string(),
            // The pipeline never emits UNKNOWN; keep the arm total with
            // its own token instead of borrowing the zone channel's.
            Event::Gesture(HandState::Unknown) => {
                debug_assert!(false, "unknown hand state has no wire token");
                "gesture/unknown".to_string()
            }
            Event::Zone(n) => format!("area/menu/{n}"),
            Event::NoHand => "area/menu/0".to_string(),
            Event::SwipeConfirmed => "Swipe".to_string(),
        }
    }
}

// ── No-hand timer ──────────────────────────────────────────

/// Fires once after the hand has been absent for a full delay, then
/// stays quiet until the hand returns.
#[derive(Debug, Clone)]
struct NoHandTimer {
    delay_s: f64,
    absent_since: Option<f64>,
    signaled: bool,
}

impl NoHandTimer {
    fn new(delay_s: f64) -> Self {
        Self {
            delay_s,
            absent_since: None,
            signaled: false,
        }
    }

    fn update(&mut self, hand_present: bool, now_s: f64) -> bool {
        if hand_present {
            self.absent_since = None;
            self.signaled = false;
            return false;
        }
        let since = *self.absent_since.get_or_insert(now_s);
        if !self.signaled && (now_s - since).max(0.0) >= self.delay_s {
            self.signaled = true;
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.absent_since = None;
        self.signaled = false;
    }
}

// ── Frame input ────────────────────────────────────────────

/// One line of input from the upstream detector.
#[derive(Debug, Deserialize)]
pub struct FrameRecord {
    /// Frame timestamp in seconds; the caller substitutes wall-clock
    /// time when absent.
    #[serde(default)]
    pub t: Option<f64>,
    #[serde(default)]
    pub hand: Option<crate::hand::HandRecord>,
    #[serde(default)]
    pub depth: Option<crate::depth::DepthRecord>,
    /// Drop all pipeline state before processing this frame.
    #[serde(default)]
    pub reset: bool,
}

// ── Status ─────────────────────────────────────────────────

/// Point-in-time pipeline snapshot, for periodic status logging.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStatus {
    pub hand_state: HandState,
    pub calibrated: bool,
    /// Last calibrated wrist angle, degrees.
    pub angle_deg: Option<f32>,
    /// Last zone sent to the consumer; 0 when none.
    pub zone: u8,
    pub swipe_phase: SwipePhase,
    pub swipe_stats: SwipeStats,
    pub frames: u64,
    pub depth_rejections: u64,
}

// ── Pipeline ───────────────────────────────────────────────

pub struct GesturePipeline {
    depth_gate: DepthValidator,
    classifier: HandStateClassifier,
    debouncer: StateDebouncer,
    angle: AngleTracker,
    mapper: PositionMapper,
    swipe: SwipeDetector,
    no_hand: NoHandTimer,
    /// Last gesture event sent; repeats are suppressed.
    last_gesture: Option<HandState>,
    /// Last zone index sent; 0 after the no-hand event, so a hand
    /// reappearing in the same zone announces it again.
    last_zone: u8,
    frames: u64,
    depth_rejections: u64,
}

impl GesturePipeline {
    /// Config must already be validated (see `PipelineConfig::validate`).
    pub fn new(config: &PipelineConfig) -> Self {
        let mapper = PositionMapper::new(config.zone_boundaries.clone());
        debug!(zones = mapper.zone_count(), "pipeline configured");
        Self {
            depth_gate: DepthValidator::new(config.depth.clone()),
            classifier: HandStateClassifier::new(config.classifier.clone()),
            debouncer: StateDebouncer::new(config.debounce.clone()),
            angle: AngleTracker::new(&config.angle),
            mapper,
            swipe: SwipeDetector::new(config.swipe.clone()),
            no_hand: NoHandTimer::new(config.no_hand_delay_s),
            last_gesture: None,
            last_zone: 0,
            frames: 0,
            depth_rejections: 0,
        }
    }

    /// Process one frame and return the events it confirmed, in channel
    /// order: gesture, zone, swipe, no-hand.
    pub fn process(
        &mut self,
        frame: Option<&LandmarkFrame>,
        depth: Option<&DepthMap>,
        now_s: f64,
    ) -> Vec<Event> {
        self.frames += 1;
        let mut events = Vec::new();

        // A detection the depth map contradicts is treated as no hand at
        // all; every downstream stage sees the same picture.
        let frame = match (frame, depth) {
            (Some(f), Some(map)) => {
                let check = self.depth_gate.check(f.center(), map);
                if check.is_accepted() {
                    Some(f)
                } else {
                    self.depth_rejections += 1;
                    if let DepthCheck::Rejected(why) = check {
                        debug!(why = why.as_str(), "detection rejected by depth gate");
                    }
                    None
                }
            }
            (f, None) => f,
            (None, _) => None,
        };
        let hand_present = frame.is_some();
        if let Some(f) = frame {
            trace!(
                confidence = ?f.confidence,
                handedness = ?f.handedness.map(|h| h.as_str()),
                "tracking frame",
            );
        }

        let raw = self.classifier.classify(frame);
        let confirmed = self.debouncer.update(raw, now_s);
        if confirmed != HandState::Unknown && self.last_gesture != Some(confirmed) {
            self.last_gesture = Some(confirmed);
            events.push(Event::Gesture(confirmed));
        }

        if let Some(f) = frame {
            let angle = self.angle.update(f);
            // Zones are only meaningful once the neutral pose is known;
            // pre-calibration angles would misfile the hand.
            if self.angle.is_calibrated() {
                if let RotationPosition::Zone(zone) = self.mapper.map(angle) {
                    if zone != self.last_zone {
                        self.last_zone = zone;
                        events.push(Event::Zone(zone));
                    }
                }
            }
        }

        if self.swipe.update(frame.map(|f| f.center()), now_s) {
            events.push(Event::SwipeConfirmed);
        } else {
            let progress = self.swipe.progress(now_s);
            if progress.phase == SwipePhase::Detecting {
                trace!(
                    distance_px = progress.distance_px,
                    elapsed_s = progress.elapsed_s,
                    "swipe in flight",
                );
            }
        }

        if self.no_hand.update(hand_present, now_s) {
            // Zone cache drops to the sentinel so the next detection
            // re-announces its zone even if it is the same one.
            self.last_zone = 0;
            events.push(Event::NoHand);
        }

        events
    }

    pub fn status(&self, now_s: f64) -> PipelineStatus {
        PipelineStatus {
            hand_state: self.debouncer.state(),
            calibrated: self.angle.is_calibrated(),
            angle_deg: self.angle.last_angle(),
            zone: self.last_zone,
            swipe_phase: self.swipe.progress(now_s).phase,
            swipe_stats: self.swipe.stats(),
            frames: self.frames,
            depth_rejections: self.depth_rejections,
        }
    }

    /// Drop all detection state, caches and cooldowns.  Counters and
    /// swipe statistics survive.
    pub fn reset(&mut self) {
        info!("pipeline reset");
        self.debouncer.reset();
        self.angle.reset();
        self.swipe.reset();
        self.no_hand.reset();
        self.last_gesture = None;
        self.last_zone = 0;
    }
}

// ── Tests ──────────────────────────────────────────────────
