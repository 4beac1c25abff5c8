//! Hand-state classification: per-frame FISTED / OPEN / UNKNOWN from
//! landmark geometry, plus the streak debouncer that confirms a state
//! before it is reported.
//!
//! Three independent signals are combined in a fixed order rather than a
//! single threshold, so that no single noisy measurement can flip the
//! result: per-finger extension ratios, fingertip spread, and fingertip
//! proximity to the palm centroid.

use serde::Deserialize;
use tracing::debug;

use crate::hand::{landmark, LandmarkFrame, FINGERTIPS, FINGER_TIP_MCP};

// ── HandState ──────────────────────────────────────────────

/// Classified hand pose for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandState {
    /// No landmarks this frame.
    Unknown,
    /// Closed hand.
    Fisted,
    /// Two or more fingers extended (or one with good spread).
    Open,
}

impl HandState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Fisted => "fisted",
            Self::Open => "open",
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Classifier thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// tip/MCP wrist-distance ratio above which a finger counts as extended.
    pub extension_ratio: f32,
    /// Adjacent fingertip gap sum, in palm widths, above which spread is good.
    pub spread_factor: f32,
    /// Fingertip-to-palm-centroid distance, in palm widths, below which a
    /// tip counts as curled in.
    pub proximity_factor: f32,
    /// Curled-in tip count at which the FISTED override fires.
    pub proximity_count: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extension_ratio: 1.2,
            spread_factor: 1.0,
            proximity_factor: 0.8,
            proximity_count: 3,
        }
    }
}

// ── Classifier ─────────────────────────────────────────────

/// Stateless per-frame hand-state classifier.
#[derive(Debug, Clone)]
pub struct HandStateClassifier {
    pub config: ClassifierConfig,
}

impl HandStateClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify one frame.  `None` input is the only source of UNKNOWN.
    pub fn classify(&self, frame: Option<&LandmarkFrame>) -> HandState {
        let frame = match frame {
            Some(f) => f,
            None => return HandState::Unknown,
        };

        let palm_width = frame.palm_width();

        // Signal 3 first: a rotated fist can pass a single-finger ratio
        // test, so enough tips huddled around the palm centroid overrides
        // everything else.
        if palm_width > 1e-6 {
            let centroid = frame.palm_centroid();
            let near_limit = self.config.proximity_factor * palm_width;
            let near_count = FINGERTIPS
                .iter()
                .filter(|&&tip| frame.point(tip).distance(&centroid) <= near_limit)
                .count();
            if near_count >= self.config.proximity_count {
                return HandState::Fisted;
            }
        }

        // Signal 1: per-finger extension ratios against the wrist.
        let wrist = frame.point(landmark::WRIST);
        let extended = FINGER_TIP_MCP
            .iter()
            .filter(|&&(tip, mcp)| {
                let mcp_dist = frame.point(mcp).distance(&wrist);
                if mcp_dist < 1e-6 {
                    return false;
                }
                frame.point(tip).distance(&wrist) / mcp_dist > self.config.extension_ratio
            })
            .count();

        // Signal 2: adjacent fingertip gaps relative to palm width.
        let spread_ok = if palm_width > 1e-6 {
            let tips = [
                frame.point(landmark::INDEX_TIP),
                frame.point(landmark::MIDDLE_TIP),
                frame.point(landmark::RING_TIP),
                frame.point(landmark::PINKY_TIP),
            ];
            let spread = tips[0].distance(&tips[1])
                + tips[1].distance(&tips[2])
                + tips[2].distance(&tips[3]);
            spread / palm_width > self.config.spread_factor
        } else {
            false
        };

        if extended >= 2 || (extended >= 1 && spread_ok) {
            HandState::Open
        } else {
            HandState::Fisted
        }
    }
}

// ── Debouncer ──────────────────────────────────────────────

/// Streak/cooldown gate between raw classification and reported state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Consecutive OPEN frames required to confirm OPEN.
    pub open_streak: u32,
    /// Consecutive FISTED frames required to confirm FISTED.
    pub fist_streak: u32,
    /// Seconds after a confirmed flip during which further flips are held.
    pub cooldown_s: f64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            open_streak: 2,
            fist_streak: 3,
            cooldown_s: 0.45,
        }
    }
}

/// Confirms a raw per-frame state only after it repeats, then blocks
/// rapid back-and-forth flips for a cooldown.
#[derive(Debug, Clone)]
pub struct StateDebouncer {
    pub config: DebounceConfig,
    state: HandState,
    open_streak: u32,
    fist_streak: u32,
    last_change: Option<f64>,
}

impl StateDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            state: HandState::Unknown,
            open_streak: 0,
            fist_streak: 0,
            last_change: None,
        }
    }

    /// Confirmed state.
    pub fn state(&self) -> HandState {
        self.state
    }

    /// Feed one raw classification; returns the confirmed state.
    pub fn update(&mut self, raw: HandState, now_s: f64) -> HandState {
        match raw {
            HandState::Open => {
                self.open_streak += 1;
                self.fist_streak = 0;
            }
            HandState::Fisted => {
                self.fist_streak += 1;
                self.open_streak = 0;
            }
            HandState::Unknown => {
                self.open_streak = 0;
                self.fist_streak = 0;
            }
        }

        let in_cooldown = self
            .last_change
            .map_or(false, |t| (now_s - t).max(0.0) < self.config.cooldown_s);

        if !in_cooldown {
            let next = if self.state != HandState::Open
                && self.open_streak >= self.config.open_streak
            {
                HandState::Open
            } else if self.state != HandState::Fisted
                && self.fist_streak >= self.config.fist_streak
            {
                HandState::Fisted
            } else {
                self.state
            };

            if next != self.state {
                debug!(from = self.state.as_str(), to = next.as_str(), "hand state confirmed");
                self.state = next;
                self.last_change = Some(now_s);
            }
        }

        self.state
    }

    /// Clear streaks, cooldown, and the confirmed state.
    pub fn reset(&mut self) {
        self.state = HandState::Unknown;
        self.open_streak = 0;
        self.fist_streak = 0;
        self.last_change = None;
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::hand::{zero_frame, Point};

    /// A fist-like frame: wide palm, all fingertips folded onto it.
    pub fn fist_frame() -> LandmarkFrame {
        let mut f = zero_frame();
        f.points[landmark::WRIST] = Point::new(100.0, 200.0);
        f.points[landmark::INDEX_MCP] = Point::new(70.0, 120.0);
        f.points[landmark::MIDDLE_MCP] = Point::new(90.0, 115.0);
        f.points[landmark::RING_MCP] = Point::new(110.0, 115.0);
        f.points[landmark::PINKY_MCP] = Point::new(130.0, 120.0);
        // Every tip nearer the wrist than its knuckle: all ratios < 1.0.
        f.points[landmark::THUMB_TIP] = Point::new(95.0, 130.0);
        f.points[landmark::INDEX_TIP] = Point::new(80.0, 140.0);
        f.points[landmark::MIDDLE_TIP] = Point::new(95.0, 135.0);
        f.points[landmark::RING_TIP] = Point::new(105.0, 135.0);
        f.points[landmark::PINKY_TIP] = Point::new(120.0, 140.0);
        f
    }

    /// An open-hand frame: all four fingers well extended and spread.
    pub fn open_frame() -> LandmarkFrame {
        let mut f = zero_frame();
        f.points[landmark::WRIST] = Point::new(100.0, 200.0);
        f.points[landmark::INDEX_MCP] = Point::new(70.0, 120.0);
        f.points[landmark::MIDDLE_MCP] = Point::new(90.0, 115.0);
        f.points[landmark::RING_MCP] = Point::new(110.0, 115.0);
        f.points[landmark::PINKY_MCP] = Point::new(130.0, 120.0);
        f.points[landmark::THUMB_TIP] = Point::new(30.0, 140.0);
        f.points[landmark::INDEX_TIP] = Point::new(50.0, 30.0);
        f.points[landmark::MIDDLE_TIP] = Point::new(85.0, 15.0);
        f.points[landmark::RING_TIP] = Point::new(120.0, 20.0);
        f.points[landmark::PINKY_TIP] = Point::new(155.0, 45.0);
        f
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::fixtures::{fist_frame, open_frame};
    use super::*;
    use crate::hand::{zero_frame, Point};

    fn classifier() -> HandStateClassifier {
        HandStateClassifier::new(ClassifierConfig::default())
    }

    #[test]
    fn test_unknown_only_without_landmarks() {
        assert_eq!(classifier().classify(None), HandState::Unknown);
        // Even a degenerate all-zero frame resolves to a concrete state.
        let frame = zero_frame();
        assert_ne!(classifier().classify(Some(&frame)), HandState::Unknown);
    }

    #[test]
    fn test_all_low_ratios_is_fisted() {
        let frame = fist_frame();
        let wrist = frame.point(landmark::WRIST);
        for (tip, mcp) in FINGER_TIP_MCP {
            let ratio = frame.point(tip).distance(&wrist) / frame.point(mcp).distance(&wrist);
            assert!(ratio < 1.0, "fixture finger ratio {} not < 1.0", ratio);
        }
        assert_eq!(classifier().classify(Some(&frame)), HandState::Fisted);
    }

    #[test]
    fn test_two_extended_fingers_is_open() {
        // Start from a fist, extend index + middle far past the ratio gate,
        // and move the thumb off the palm so the proximity override stays
        // below its three-tip trigger.
        let mut frame = fist_frame();
        frame.points[landmark::INDEX_TIP] = Point::new(55.0, 10.0);
        frame.points[landmark::MIDDLE_TIP] = Point::new(90.0, 0.0);
        frame.points[landmark::THUMB_TIP] = Point::new(30.0, 190.0);
        let wrist = frame.point(landmark::WRIST);
        for (tip, mcp) in [
            (landmark::INDEX_TIP, landmark::INDEX_MCP),
            (landmark::MIDDLE_TIP, landmark::MIDDLE_MCP),
        ] {
            let ratio = frame.point(tip).distance(&wrist) / frame.point(mcp).distance(&wrist);
            assert!(ratio > 1.3, "fixture finger ratio {} not > 1.3", ratio);
        }
        assert_eq!(classifier().classify(Some(&frame)), HandState::Open);
    }

    #[test]
    fn test_open_hand_is_open() {
        assert_eq!(classifier().classify(Some(&open_frame())), HandState::Open);
    }

    #[test]
    fn test_proximity_override_beats_ratios() {
        // A frame engineered so one finger passes the ratio test while four
        // tips sit on the palm centroid: the override must win.
        let mut frame = fist_frame();
        let centroid = frame.palm_centroid();
        for tip in [
            landmark::THUMB_TIP,
            landmark::MIDDLE_TIP,
            landmark::RING_TIP,
            landmark::PINKY_TIP,
        ] {
            frame.points[tip] = centroid;
        }
        frame.points[landmark::INDEX_TIP] = Point::new(40.0, 10.0);
        assert_eq!(classifier().classify(Some(&frame)), HandState::Fisted);
    }

    #[test]
    fn test_one_extended_with_spread_is_open() {
        let mut frame = fist_frame();
        // Index extended; remaining tips fanned apart (but not near the
        // centroid) so the spread signal fires with a single extension.
        frame.points[landmark::INDEX_TIP] = Point::new(40.0, 10.0);
        frame.points[landmark::MIDDLE_TIP] = Point::new(95.0, 160.0);
        frame.points[landmark::RING_TIP] = Point::new(140.0, 170.0);
        frame.points[landmark::PINKY_TIP] = Point::new(180.0, 185.0);
        frame.points[landmark::THUMB_TIP] = Point::new(40.0, 190.0);
        assert_eq!(classifier().classify(Some(&frame)), HandState::Open);
    }

    #[test]
    fn test_debouncer_requires_streak() {
        let mut deb = StateDebouncer::new(DebounceConfig::default());
        assert_eq!(deb.update(HandState::Open, 0.00), HandState::Unknown);
        assert_eq!(deb.update(HandState::Open, 0.03), HandState::Open);

        // A single FISTED frame must not flip a confirmed OPEN.
        assert_eq!(deb.update(HandState::Fisted, 1.00), HandState::Open);
        assert_eq!(deb.update(HandState::Fisted, 1.03), HandState::Open);
        assert_eq!(deb.update(HandState::Fisted, 1.06), HandState::Fisted);
    }

    #[test]
    fn test_debouncer_cooldown_blocks_rapid_flips() {
        let config = DebounceConfig {
            open_streak: 1,
            fist_streak: 1,
            cooldown_s: 0.45,
        };
        let mut deb = StateDebouncer::new(config);
        assert_eq!(deb.update(HandState::Open, 0.0), HandState::Open);
        // Immediate flip attempt lands inside the cooldown window.
        assert_eq!(deb.update(HandState::Fisted, 0.1), HandState::Open);
        // Past the cooldown the held streak takes effect.
        assert_eq!(deb.update(HandState::Fisted, 0.6), HandState::Fisted);
    }

    #[test]
    fn test_debouncer_unknown_clears_streaks() {
        let mut deb = StateDebouncer::new(DebounceConfig::default());
        deb.update(HandState::Open, 0.0);
        deb.update(HandState::Unknown, 0.03);
        // Streak restarts: one more OPEN frame is not enough on its own.
        assert_eq!(deb.update(HandState::Open, 0.06), HandState::Unknown);
        assert_eq!(deb.update(HandState::Open, 0.09), HandState::Open);
    }

    #[test]
    fn test_debouncer_reset() {
        let mut deb = StateDebouncer::new(DebounceConfig::default());
        deb.update(HandState::Open, 0.0);
        deb.update(HandState::Open, 0.03);
        assert_eq!(deb.state(), HandState::Open);
        deb.reset();
        assert_eq!(deb.state(), HandState::Unknown);
    }

    #[test]
    fn test_hand_state_as_str() {
        assert_eq!(HandState::Unknown.as_str(), "unknown");
        assert_eq!(HandState::Fisted.as_str(), "fisted");
        assert_eq!(HandState::Open.as_str(), "open");
    }
}
