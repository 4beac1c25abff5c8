//! Hand landmark frame: the per-frame input record for the whole pipeline.
//!
//! A frame is 21 ordered 2D points in pixel coordinates (MediaPipe hand
//! convention), plus optional confidence and handedness.  Upstream delivers
//! one record per camera frame as a JSON line; a malformed or mismatched
//! record resolves to "no frame", never an error.

use serde::Deserialize;

/// Number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

/// MediaPipe hand landmark indices.
#[allow(dead_code)]
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// The four non-thumb (tip, MCP) index pairs, in finger order.
pub const FINGER_TIP_MCP: [(usize, usize); 4] = [
    (landmark::INDEX_TIP, landmark::INDEX_MCP),
    (landmark::MIDDLE_TIP, landmark::MIDDLE_MCP),
    (landmark::RING_TIP, landmark::RING_MCP),
    (landmark::PINKY_TIP, landmark::PINKY_MCP),
];

/// All five fingertip indices.
pub const FINGERTIPS: [usize; 5] = [
    landmark::THUMB_TIP,
    landmark::INDEX_TIP,
    landmark::MIDDLE_TIP,
    landmark::RING_TIP,
    landmark::PINKY_TIP,
];

// ── Point ──────────────────────────────────────────────────

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Which hand, as reported by the upstream detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left" | "Left" => Some(Self::Left),
            "right" | "Right" => Some(Self::Right),
            _ => None,
        }
    }
}

// ── LandmarkFrame ──────────────────────────────────────────

/// A single frame of hand landmarks.
#[derive(Debug, Clone)]
pub struct LandmarkFrame {
    /// 21 points indexed by the `landmark` constants.
    pub points: [Point; LANDMARK_COUNT],
    /// Landmark model confidence (0.0-1.0), if reported.
    pub confidence: Option<f32>,
    /// Handedness, if reported.
    pub handedness: Option<Handedness>,
}

impl LandmarkFrame {
    /// Build a frame from exactly 21 points.  Any other count is "no frame".
    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.len() != LANDMARK_COUNT {
            return None;
        }
        let mut arr = [Point::default(); LANDMARK_COUNT];
        arr.copy_from_slice(points);
        Some(Self {
            points: arr,
            confidence: None,
            handedness: None,
        })
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    /// Palm width: index-MCP to pinky-MCP distance, with a wrist-based
    /// fallback when the knuckle span is degenerate.
    pub fn palm_width(&self) -> f32 {
        let w = self
            .point(landmark::INDEX_MCP)
            .distance(&self.point(landmark::PINKY_MCP));
        if w > 1e-6 {
            return w;
        }
        self.point(landmark::MIDDLE_MCP)
            .distance(&self.point(landmark::WRIST))
            * 2.0
    }

    /// Palm centroid: mean of the four non-thumb MCP joints.
    pub fn palm_centroid(&self) -> Point {
        let mcps = [
            landmark::INDEX_MCP,
            landmark::MIDDLE_MCP,
            landmark::RING_MCP,
            landmark::PINKY_MCP,
        ];
        let mut cx = 0.0;
        let mut cy = 0.0;
        for idx in mcps {
            cx += self.points[idx].x;
            cy += self.points[idx].y;
        }
        Point::new(cx / mcps.len() as f32, cy / mcps.len() as f32)
    }

    /// Tracked point for trajectory and depth checks.
    pub fn center(&self) -> Point {
        self.palm_centroid()
    }
}

// ── JSON ingestion ─────────────────────────────────────────

/// One landmark as serialized by the upstream detector.
#[derive(Debug, Deserialize)]
pub struct LandmarkRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Per-frame hand record from the upstream detector.
#[derive(Debug, Deserialize)]
pub struct HandRecord {
    pub landmarks: Vec<LandmarkRecord>,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub handedness: Option<String>,
}

impl HandRecord {
    /// Convert to a `LandmarkFrame`; landmark-count mismatch is "no frame".
    pub fn into_frame(self) -> Option<LandmarkFrame> {
        let points: Vec<Point> = self
            .landmarks
            .iter()
            .map(|l| Point::new(l.x, l.y))
            .collect();
        let mut frame = LandmarkFrame::from_points(&points)?;
        frame.confidence = self.score;
        frame.handedness = self.handedness.as_deref().and_then(Handedness::from_str);
        Some(frame)
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A frame with every landmark at the origin.
#[cfg(test)]
pub fn zero_frame() -> LandmarkFrame {
    LandmarkFrame::from_points(&[Point::default(); LANDMARK_COUNT]).unwrap()
}

// ── Tests ──────────────────────────────────────────────────
