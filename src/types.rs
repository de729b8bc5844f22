// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub closing_speed: ClosingSpeedConfig,
    pub blind_spot: BlindSpotConfig,
    pub alerts: AlertConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detector class treated as "vehicle" (COCO: 2 = car)
    pub monitored_class_id: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            monitored_class_id: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosingSpeedConfig {
    /// Upward displacement (px) a track must exceed between two frames
    pub min_upward_px: i32,
    /// Area growth ratio a track must exceed between two frames
    pub min_size_ratio: f64,
    /// Tracks whose center sits at or above this row are horizon noise
    pub min_center_y: i32,
    /// |dy| * size_ratio must exceed this
    pub min_speed_score: f64,
}

impl Default for ClosingSpeedConfig {
    fn default() -> Self {
        Self {
            min_upward_px: 3,
            min_size_ratio: 1.1,
            min_center_y: 80,
            min_speed_score: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlindSpotConfig {
    /// Left zone spans (0, left_max_ratio * w)
    pub left_max_ratio: f64,
    /// Right zone spans (right_min_ratio * w, w)
    pub right_min_ratio: f64,
    /// Upper band of the frame excluded from the drawn zones
    pub top_exclusion_ratio: f64,
}

impl Default for BlindSpotConfig {
    fn default() -> Self {
        Self {
            left_max_ratio: 0.34,
            right_min_ratio: 0.66,
            top_exclusion_ratio: 0.33,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub cooldown_secs: f64,
    /// Fire a diagnostic cue on a fixed interval to exercise the alert path
    pub force_cue: bool,
    pub force_cue_interval_secs: f64,
    /// Play one test cue before the first frame of every session
    pub test_cue_on_start: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 5.0,
            force_cue: false,
            force_cue_interval_secs: 5.0,
            test_cue_on_start: false,
        }
    }
}

/// Which timeline drives cooldowns and FPS during replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Recorded frame timestamps
    #[default]
    Replay,
    /// Wall clock, for paced playback
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    /// Used when a recorded frame does not carry its own dimensions
    pub frame_width: u32,
    pub frame_height: u32,
    /// Pause between replayed frames (0 = as fast as possible)
    pub frame_delay_ms: u64,
    pub clock: ClockMode,
    /// Stop each session after this many frames
    pub max_frames: Option<u64>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
            output_dir: "output".to_string(),
            frame_width: 640,
            frame_height: 360,
            frame_delay_ms: 0,
            clock: ClockMode::Replay,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// CAMERAS & DETECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraId {
    Front,
    Back,
}

impl CameraId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "FRONT",
            Self::Back => "BACK",
        }
    }
}

/// Per-camera identity assigned by the upstream tracker. Only positive
/// values are usable; front and back ids live in separate namespaces.
pub type TrackId = i64;

/// Largest coordinate magnitude accepted from a detector. Boxes may hang a
/// little off-frame, but nothing legitimate is a million pixels out.
pub const MAX_PIXEL_COORD: i32 = 1 << 20;

/// Pixel rectangle `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer midpoint, rounded toward negative infinity
    pub fn center(&self) -> (i32, i32) {
        // The i64 midpoint of two i32 values always fits back into i32
        let mid = |a: i32, b: i32| (a as i64 + b as i64).div_euclid(2) as i32;
        (mid(self.x1, self.x2), mid(self.y1, self.y2))
    }

    pub fn area(&self) -> i64 {
        let w = (self.x2 as i64 - self.x1 as i64).max(0);
        let h = (self.y2 as i64 - self.y1 as i64).max(0);
        w.saturating_mul(h)
    }

    /// Inverted corners or coordinates no camera frame could hold can't come
    /// out of a sane detector.
    pub fn is_well_formed(&self) -> bool {
        let in_range = |v: i32| (-MAX_PIXEL_COORD..=MAX_PIXEL_COORD).contains(&v);
        self.x2 >= self.x1
            && self.y2 >= self.y1
            && [self.x1, self.y1, self.x2, self.y2].into_iter().all(in_range)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub track_id: Option<TrackId>,
    pub class_id: u32,
    pub bbox: BBox,
}

/// One camera's detections for one frame, as handed over by the detector.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

/// Geometry of one track in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackSnapshot {
    pub center: (i32, i32),
    pub area: i64,
}

impl TrackSnapshot {
    pub fn from_bbox(bbox: &BBox) -> Self {
        Self {
            center: bbox.center(),
            area: bbox.area(),
        }
    }
}
