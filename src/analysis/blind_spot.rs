// src/analysis/blind_spot.rs
//
// Front-camera blind-spot zones. Purely spatial: a detection is in the left
// zone when its horizontal center lies strictly inside (0, left_max), in the
// right zone when strictly inside (right_min, w). Anything in between is the
// ego lane and is ignored. No temporal component.

use super::frame_detections::FrameDetections;
use crate::types::{BBox, BlindSpotConfig};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlindSide {
    Left,
    Right,
}

impl BlindSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// Zone rectangle for presentation layers that want to draw it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneRect {
    pub side: BlindSide,
    pub rect: BBox,
}

#[derive(Debug, Clone, Default)]
pub struct BlindSpotReport {
    pub left: bool,
    pub right: bool,
    pub hits: Vec<(BlindSide, BBox)>,
}

impl BlindSpotReport {
    pub fn any(&self) -> bool {
        self.left || self.right
    }
}

pub struct BlindSpotClassifier {
    config: BlindSpotConfig,
}

/// Truncating pixel boundary; the epsilon absorbs float error on exact products.
fn boundary(extent: u32, ratio: f64) -> i32 {
    (extent as f64 * ratio + 1e-9).floor() as i32
}

impl BlindSpotClassifier {
    pub fn new(config: BlindSpotConfig) -> Self {
        Self { config }
    }

    /// (left_max, right_min) in pixels for a frame of width `w`
    pub fn bounds(&self, w: u32) -> (i32, i32) {
        (
            boundary(w, self.config.left_max_ratio),
            boundary(w, self.config.right_min_ratio),
        )
    }

    pub fn classify(&self, cx: i32, w: u32) -> Option<BlindSide> {
        let (left_max, right_min) = self.bounds(w);
        if 0 < cx && cx < left_max {
            Some(BlindSide::Left)
        } else if right_min < cx && cx < w as i32 {
            Some(BlindSide::Right)
        } else {
            None
        }
    }

    pub fn scan(&self, detections: &FrameDetections, w: u32) -> BlindSpotReport {
        let mut report = BlindSpotReport::default();

        for det in &detections.detections {
            let (cx, _) = det.bbox.center();
            let Some(side) = self.classify(cx, w) else {
                continue;
            };
            debug!("Blind spot {} hit at cx={} (w={})", side.as_str(), cx, w);
            match side {
                BlindSide::Left => report.left = true,
                BlindSide::Right => report.right = true,
            }
            report.hits.push((side, det.bbox));
        }

        report
    }

    pub fn zone_rects(&self, w: u32, h: u32) -> [ZoneRect; 2] {
        let (left_max, right_min) = self.bounds(w);
        let top = boundary(h, self.config.top_exclusion_ratio);
        [
            ZoneRect {
                side: BlindSide::Left,
                rect: BBox::new(0, top, left_max, h as i32),
            },
            ZoneRect {
                side: BlindSide::Right,
                rect: BBox::new(right_min, top, w as i32, h as i32),
            },
        ]
    }
}
