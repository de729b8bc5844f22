// src/analysis/closing_speed.rs
//
// Rear-camera closing-speed heuristic.
//
// A vehicle approaching from behind climbs toward the top of the rear image
// and its box grows. No single cue is reliable at low resolution, so all of
// the following must hold between two consecutive frames of the same track:
//
//   dy          < -min_upward_px        (moved up)
//   size_ratio  >  min_size_ratio       (grew)
//   center.y    >  min_center_y         (not horizon noise)
//   |dy| * size_ratio > min_speed_score (combined magnitude)
//
// A track seen for the first time never flags.

use super::frame_detections::FrameDetections;
use super::track_history::TrackHistory;
use crate::types::{BBox, CameraId, ClosingSpeedConfig, TrackId, TrackSnapshot};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosingMeasurement {
    /// Vertical displacement in pixels, negative = upward
    pub dy: i32,
    pub size_ratio: f64,
    pub speed_score: f64,
}

impl ClosingMeasurement {
    pub fn between(current: &TrackSnapshot, previous: &TrackSnapshot) -> Self {
        let dy = current.center.1 - previous.center.1;
        // Degenerate previous area means "no change"
        let size_ratio = if previous.area > 0 {
            current.area as f64 / previous.area as f64
        } else {
            1.0
        };
        Self {
            dy,
            size_ratio,
            speed_score: dy.abs() as f64 * size_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackAssessment {
    pub track_id: TrackId,
    pub bbox: BBox,
    pub measurement: ClosingMeasurement,
    pub closing_fast: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClosingSpeedReport {
    /// Tracks that had a previous snapshot this frame
    pub assessments: Vec<TrackAssessment>,
    /// Monitored detections without a usable track id
    pub untracked: usize,
    pub any_closing_fast: bool,
}

impl ClosingSpeedReport {
    pub fn flagged(&self) -> impl Iterator<Item = &TrackAssessment> {
        self.assessments.iter().filter(|a| a.closing_fast)
    }
}

pub struct ClosingSpeedEstimator {
    config: ClosingSpeedConfig,
}

impl ClosingSpeedEstimator {
    pub fn new(config: ClosingSpeedConfig) -> Self {
        Self { config }
    }

    /// `None` when there is no previous snapshot to compare against.
    pub fn assess(
        &self,
        current: &TrackSnapshot,
        previous: Option<&TrackSnapshot>,
    ) -> Option<(ClosingMeasurement, bool)> {
        let previous = previous?;
        let m = ClosingMeasurement::between(current, previous);
        let cfg = &self.config;

        let closing_fast = m.dy < -cfg.min_upward_px
            && m.size_ratio > cfg.min_size_ratio
            && current.center.1 > cfg.min_center_y
            && m.speed_score > cfg.min_speed_score;

        Some((m, closing_fast))
    }

    /// Compares rear-camera detections against the back history. Must run
    /// before `history` is replaced with this frame's snapshots.
    pub fn estimate(
        &self,
        detections: &FrameDetections,
        history: &TrackHistory,
    ) -> ClosingSpeedReport {
        let mut report = ClosingSpeedReport {
            untracked: detections.untracked_count(),
            ..Default::default()
        };

        for (track_id, det) in detections.tracked() {
            let previous = history.read(CameraId::Back, track_id);
            let Some((measurement, closing_fast)) = self.assess(&det.snapshot, previous.as_ref())
            else {
                continue;
            };

            if closing_fast {
                debug!(
                    "Track {} closing fast: dy={} ratio={:.2} score={:.1}",
                    track_id, measurement.dy, measurement.size_ratio, measurement.speed_score
                );
                report.any_closing_fast = true;
            }

            report.assessments.push(TrackAssessment {
                track_id,
                bbox: det.bbox,
                measurement,
                closing_fast,
            });
        }

        report
    }
}
