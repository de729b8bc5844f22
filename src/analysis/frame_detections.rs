// src/analysis/frame_detections.rs
//
// Immutable per-frame view of one camera's detections, filtered down to the
// monitored class. Built once per frame and shared by every estimator so they
// all see the same geometry.

use crate::types::{BBox, CameraFrame, TrackId, TrackSnapshot};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Tracker gave no usable id (absent, zero or negative)
    MissingTrackId,
    /// Corners are inverted or far outside any frame
    MalformedBox,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitoredDetection {
    pub track_id: Option<TrackId>,
    pub bbox: BBox,
    pub snapshot: TrackSnapshot,
}

#[derive(Debug, Clone, Default)]
pub struct FrameDetections {
    pub detections: Vec<MonitoredDetection>,
    /// Detections dropped outright this frame
    pub skipped: Vec<SkipReason>,
}

impl FrameDetections {
    pub fn collect(frame: &CameraFrame, monitored_class_id: u32) -> Self {
        let mut out = Self::default();

        for det in &frame.detections {
            if det.class_id != monitored_class_id {
                continue;
            }
            if !det.bbox.is_well_formed() {
                debug!("Skipping malformed bbox {:?}", det.bbox);
                out.skipped.push(SkipReason::MalformedBox);
                continue;
            }
            out.detections.push(MonitoredDetection {
                track_id: det.track_id.filter(|id| *id > 0),
                bbox: det.bbox,
                snapshot: TrackSnapshot::from_bbox(&det.bbox),
            });
        }

        out
    }

    /// Detections that carry a usable track id
    pub fn tracked(&self) -> impl Iterator<Item = (TrackId, &MonitoredDetection)> {
        self.detections
            .iter()
            .filter_map(|d| d.track_id.map(|id| (id, d)))
    }

    pub fn untracked_count(&self) -> usize {
        self.detections.iter().filter(|d| d.track_id.is_none()).count()
    }

    /// Snapshot map for the history store. A repeated id keeps its last box.
    pub fn snapshots(&self) -> HashMap<TrackId, TrackSnapshot> {
        self.tracked().map(|(id, d)| (id, d.snapshot)).collect()
    }
}
