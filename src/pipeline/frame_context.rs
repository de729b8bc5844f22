// src/pipeline/frame_context.rs
//
// Everything decided for one frame pair. The presentation layer reads this
// and nothing else: alert text, cues to play, and what to draw.

use crate::alert_coordinator::AlertState;
use crate::analysis::{BlindSpotReport, ClosingSpeedReport, SkipReason};
use crate::overlay::Annotation;
use crate::types::CameraId;

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_id: u64,
    /// Session clock, seconds
    pub timestamp: f64,
    pub fps: f64,

    pub closing: ClosingSpeedReport,
    pub blind_spot: BlindSpotReport,
    pub alert: AlertState,
    pub annotations: Vec<Annotation>,

    /// Detections dropped as invalid, across both cameras
    pub skipped: Vec<(CameraId, SkipReason)>,
}

impl FrameContext {
    pub fn annotations_for(&self, camera: CameraId) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.camera() == camera)
    }

    pub fn cue_should_fire(&self) -> bool {
        self.alert.cue_should_fire()
    }
}
