// src/pipeline/metrics.rs
//
// Session counters and frame-rate tracking. Counters are atomics so a
// presentation thread can read them while the frame loop runs.

use crate::alert_coordinator::AlertCategory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub closing_fast_frames: Arc<AtomicU64>,
    pub blind_spot_frames: Arc<AtomicU64>,
    pub closing_speed_cues: Arc<AtomicU64>,
    pub blind_spot_cues: Arc<AtomicU64>,
    pub forced_cues: Arc<AtomicU64>,
    pub test_cues: Arc<AtomicU64>,
    pub skipped_detections: Arc<AtomicU64>,
    first_frame_at: Option<f64>,
    last_frame_at: Option<f64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            closing_fast_frames: Arc::new(AtomicU64::new(0)),
            blind_spot_frames: Arc::new(AtomicU64::new(0)),
            closing_speed_cues: Arc::new(AtomicU64::new(0)),
            blind_spot_cues: Arc::new(AtomicU64::new(0)),
            forced_cues: Arc::new(AtomicU64::new(0)),
            test_cues: Arc::new(AtomicU64::new(0)),
            skipped_detections: Arc::new(AtomicU64::new(0)),
            first_frame_at: None,
            last_frame_at: None,
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_cue(&self, category: AlertCategory) {
        let counter = match category {
            AlertCategory::ClosingSpeed => &self.closing_speed_cues,
            AlertCategory::BlindSpot => &self.blind_spot_cues,
            AlertCategory::Forced => &self.forced_cues,
            AlertCategory::Test => &self.test_cues,
        };
        self.inc(counter);
    }

    /// Counts the frame and returns the instantaneous FPS (0 on the first frame).
    pub fn record_frame(&mut self, now: f64) -> f64 {
        self.inc(&self.total_frames);
        let fps = match self.last_frame_at {
            Some(prev) if now > prev => 1.0 / (now - prev),
            _ => 0.0,
        };
        self.first_frame_at.get_or_insert(now);
        self.last_frame_at = Some(now);
        fps
    }

    pub fn avg_fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        match (self.first_frame_at, self.last_frame_at) {
            (Some(first), Some(last)) if last - first > 0.01 && frames > 1 => {
                (frames - 1) as f64 / (last - first)
            }
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            avg_fps: self.avg_fps(),
            closing_fast_frames: self.closing_fast_frames.load(Ordering::Relaxed),
            blind_spot_frames: self.blind_spot_frames.load(Ordering::Relaxed),
            closing_speed_cues: self.closing_speed_cues.load(Ordering::Relaxed),
            blind_spot_cues: self.blind_spot_cues.load(Ordering::Relaxed),
            forced_cues: self.forced_cues.load(Ordering::Relaxed),
            test_cues: self.test_cues.load(Ordering::Relaxed),
            skipped_detections: self.skipped_detections.load(Ordering::Relaxed),
            elapsed_secs: match (self.first_frame_at, self.last_frame_at) {
                (Some(first), Some(last)) => last - first,
                _ => 0.0,
            },
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub avg_fps: f64,
    pub closing_fast_frames: u64,
    pub blind_spot_frames: u64,
    pub closing_speed_cues: u64,
    pub blind_spot_cues: u64,
    pub forced_cues: u64,
    pub test_cues: u64,
    pub skipped_detections: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_from_frame_spacing() {
        let mut metrics = PipelineMetrics::new();
        assert_eq!(metrics.record_frame(10.0), 0.0);
        let fps = metrics.record_frame(10.05);
        assert!((fps - 20.0).abs() < 1e-6);
        metrics.record_frame(10.10);
        assert!((metrics.avg_fps() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_cue_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_cue(AlertCategory::BlindSpot);
        metrics.record_cue(AlertCategory::BlindSpot);
        metrics.record_cue(AlertCategory::Test);
        let summary = metrics.summary();
        assert_eq!(summary.blind_spot_cues, 2);
        assert_eq!(summary.test_cues, 1);
        assert_eq!(summary.closing_speed_cues, 0);
    }
}
