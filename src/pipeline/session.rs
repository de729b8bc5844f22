// src/pipeline/session.rs
//
// One streaming session: all mutable state lives here, created at start and
// dropped at the end. process_frame() is the single serial state transition
// per frame pair:
//
//   1. filter detections (both cameras)
//   2. closing-speed against the BACK history   ─┐ read history
//   3. blind-spot on the FRONT detections        │
//   4. replace both histories                   ─┘ then write
//   5. alert decision + cue events
//   6. annotations

use super::clock::Clock;
use super::event_bus::{AlertEvent, EventBus};
use super::frame_context::FrameContext;
use super::metrics::PipelineMetrics;
use crate::alert_coordinator::{AlertCoordinator, AlertSignals};
use crate::analysis::{
    BlindSide, BlindSpotClassifier, ClosingSpeedEstimator, FrameDetections, SkipReason,
    TrackHistory,
};
use crate::overlay;
use crate::source::DetectionSource;
use crate::types::{CameraFrame, CameraId, Config};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

const MAX_PENDING_EVENTS: usize = 1024;

/// How a session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A camera produced no frame. The front camera is reported when both ran dry.
    StreamExhausted { camera: CameraId },
    /// The stop flag was raised between frames
    Stopped,
}

pub struct Session<C: Clock> {
    clock: C,
    monitored_class_id: u32,
    history: TrackHistory,
    closing_speed: ClosingSpeedEstimator,
    blind_spot: BlindSpotClassifier,
    coordinator: AlertCoordinator,
    metrics: PipelineMetrics,
    events: EventBus,
    frame_count: u64,
}

impl<C: Clock> Session<C> {
    pub fn new(config: &Config, clock: C) -> Self {
        Self {
            clock,
            monitored_class_id: config.detection.monitored_class_id,
            history: TrackHistory::new(),
            closing_speed: ClosingSpeedEstimator::new(config.closing_speed.clone()),
            blind_spot: BlindSpotClassifier::new(config.blind_spot.clone()),
            coordinator: AlertCoordinator::new(&config.alerts),
            metrics: PipelineMetrics::new(),
            events: EventBus::new(MAX_PENDING_EVENTS),
            frame_count: 0,
        }
    }

    pub fn process_frame(&mut self, front: &CameraFrame, back: &CameraFrame) -> FrameContext {
        self.clock.sync_to_frame(back.timestamp);
        let now = self.clock.now();
        let frame_id = self.frame_count;
        self.frame_count += 1;
        let fps = self.metrics.record_frame(now);

        // 1. Per-frame snapshots
        let front_dets = FrameDetections::collect(front, self.monitored_class_id);
        let back_dets = FrameDetections::collect(back, self.monitored_class_id);

        // 2-3. Estimators read last frame's history
        let closing = self
            .closing_speed
            .estimate(&back_dets, &self.history);
        let blind_spot = self.blind_spot.scan(&front_dets, front.width);

        // 4. Only now overwrite history
        self.history
            .replace_all(CameraId::Back, back_dets.snapshots());
        self.history
            .replace_all(CameraId::Front, front_dets.snapshots());
        debug!(
            "Frame {}: tracking {} back / {} front",
            frame_id,
            self.history.store(CameraId::Back).track_count(),
            self.history.store(CameraId::Front).track_count()
        );

        // Untracked rear detections can't be assessed; front ones still count for blind spots
        let mut skipped: Vec<(CameraId, SkipReason)> = Vec::new();
        skipped.extend(front_dets.skipped.iter().map(|r| (CameraId::Front, *r)));
        skipped.extend(back_dets.skipped.iter().map(|r| (CameraId::Back, *r)));
        skipped.extend(
            std::iter::repeat((CameraId::Back, SkipReason::MissingTrackId)).take(closing.untracked),
        );
        if !skipped.is_empty() {
            debug!("Frame {}: skipped {:?}", frame_id, skipped);
            self.metrics
                .add(&self.metrics.skipped_detections, skipped.len() as u64);
        }
        if closing.any_closing_fast {
            self.metrics.inc(&self.metrics.closing_fast_frames);
        }
        if blind_spot.any() {
            self.metrics.inc(&self.metrics.blind_spot_frames);
        }

        // 5. Alert decision
        let alert = self.coordinator.decide(
            AlertSignals {
                closing_fast: closing.any_closing_fast,
                blind_left: blind_spot.left,
                blind_right: blind_spot.right,
            },
            now,
        );
        for cue in &alert.cues {
            self.metrics.record_cue(cue.category);
            self.events.publish(AlertEvent {
                frame_id,
                timestamp: now,
                category: cue.category,
                message: cue.message.to_string(),
            });
        }

        // 6. Annotations
        let mut annotations = vec![overlay::fps_mark(fps)];
        annotations.extend(overlay::zone_marks(
            self.blind_spot.zone_rects(front.width, front.height),
        ));
        for a in closing.flagged() {
            annotations.extend(overlay::closing_fast_marks(a.bbox, a.measurement.speed_score));
        }
        if blind_spot.left {
            annotations.push(overlay::blind_spot_mark(BlindSide::Left));
        }
        if blind_spot.right {
            annotations.push(overlay::blind_spot_mark(BlindSide::Right));
        }

        FrameContext {
            frame_id,
            timestamp: now,
            fps,
            closing,
            blind_spot,
            alert,
            annotations,
            skipped,
        }
    }

    /// Plays a cue right away, outside the frame loop.
    pub fn test_cue(&mut self) -> AlertEvent {
        let now = self.clock.now();
        let cue = self.coordinator.test_cue(now);
        self.metrics.record_cue(cue.category);
        let event = AlertEvent {
            frame_id: self.frame_count,
            timestamp: now,
            category: cue.category,
            message: cue.message.to_string(),
        };
        self.events.publish(event.clone());
        event
    }

    /// Runs until a stream is exhausted or `stop` is raised. `stop` is only
    /// checked between frames, never mid-decision.
    pub fn run<F, B, H>(
        &mut self,
        front: &mut F,
        back: &mut B,
        stop: &AtomicBool,
        mut on_frame: H,
    ) -> Result<SessionEnd>
    where
        F: DetectionSource + ?Sized,
        B: DetectionSource + ?Sized,
        H: FnMut(&FrameContext),
    {
        loop {
            if stop.load(Ordering::Relaxed) {
                info!("Stream stopped after {} frames", self.frame_count);
                return Ok(SessionEnd::Stopped);
            }

            let front_frame = front.next_frame()?;
            let back_frame = back.next_frame()?;

            let (front_frame, back_frame) = match (front_frame, back_frame) {
                (Some(f), Some(b)) => (f, b),
                (f, _) => {
                    let camera = if f.is_none() {
                        CameraId::Front
                    } else {
                        CameraId::Back
                    };
                    warn!(
                        "{} stream ended after {} frames",
                        camera.as_str(),
                        self.frame_count
                    );
                    return Ok(SessionEnd::StreamExhausted { camera });
                }
            };

            let ctx = self.process_frame(&front_frame, &back_frame);
            on_frame(&ctx);
        }
    }

    pub fn drain_events(&mut self) -> Vec<AlertEvent> {
        self.events.drain()
    }

    pub fn dropped_events(&self) -> u64 {
        self.events.dropped_count()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    #[cfg(test)]
    pub fn history(&self) -> &TrackHistory {
        &self.history
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_coordinator::{AlertCategory, MSG_BLIND_LEFT, MSG_CLOSING_SPEED};
    use crate::overlay::Annotation;
    use crate::pipeline::clock::ManualClock;
    use crate::source::{JsonlSource, VecSource};
    use std::io::Cursor;
    use crate::types::{BBox, Detection, TrackId};

    fn car(track_id: TrackId, bbox: [i32; 4]) -> Detection {
        Detection {
            track_id: Some(track_id),
            class_id: 2,
            bbox: BBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        }
    }

    fn frame(timestamp: f64, detections: Vec<Detection>) -> CameraFrame {
        CameraFrame {
            timestamp,
            width: 640,
            height: 360,
            detections,
        }
    }

    fn empty(timestamp: f64) -> CameraFrame {
        frame(timestamp, vec![])
    }

    // Track 7 on the back camera: center (100,200) area 1000, then
    // center (100,150) area 1200
    fn approach_a() -> Detection {
        car(7, [75, 190, 125, 210])
    }

    fn approach_b() -> Detection {
        car(7, [70, 140, 130, 160])
    }

    fn session(clock: &ManualClock) -> Session<ManualClock> {
        Session::new(&Config::default(), clock.clone())
    }

    #[test]
    fn test_end_to_end_closing_fast() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        let ctx_a = s.process_frame(&empty(0.0), &frame(0.0, vec![approach_a()]));
        assert!(!ctx_a.closing.any_closing_fast, "First sighting never flags");
        assert!(!ctx_a.cue_should_fire());

        clock.advance(0.05);
        let ctx_b = s.process_frame(&empty(0.05), &frame(0.05, vec![approach_b()]));
        let a = &ctx_b.closing.assessments[0];
        assert_eq!(a.measurement.dy, -50);
        assert!((a.measurement.size_ratio - 1.2).abs() < 1e-9);
        assert!((a.measurement.speed_score - 60.0).abs() < 1e-9);
        assert!(ctx_b.closing.any_closing_fast);
        assert_eq!(ctx_b.alert.message, Some(MSG_CLOSING_SPEED));
        assert_eq!(ctx_b.alert.cue_categories(), vec![AlertCategory::ClosingSpeed]);

        let rects = ctx_b
            .annotations_for(CameraId::Back)
            .filter(|a| matches!(a, Annotation::Rect { .. }))
            .count();
        assert_eq!(rects, 1);
    }

    #[test]
    fn test_history_lags_one_frame() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        s.process_frame(&empty(0.0), &frame(0.0, vec![approach_a()]));
        assert_eq!(
            s.history().read(CameraId::Back, 7).map(|snap| snap.center),
            Some((100, 200))
        );

        // Same geometry twice: compared against the previous frame, not itself
        let ctx = s.process_frame(&empty(0.05), &frame(0.05, vec![approach_b()]));
        assert!(ctx.closing.any_closing_fast);
        assert_eq!(
            s.history().read(CameraId::Back, 7).map(|snap| snap.center),
            Some((100, 150))
        );
    }

    #[test]
    fn test_disappeared_track_is_forgotten() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        s.process_frame(&empty(0.0), &frame(0.0, vec![approach_a()]));
        s.process_frame(&empty(0.05), &frame(0.05, vec![]));
        assert_eq!(s.history().read(CameraId::Back, 7), None);

        // Reappearing counts as a first sighting
        let ctx = s.process_frame(&empty(0.10), &frame(0.10, vec![approach_b()]));
        assert!(!ctx.closing.any_closing_fast);
    }

    #[test]
    fn test_front_ids_never_feed_back_history() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        s.process_frame(&frame(0.0, vec![approach_a()]), &empty(0.0));
        let ctx = s.process_frame(&empty(0.05), &frame(0.05, vec![approach_b()]));
        assert!(!ctx.closing.any_closing_fast);
    }

    #[test]
    fn test_both_alerts_same_frame() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        s.process_frame(&empty(0.0), &frame(0.0, vec![approach_a()]));
        clock.advance(0.05);
        let ctx = s.process_frame(
            &frame(0.05, vec![car(3, [40, 250, 80, 300])]),
            &frame(0.05, vec![approach_b()]),
        );
        assert_eq!(ctx.alert.message, Some(MSG_BLIND_LEFT));
        assert_eq!(
            ctx.alert.cue_categories(),
            vec![AlertCategory::ClosingSpeed, AlertCategory::BlindSpot]
        );

        let events = s.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, MSG_CLOSING_SPEED);
        assert_eq!(events[1].message, MSG_BLIND_LEFT);
        assert_eq!(s.metrics().summary().closing_speed_cues, 1);
        assert_eq!(s.metrics().summary().blind_spot_cues, 1);
    }

    #[test]
    fn test_blind_spot_cooldown_across_frames() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);
        let left = || frame(0.0, vec![car(3, [40, 250, 80, 300])]);

        assert!(s.process_frame(&left(), &empty(0.0)).cue_should_fire());
        clock.set(4.9);
        let held = s.process_frame(&left(), &empty(4.9));
        assert!(held.blind_spot.left, "Zone is still occupied");
        assert!(!held.cue_should_fire());
        clock.set(5.1);
        assert!(s.process_frame(&left(), &empty(5.1)).cue_should_fire());
    }

    #[test]
    fn test_invalid_detections_are_skipped_not_fatal() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        let back = frame(
            0.0,
            vec![
                Detection {
                    track_id: None,
                    class_id: 2,
                    bbox: BBox::new(0, 0, 10, 10),
                },
                car(4, [50, 50, 40, 60]),
                approach_a(),
            ],
        );
        let ctx = s.process_frame(&empty(0.0), &back);
        assert_eq!(
            ctx.skipped,
            vec![
                (CameraId::Back, SkipReason::MalformedBox),
                (CameraId::Back, SkipReason::MissingTrackId),
            ]
        );
        assert_eq!(s.metrics().summary().skipped_detections, 2);
        assert!(s.history().read(CameraId::Back, 7).is_some());
    }

    #[test]
    fn test_untracked_front_detection_counts_for_blind_spot() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        // center x = 60, no tracker id
        let front = frame(
            0.0,
            vec![Detection {
                track_id: None,
                class_id: 2,
                bbox: BBox::new(40, 250, 80, 300),
            }],
        );
        let ctx = s.process_frame(&front, &empty(0.0));
        assert!(ctx.blind_spot.left);
        assert!(!ctx.blind_spot.right);
        assert_eq!(ctx.alert.message, Some(MSG_BLIND_LEFT));
        assert_eq!(ctx.alert.cue_categories(), vec![AlertCategory::BlindSpot]);
        assert!(ctx.skipped.is_empty(), "Front zones need no identity");
        assert_eq!(s.history().store(CameraId::Front).track_count(), 0);
    }

    #[test]
    fn test_malformed_front_box_is_skipped() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);

        // Inverted box whose corners would otherwise straddle the left zone
        let front = frame(0.0, vec![car(3, [80, 250, 40, 300])]);
        let ctx = s.process_frame(&front, &empty(0.0));
        assert!(!ctx.blind_spot.any());
        assert!(!ctx.cue_should_fire());
        assert_eq!(ctx.skipped, vec![(CameraId::Front, SkipReason::MalformedBox)]);
    }

    #[test]
    fn test_huge_recorded_coordinates_are_skipped_on_both_cameras() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);
        let line = r#"{"timestamp": 0.0, "detections": [{"track_id": 7, "class_id": 2, "bbox": [-3e9, 100, 3e9, 200]}]}"#;
        let mut front_src = JsonlSource::from_reader(Cursor::new(line), "front", 640, 360);
        let mut back_src = JsonlSource::from_reader(Cursor::new(line), "back", 640, 360);
        let front = front_src.next_frame().unwrap().unwrap();
        let back = back_src.next_frame().unwrap().unwrap();

        let ctx = s.process_frame(&front, &back);
        assert_eq!(
            ctx.skipped,
            vec![
                (CameraId::Front, SkipReason::MalformedBox),
                (CameraId::Back, SkipReason::MalformedBox),
            ]
        );
        assert!(!ctx.blind_spot.any());
        assert!(!ctx.closing.any_closing_fast);
        assert_eq!(s.history().read(CameraId::Back, 7), None);
    }

    #[test]
    fn test_zone_outlines_drawn_every_frame() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);
        let ctx = s.process_frame(&empty(0.0), &empty(0.0));
        let outlines: Vec<_> = ctx
            .annotations_for(CameraId::Front)
            .filter_map(|a| match a {
                Annotation::Rect { bbox, .. } => Some(*bbox),
                _ => None,
            })
            .collect();
        assert_eq!(
            outlines,
            vec![BBox::new(0, 118, 217, 360), BBox::new(422, 118, 640, 360)]
        );
    }

    #[test]
    fn test_run_ends_on_exhausted_stream() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);
        let mut front = VecSource::new(vec![empty(0.0), empty(0.05), empty(0.10)]);
        let mut back = VecSource::new(vec![
            frame(0.0, vec![approach_a()]),
            frame(0.05, vec![approach_b()]),
        ]);
        let stop = AtomicBool::new(false);

        let mut seen = Vec::new();
        let end = s
            .run(&mut front, &mut back, &stop, |ctx| {
                seen.push(ctx.alert.display_text())
            })
            .unwrap();

        assert_eq!(
            end,
            SessionEnd::StreamExhausted {
                camera: CameraId::Back
            }
        );
        assert_eq!(seen, vec!["All Clear", MSG_CLOSING_SPEED]);
        assert_eq!(s.frame_count(), 2);
    }

    #[test]
    fn test_run_honours_stop_flag() {
        let clock = ManualClock::new(0.0);
        let mut s = session(&clock);
        let mut front = VecSource::new(vec![empty(0.0); 5]);
        let mut back = VecSource::new(vec![empty(0.0); 5]);
        let stop = AtomicBool::new(false);

        let end = s
            .run(&mut front, &mut back, &stop, |ctx| {
                if ctx.frame_id == 1 {
                    stop.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();
        assert_eq!(end, SessionEnd::Stopped);
        assert_eq!(s.frame_count(), 2);
    }

    #[test]
    fn test_test_cue_is_published() {
        let clock = ManualClock::new(3.0);
        let mut s = session(&clock);
        let event = s.test_cue();
        assert_eq!(event.category, AlertCategory::Test);
        assert_eq!(event.timestamp, 3.0);
        assert_eq!(s.drain_events(), vec![event]);
        assert_eq!(s.metrics().summary().test_cues, 1);
    }
}
