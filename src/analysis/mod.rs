// src/analysis/mod.rs
//
// Per-frame signal extraction.
//
// Signal flow:
//   Back-cam detections  → frame_detections → closing_speed ─┐ (reads track_history)
//   Front-cam detections → frame_detections → blind_spot ────┼→ alert_coordinator
//                                             track_history ←┘ (replaced last)

pub mod blind_spot;
pub mod closing_speed;
pub mod frame_detections;
pub mod track_history;

pub use blind_spot::{BlindSide, BlindSpotClassifier, BlindSpotReport, ZoneRect};
pub use closing_speed::{ClosingSpeedEstimator, ClosingSpeedReport};
pub use frame_detections::{FrameDetections, SkipReason};
pub use track_history::TrackHistory;
