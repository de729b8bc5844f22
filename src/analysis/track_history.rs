// src/analysis/track_history.rs
//
// Previous-frame geometry per track, one namespace per camera.
// Replaced wholesale once per frame, after the estimators have read it.

use crate::types::{CameraId, TrackId, TrackSnapshot};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TrackHistoryStore {
    snapshots: HashMap<TrackId, TrackSnapshot>,
}

impl TrackHistoryStore {
    pub fn read(&self, track_id: TrackId) -> Option<TrackSnapshot> {
        self.snapshots.get(&track_id).copied()
    }

    /// Tracks missing from `current` are forgotten.
    pub fn replace_all(&mut self, current: HashMap<TrackId, TrackSnapshot>) {
        self.snapshots = current;
    }

    pub fn track_count(&self) -> usize {
        self.snapshots.len()
    }
}

/// Front and back stores. Ids from one camera are never looked up in the other.
#[derive(Debug, Default)]
pub struct TrackHistory {
    front: TrackHistoryStore,
    back: TrackHistoryStore,
}

impl TrackHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, camera: CameraId) -> &TrackHistoryStore {
        match camera {
            CameraId::Front => &self.front,
            CameraId::Back => &self.back,
        }
    }

    pub fn read(&self, camera: CameraId, track_id: TrackId) -> Option<TrackSnapshot> {
        self.store(camera).read(track_id)
    }

    pub fn replace_all(&mut self, camera: CameraId, current: HashMap<TrackId, TrackSnapshot>) {
        match camera {
            CameraId::Front => self.front.replace_all(current),
            CameraId::Back => self.back.replace_all(current),
        }
    }
}
