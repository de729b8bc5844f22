// src/pipeline/event_bus.rs
//
// Fired cues are published here instead of being written out inline, so the
// frame loop stays free of I/O. The driver drains the bus per session.

use crate::alert_coordinator::AlertCategory;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub frame_id: u64,
    /// Session clock, seconds
    pub timestamp: f64,
    pub category: AlertCategory,
    pub message: String,
}

/// Bounded queue of fired cues. When full, the oldest cue makes room.
pub struct EventBus {
    events: VecDeque<AlertEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: AlertEvent) {
        if self.events.len() >= self.max_pending {
            if let Some(oldest) = self.events.pop_front() {
                self.dropped += 1;
                warn!(
                    "Event bus full ({} events), dropped {} cue from frame {}",
                    self.max_pending,
                    oldest.category.as_str(),
                    oldest.frame_id
                );
            }
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<AlertEvent> {
        self.events.drain(..).collect()
    }

    /// Cues lost to overflow since the bus was created
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(frame_id: u64) -> AlertEvent {
        AlertEvent {
            frame_id,
            timestamp: frame_id as f64 * 0.05,
            category: AlertCategory::BlindSpot,
            message: "BLIND SPOT LEFT!".to_string(),
        }
    }

    #[test]
    fn test_full_bus_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.publish(event(1));
        bus.publish(event(2));
        bus.publish(event(3));
        let drained = bus.drain();
        assert_eq!(
            drained.iter().map(|e| e.frame_id).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(bus.dropped_count(), 1);
        assert!(bus.drain().is_empty());
    }
}
