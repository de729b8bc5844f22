// src/pipeline/clock.rs
//
// Time source for cooldowns and FPS. Injected so tests and replays never
// depend on wall-clock delays.

use std::cell::Cell;
#[cfg(test)]
use std::rc::Rc;
use std::time::Instant;

pub trait Clock {
    /// Seconds on this clock's own timeline
    fn now(&self) -> f64;

    /// Called with the frame timestamp before each frame is processed.
    fn sync_to_frame(&self, _timestamp: f64) {}
}

/// Monotonic seconds since construction
pub struct SystemClock {
    started_at: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Settable clock for tests. Clones share the same time.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, t: f64) {
        self.now.set(t);
    }

    pub fn advance(&self, dt: f64) {
        self.now.set(self.now.get() + dt);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Follows recorded frame timestamps, so replays reproduce cooldown timing.
#[derive(Debug, Default)]
pub struct ReplayClock {
    now: Cell<f64>,
}

impl ReplayClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for ReplayClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn sync_to_frame(&self, timestamp: f64) {
        self.now.set(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(1.0);
        let handle = clock.clone();
        handle.advance(2.5);
        assert_eq!(clock.now(), 3.5);
        clock.sync_to_frame(99.0);
        assert_eq!(handle.now(), 3.5, "Manual clock ignores frame timestamps");
    }

    #[test]
    fn test_replay_clock_follows_frames() {
        let clock = ReplayClock::new();
        clock.sync_to_frame(12.25);
        assert_eq!(clock.now(), 12.25);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
