// src/alert_coordinator.rs
//
// Merges the per-frame signals into one displayed alert and decides which
// audible cues fire. Each category has its own cooldown; they never gate
// each other.
//
// Evaluation order per frame (a later step overwrites the message of an
// earlier one, but every step fires its own cue):
//   1. closing-speed
//   2. blind-spot (left wins when both sides are occupied)
//   3. forced diagnostic cue, if enabled
//
// Cue policy when several categories fire in the same frame: one cue per
// category, in evaluation order.

use crate::types::AlertConfig;
use serde::Serialize;
use tracing::{debug, info};

pub const MSG_CLOSING_SPEED: &str = "HIGH-SPEED VEHICLE APPROACHING!";
pub const MSG_BLIND_LEFT: &str = "BLIND SPOT LEFT!";
pub const MSG_BLIND_RIGHT: &str = "BLIND SPOT RIGHT!";
pub const MSG_FORCED: &str = "FORCE BEEP: OK";
pub const MSG_TEST: &str = "TEST BEEP";
pub const MSG_ALL_CLEAR: &str = "All Clear";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    ClosingSpeed,
    BlindSpot,
    Forced,
    /// Manually requested test cue
    Test,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClosingSpeed => "CLOSING_SPEED",
            Self::BlindSpot => "BLIND_SPOT",
            Self::Forced => "FORCED",
            Self::Test => "TEST",
        }
    }
}

/// Suppresses re-firing until strictly more than `window` seconds have passed.
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    last_fired: Option<f64>,
    window: f64,
}

impl CooldownTimer {
    pub fn new(window: f64) -> Self {
        Self {
            last_fired: None,
            window,
        }
    }

    /// Starts the window at `now` without firing.
    pub fn arm(&mut self, now: f64) {
        self.last_fired = Some(now);
    }

    pub fn is_ready(&self, now: f64) -> bool {
        match self.last_fired {
            None => true,
            Some(t) => now - t > self.window,
        }
    }

    /// Fires and restarts the window if ready.
    pub fn try_fire(&mut self, now: f64) -> bool {
        if self.is_ready(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_fired(&self) -> Option<f64> {
        self.last_fired
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertSignals {
    pub closing_fast: bool,
    pub blind_left: bool,
    pub blind_right: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertCue {
    pub category: AlertCategory,
    /// Message this cue was raised with, even if a later step replaced it on screen
    pub message: &'static str,
}

/// What the presentation layer shows and plays for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertState {
    /// `None` means all clear
    pub message: Option<&'static str>,
    /// Cues to play this frame, already cooldown-gated
    pub cues: Vec<AlertCue>,
}

impl AlertState {
    pub fn cue_should_fire(&self) -> bool {
        !self.cues.is_empty()
    }

    #[cfg(test)]
    pub fn cue_categories(&self) -> Vec<AlertCategory> {
        self.cues.iter().map(|c| c.category).collect()
    }

    fn raise(&mut self, category: AlertCategory, message: &'static str) {
        self.message = Some(message);
        self.cues.push(AlertCue { category, message });
    }

    pub fn display_text(&self) -> &'static str {
        self.message.unwrap_or(MSG_ALL_CLEAR)
    }
}

pub struct AlertCoordinator {
    closing_speed: CooldownTimer,
    blind_spot: CooldownTimer,
    forced: Option<CooldownTimer>,
}

impl AlertCoordinator {
    pub fn new(config: &AlertConfig) -> Self {
        let forced = config
            .force_cue
            .then(|| CooldownTimer::new(config.force_cue_interval_secs));
        Self {
            closing_speed: CooldownTimer::new(config.cooldown_secs),
            blind_spot: CooldownTimer::new(config.cooldown_secs),
            forced,
        }
    }

    pub fn decide(&mut self, signals: AlertSignals, now: f64) -> AlertState {
        let mut state = AlertState::default();

        if signals.closing_fast && self.closing_speed.try_fire(now) {
            info!("🚨 {}", MSG_CLOSING_SPEED);
            state.raise(AlertCategory::ClosingSpeed, MSG_CLOSING_SPEED);
        }

        if (signals.blind_left || signals.blind_right) && self.blind_spot.try_fire(now) {
            let msg = if signals.blind_left {
                MSG_BLIND_LEFT
            } else {
                MSG_BLIND_RIGHT
            };
            info!("⚠️  {}", msg);
            state.raise(AlertCategory::BlindSpot, msg);
        }

        // The first frame starts the forced interval instead of firing
        if let Some(timer) = self.forced.as_mut() {
            if timer.last_fired().is_none() {
                timer.arm(now);
            } else if timer.try_fire(now) {
                debug!("Forced diagnostic cue at {:.2}s", now);
                state.raise(AlertCategory::Forced, MSG_FORCED);
            }
        }

        state
    }

    /// Immediate cue for checking the audio path. Ignores every cooldown and
    /// leaves the displayed message alone.
    pub fn test_cue(&self, now: f64) -> AlertCue {
        info!("🔔 Test cue requested at {:.2}s", now);
        AlertCue {
            category: AlertCategory::Test,
            message: MSG_TEST,
        }
    }
}
