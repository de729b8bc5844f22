// src/main.rs

mod alert_coordinator;
mod analysis;
mod config;
mod overlay;
mod pipeline;
mod source;
mod types;

use alert_coordinator::AlertCue;
use analysis::BlindSide;
use anyhow::{Context, Result};
use overlay::Annotation;
use pipeline::{
    AlertEvent, Clock, FrameContext, MetricsSummary, ReplayClock, Session, SessionEnd,
    SystemClock,
};
use serde::Serialize;
use source::{JsonlSource, Scenario};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::{BBox, CameraId, ClockMode, Config, TrackId};

const CONFIG_PATH: &str = "config.yaml";

#[derive(Serialize)]
struct AlertLog<'a> {
    scenario: &'a str,
    generated_at: String,
    end: &'a str,
    metrics: MetricsSummary,
    dropped_events: u64,
    alerts: Vec<AlertEvent>,
}

/// One line of `<scenario>_frames.jsonl`: what a renderer shows for a frame
#[derive(Serialize)]
struct FrameRecord<'a> {
    frame_id: u64,
    timestamp: f64,
    fps: f64,
    display: &'static str,
    cues: &'a [AlertCue],
    closing_fast: bool,
    /// Rear tracks that met every closing-speed condition
    closing_tracks: Vec<TrackId>,
    blind_left: bool,
    blind_right: bool,
    blind_hits: &'a [(BlindSide, BBox)],
    skipped: usize,
    front: Vec<&'a Annotation>,
    back: Vec<&'a Annotation>,
}

impl<'a> FrameRecord<'a> {
    fn from_context(ctx: &'a FrameContext) -> Self {
        Self {
            frame_id: ctx.frame_id,
            timestamp: ctx.timestamp,
            fps: ctx.fps,
            display: ctx.alert.display_text(),
            cues: &ctx.alert.cues,
            closing_fast: ctx.closing.any_closing_fast,
            closing_tracks: ctx.closing.flagged().map(|a| a.track_id).collect(),
            blind_left: ctx.blind_spot.left,
            blind_right: ctx.blind_spot.right,
            blind_hits: &ctx.blind_spot.hits,
            skipped: ctx.skipped.len(),
            front: ctx.annotations_for(CameraId::Front).collect(),
            back: ctx.annotations_for(CameraId::Back).collect(),
        }
    }
}

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("speedguard={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚗 SpeedGuard starting");
    if Path::new(CONFIG_PATH).exists() {
        info!("✓ Configuration loaded from {}", CONFIG_PATH);
    } else {
        warn!("{} not found, using built-in defaults", CONFIG_PATH);
    }
    info!(
        "Closing-speed: dy<-{} ratio>{:.2} y>{} score>{:.1} | cooldown {:.1}s | force cue: {}",
        config.closing_speed.min_upward_px,
        config.closing_speed.min_size_ratio,
        config.closing_speed.min_center_y,
        config.closing_speed.min_speed_score,
        config.alerts.cooldown_secs,
        config.alerts.force_cue
    );

    let scenarios = source::find_scenarios(&config.video.input_dir)?;
    if scenarios.is_empty() {
        error!(
            "No <name>.front.jsonl / <name>.back.jsonl pairs found in {}",
            config.video.input_dir
        );
        return Ok(());
    }

    for (idx, scenario) in scenarios.iter().enumerate() {
        info!("========================================");
        info!(
            "Scenario {}/{}: {}",
            idx + 1,
            scenarios.len(),
            scenario.name
        );
        info!("========================================");

        let result = match config.video.clock {
            ClockMode::Replay => replay_scenario(scenario, &config, ReplayClock::new()),
            ClockMode::System => replay_scenario(scenario, &config, SystemClock::new()),
        };
        match result {
            Ok(path) => info!("✓ Alert log written to {}", path.display()),
            Err(e) => error!("Failed to replay {}: {:#}", scenario.name, e),
        }
    }

    Ok(())
}

fn replay_scenario<C: Clock>(scenario: &Scenario, config: &Config, clock: C) -> Result<PathBuf> {
    let (w, h) = (config.video.frame_width, config.video.frame_height);
    let mut front = JsonlSource::open(&scenario.front, w, h)?;
    let mut back = JsonlSource::open(&scenario.back, w, h)?;

    let output_dir = Path::new(&config.video.output_dir);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let frames_path = output_dir.join(format!("{}_frames.jsonl", scenario.name));
    let mut frames = BufWriter::new(
        File::create(&frames_path)
            .with_context(|| format!("creating {}", frames_path.display()))?,
    );

    let mut session = Session::new(config, clock);
    let delay = Duration::from_millis(config.video.frame_delay_ms);
    let max_frames = config.video.max_frames;

    if config.alerts.test_cue_on_start {
        let event = session.test_cue();
        info!(
            "🔊 [{:>6.2}s] {} → {}",
            event.timestamp,
            event.category.as_str(),
            event.message
        );
    }

    let stop = AtomicBool::new(false);
    let mut write_error = None;

    let end = session.run(&mut front, &mut back, &stop, |ctx| {
        if ctx.cue_should_fire() {
            for cue in &ctx.alert.cues {
                info!(
                    "🔊 [{:>6.2}s] {} → {}",
                    ctx.timestamp,
                    cue.category.as_str(),
                    cue.message
                );
            }
        }

        let line = serde_json::to_string(&FrameRecord::from_context(ctx))
            .map_err(anyhow::Error::from)
            .and_then(|json| writeln!(frames, "{}", json).map_err(anyhow::Error::from));
        if let Err(e) = line {
            write_error = Some(e);
            stop.store(true, Ordering::Relaxed);
            return;
        }

        if max_frames.is_some_and(|max| ctx.frame_id + 1 >= max) {
            info!("Frame limit of {} reached", ctx.frame_id + 1);
            stop.store(true, Ordering::Relaxed);
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    })?;

    if let Some(e) = write_error {
        return Err(e.context(format!("writing {}", frames_path.display())));
    }
    frames
        .flush()
        .with_context(|| format!("writing {}", frames_path.display()))?;

    let end_label = match end {
        SessionEnd::StreamExhausted { camera } => match camera {
            CameraId::Front => "front stream ended",
            CameraId::Back => "back stream ended",
        },
        SessionEnd::Stopped => "stopped",
    };

    let summary = session.metrics().summary();
    info!("  Frames: {}", session.frame_count());
    info!("  Closing-fast frames: {}", summary.closing_fast_frames);
    info!("  Blind-spot frames: {}", summary.blind_spot_frames);
    info!(
        "  Cues: closing={} blind={} forced={} test={}",
        summary.closing_speed_cues,
        summary.blind_spot_cues,
        summary.forced_cues,
        summary.test_cues
    );
    if summary.skipped_detections > 0 {
        warn!("  Skipped detections: {}", summary.skipped_detections);
    }
    info!("  Session ended: {}", end_label);
    info!("  Frame log: {}", frames_path.display());

    let dropped_events = session.dropped_events();
    if dropped_events > 0 {
        warn!("  Alert log overflowed, {} cue(s) lost", dropped_events);
    }

    let log = AlertLog {
        scenario: &scenario.name,
        generated_at: chrono::Local::now().to_rfc3339(),
        end: end_label,
        metrics: summary,
        dropped_events,
        alerts: session.drain_events(),
    };

    let out_path = output_dir.join(format!("{}_alerts.json", scenario.name));
    let json = serde_json::to_string_pretty(&log)?;
    std::fs::write(&out_path, json)
        .with_context(|| format!("writing {}", out_path.display()))?;

    Ok(out_path)
}
