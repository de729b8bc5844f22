use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Falls back to built-in defaults only when the file is absent.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bs = &self.blind_spot;
        for (name, ratio) in [
            ("left_max_ratio", bs.left_max_ratio),
            ("right_min_ratio", bs.right_min_ratio),
            ("top_exclusion_ratio", bs.top_exclusion_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                bail!("blind_spot.{} must be in (0, 1), got {}", name, ratio);
            }
        }
        if bs.left_max_ratio >= bs.right_min_ratio {
            bail!(
                "blind_spot zones overlap: left_max_ratio {} >= right_min_ratio {}",
                bs.left_max_ratio,
                bs.right_min_ratio
            );
        }
        if self.alerts.cooldown_secs <= 0.0 {
            bail!("alerts.cooldown_secs must be positive");
        }
        if self.alerts.force_cue && self.alerts.force_cue_interval_secs <= 0.0 {
            bail!("alerts.force_cue_interval_secs must be positive");
        }
        if self.video.frame_width == 0 || self.video.frame_height == 0 {
            bail!("video frame dimensions must be non-zero");
        }
        if self.video.max_frames == Some(0) {
            bail!("video.max_frames must be at least 1 when set");
        }
        Ok(())
    }
}
