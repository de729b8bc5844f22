// src/source.rs
//
// Where per-camera detections come from. The detector/tracker itself is
// upstream; here we only replay what it produced.
//
// Recorded format: one JSON object per line, per frame
//   {"timestamp": 0.05, "width": 640, "height": 360,
//    "detections": [{"track_id": 7, "class_id": 2, "bbox": [x1, y1, x2, y2]}]}
// `width`/`height` and `track_id` may be omitted.

use crate::types::{BBox, CameraFrame, Detection, TrackId};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
#[cfg(test)]
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub trait DetectionSource {
    /// `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<CameraFrame>>;
}

/// In-memory stream for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct VecSource {
    frames: VecDeque<CameraFrame>,
}

#[cfg(test)]
impl VecSource {
    pub fn new(frames: Vec<CameraFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

#[cfg(test)]
impl DetectionSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        Ok(self.frames.pop_front())
    }
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp: f64,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    detections: Vec<DetectionRecord>,
}

#[derive(Debug, Deserialize)]
struct DetectionRecord {
    #[serde(default)]
    track_id: Option<TrackId>,
    class_id: u32,
    bbox: [f64; 4],
}

/// Truncates to whole pixels like the detector's integer boxes. Values that
/// don't fit saturate (and non-finite ones pin to `i32::MIN`) so the box fails
/// `BBox::is_well_formed` downstream instead of wrapping.
fn to_pixel(v: f64) -> i32 {
    if v.is_finite() {
        v as i32
    } else {
        i32::MIN
    }
}

impl DetectionRecord {
    fn into_detection(self) -> Detection {
        let [x1, y1, x2, y2] = self.bbox.map(to_pixel);
        Detection {
            track_id: self.track_id,
            class_id: self.class_id,
            bbox: BBox::new(x1, y1, x2, y2),
        }
    }
}

/// JSON-lines recording of one camera
pub struct JsonlSource<R: BufRead> {
    reader: R,
    label: String,
    line_no: usize,
    default_width: u32,
    default_height: u32,
}

impl JsonlSource<BufReader<File>> {
    pub fn open(path: &Path, default_width: u32, default_height: u32) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening recording {}", path.display()))?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
            default_width,
            default_height,
        ))
    }
}

impl<R: BufRead> JsonlSource<R> {
    pub fn from_reader(
        reader: R,
        label: impl Into<String>,
        default_width: u32,
        default_height: u32,
    ) -> Self {
        Self {
            reader,
            label: label.into(),
            line_no: 0,
            default_width,
            default_height,
        }
    }
}

impl<R: BufRead> DetectionSource for JsonlSource<R> {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("reading {}", self.label))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !line.trim().is_empty() {
                break;
            }
        }

        let record: FrameRecord = serde_json::from_str(line.trim())
            .with_context(|| format!("{}:{}: bad frame record", self.label, self.line_no))?;

        Ok(Some(CameraFrame {
            timestamp: record.timestamp,
            width: record.width.unwrap_or(self.default_width),
            height: record.height.unwrap_or(self.default_height),
            detections: record
                .detections
                .into_iter()
                .map(DetectionRecord::into_detection)
                .collect(),
        }))
    }
}

// ============================================================================
// SCENARIO DISCOVERY
// ============================================================================

const FRONT_SUFFIX: &str = ".front.jsonl";
const BACK_SUFFIX: &str = ".back.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub front: PathBuf,
    pub back: PathBuf,
}

pub fn find_scenarios(input_dir: &str) -> Result<Vec<Scenario>> {
    let paths = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path());

    let scenarios = pair_recordings(paths);
    info!("Found {} scenario(s) in {}", scenarios.len(), input_dir);
    Ok(scenarios)
}

/// Pairs `<name>.front.jsonl` with `<name>.back.jsonl`, sorted by name.
pub fn pair_recordings(paths: impl IntoIterator<Item = PathBuf>) -> Vec<Scenario> {
    let mut halves: BTreeMap<PathBuf, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();

    for path in paths {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let (stem, is_front) = if let Some(stem) = file_name.strip_suffix(FRONT_SUFFIX) {
            (stem.to_string(), true)
        } else if let Some(stem) = file_name.strip_suffix(BACK_SUFFIX) {
            (stem.to_string(), false)
        } else {
            continue;
        };
        let key = path.with_file_name(stem);
        let entry = halves.entry(key).or_default();
        if is_front {
            entry.0 = Some(path);
        } else {
            entry.1 = Some(path);
        }
    }

    let mut scenarios = Vec::new();
    for (key, pair) in halves {
        let name = key
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match pair {
            (Some(front), Some(back)) => scenarios.push(Scenario { name, front, back }),
            (Some(only), None) | (None, Some(only)) => {
                warn!("Unpaired recording ignored: {}", only.display())
            }
            (None, None) => {}
        }
    }
    scenarios
}
