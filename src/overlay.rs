// src/overlay.rs
//
// Drawing instructions for the presentation layer. Nothing here touches
// pixels; a renderer turns these into rectangles and text on the frame.

use crate::analysis::{BlindSide, ZoneRect};
use crate::types::{BBox, CameraId};
use serde::Serialize;

/// BGR
pub type Color = [u8; 3];

pub mod colors {
    use super::Color;

    pub const RED: Color = [0, 0, 255];
    pub const YELLOW: Color = [0, 255, 255];
    pub const GREEN: Color = [0, 255, 0];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Rect {
        camera: CameraId,
        bbox: BBox,
        color: Color,
        thickness: i32,
    },
    Text {
        camera: CameraId,
        origin: (i32, i32),
        text: String,
        scale: f32,
        color: Color,
        thickness: i32,
    },
}

impl Annotation {
    pub fn camera(&self) -> CameraId {
        match self {
            Self::Rect { camera, .. } | Self::Text { camera, .. } => *camera,
        }
    }
}

/// Red box with the label and score stacked above it
pub fn closing_fast_marks(bbox: BBox, speed_score: f64) -> [Annotation; 3] {
    [
        Annotation::Rect {
            camera: CameraId::Back,
            bbox,
            color: colors::RED,
            thickness: 4,
        },
        Annotation::Text {
            camera: CameraId::Back,
            origin: (bbox.x1, bbox.y1 - 10),
            text: "HIGH SPEED!".to_string(),
            scale: 0.8,
            color: colors::RED,
            thickness: 2,
        },
        Annotation::Text {
            camera: CameraId::Back,
            origin: (bbox.x1, bbox.y1 - 30),
            text: format!("Score:{:.1}", speed_score),
            scale: 0.6,
            color: colors::YELLOW,
            thickness: 2,
        },
    ]
}

pub fn blind_spot_mark(side: BlindSide) -> Annotation {
    let (origin, text) = match side {
        BlindSide::Left => ((10, 60), "BLIND LEFT!"),
        BlindSide::Right => ((350, 60), "BLIND RIGHT!"),
    };
    Annotation::Text {
        camera: CameraId::Front,
        origin,
        text: text.to_string(),
        scale: 1.0,
        color: colors::RED,
        thickness: 3,
    }
}

/// Thin outlines of both blind-spot zones
pub fn zone_marks(zones: [ZoneRect; 2]) -> [Annotation; 2] {
    zones.map(|zone| Annotation::Rect {
        camera: CameraId::Front,
        bbox: zone.rect,
        color: colors::YELLOW,
        thickness: 1,
    })
}

pub fn fps_mark(fps: f64) -> Annotation {
    Annotation::Text {
        camera: CameraId::Front,
        origin: (10, 30),
        text: format!("FPS: {:.1}", fps),
        scale: 0.8,
        color: colors::GREEN,
        thickness: 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_fast_marks_layout() {
        let marks = closing_fast_marks(BBox::new(70, 140, 130, 160), 60.0);
        assert_eq!(
            marks[0],
            Annotation::Rect {
                camera: CameraId::Back,
                bbox: BBox::new(70, 140, 130, 160),
                color: colors::RED,
                thickness: 4,
            }
        );
        match &marks[2] {
            Annotation::Text { origin, text, .. } => {
                assert_eq!(*origin, (70, 110));
                assert_eq!(text, "Score:60.0");
            }
            other => panic!("Expected score text, got {:?}", other),
        }
        assert!(marks.iter().all(|m| m.camera() == CameraId::Back));
    }

    #[test]
    fn test_blind_spot_marks_on_front_camera() {
        let left = blind_spot_mark(BlindSide::Left);
        let right = blind_spot_mark(BlindSide::Right);
        assert_eq!(left.camera(), CameraId::Front);
        match right {
            Annotation::Text { origin, text, .. } => {
                assert_eq!(origin, (350, 60));
                assert_eq!(text, "BLIND RIGHT!");
            }
            other => panic!("Expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_zone_marks_outline_front_zones() {
        let zones = [
            ZoneRect {
                side: BlindSide::Left,
                rect: BBox::new(0, 118, 217, 360),
            },
            ZoneRect {
                side: BlindSide::Right,
                rect: BBox::new(422, 118, 640, 360),
            },
        ];
        let [left, right] = zone_marks(zones);
        assert_eq!(
            right,
            Annotation::Rect {
                camera: CameraId::Front,
                bbox: BBox::new(422, 118, 640, 360),
                color: colors::YELLOW,
                thickness: 1,
            }
        );
        assert_eq!(left.camera(), CameraId::Front);
    }

    #[test]
    fn test_fps_mark_format() {
        match fps_mark(19.96) {
            Annotation::Text { text, .. } => assert_eq!(text, "FPS: 20.0"),
            other => panic!("Expected text, got {:?}", other),
        }
    }
}
