// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persistent identity assigned by the detector/tracker backend.
pub type TrackId = u32;

/// The ball is special-cased to a single detection per frame, always
/// stored under this id.
pub const BALL_TRACK_ID: TrackId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Player,
    Referee,
    Ball,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 3] =
        [ObjectClass::Player, ObjectClass::Referee, ObjectClass::Ball];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Player => "player",
            ObjectClass::Referee => "referee",
            ObjectClass::Ball => "ball",
        }
    }
}

/// 2D point, pixels or court meters depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Bounding box in `[x1, y1, x2, y2]` pixel order.
pub type Bbox = [f32; 4];

/// Center of a bounding box (ball anchor point).
pub fn bbox_center(bbox: &Bbox) -> Point2 {
    Point2::new((bbox[0] + bbox[2]) / 2.0, (bbox[1] + bbox[3]) / 2.0)
}

/// Bottom-center "foot" point of a bounding box (player/referee anchor).
pub fn foot_position(bbox: &Bbox) -> Point2 {
    Point2::new((bbox[0] + bbox[2]) / 2.0, bbox[3])
}

/// Anchor point for a class: bbox center for the ball, foot point otherwise.
pub fn anchor_point(class: ObjectClass, bbox: &Bbox) -> Point2 {
    match class {
        ObjectClass::Ball => bbox_center(bbox),
        _ => foot_position(bbox),
    }
}

/// 3-channel RGB color descriptor used for shirt sampling.
pub type ColorRgb = [f32; 3];

/// Per (frame, track_id) record. Stages 3-7 fill in the optional fields
/// in pipeline order; `None` means the producing stage has not run or
/// skipped this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub bbox: Bbox,
    /// Raw anchor point (pixels).
    pub position: Point2,
    /// Camera-compensated anchor point (pixels).
    #[serde(default)]
    pub position_adjusted: Option<Point2>,
    /// Court-projected anchor point (meters).
    #[serde(default)]
    pub position_transformed: Option<Point2>,
    /// Windowed speed in km/h.
    #[serde(default)]
    pub speed: Option<f32>,
    /// Cumulative distance in meters.
    #[serde(default)]
    pub distance: Option<f32>,
    /// Team id (1 or 2), players only.
    #[serde(default)]
    pub team: Option<u8>,
    #[serde(default)]
    pub team_color: Option<ColorRgb>,
    #[serde(default)]
    pub has_ball: bool,
}

impl TrackRecord {
    pub fn new(class: ObjectClass, bbox: Bbox) -> Self {
        Self {
            position: anchor_point(class, &bbox),
            bbox,
            position_adjusted: None,
            position_transformed: None,
            speed: None,
            distance: None,
            team: None,
            team_color: None,
            has_ball: false,
        }
    }
}

/// One frame's records for a class: track id → record.
pub type FrameTracks = HashMap<TrackId, TrackRecord>;

/// Frame-aligned track store. Invariant: every class's sequence length
/// equals the video's `total_frames` exactly after normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackStore {
    pub players: Vec<FrameTracks>,
    pub referees: Vec<FrameTracks>,
    pub ball: Vec<FrameTracks>,
}

impl TrackStore {
    pub fn with_frames(total_frames: usize) -> Self {
        Self {
            players: vec![FrameTracks::new(); total_frames],
            referees: vec![FrameTracks::new(); total_frames],
            ball: vec![FrameTracks::new(); total_frames],
        }
    }

    pub fn class(&self, class: ObjectClass) -> &Vec<FrameTracks> {
        match class {
            ObjectClass::Player => &self.players,
            ObjectClass::Referee => &self.referees,
            ObjectClass::Ball => &self.ball,
        }
    }

    pub fn class_mut(&mut self, class: ObjectClass) -> &mut Vec<FrameTracks> {
        match class {
            ObjectClass::Player => &mut self.players,
            ObjectClass::Referee => &mut self.referees,
            ObjectClass::Ball => &mut self.ball,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.players.len()
    }

    /// The ball record for a frame, if present (reserved id 1).
    pub fn ball_record(&self, frame: usize) -> Option<&TrackRecord> {
        self.ball.get(frame).and_then(|f| f.get(&BALL_TRACK_ID))
    }
}

/// Owned RGB8 frame, packed row-major, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self {
            data,
            width,
            height,
        }
    }

    #[inline]
    pub fn pixel_rgb(&self, x: usize, y: usize) -> ColorRgb {
        let idx = (y * self.width + x) * 3;
        [
            self.data[idx] as f32,
            self.data[idx + 1] as f32,
            self.data[idx + 2] as f32,
        ]
    }
}

/// Grayscale frame, row-major: pixel at (x, y) = data[y * width + x].
#[derive(Clone)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert from RGB packed bytes (3 bytes per pixel), ITU-R BT.601 luma.
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        let mut gray = Vec::with_capacity(width * height);
        for pixel in rgb.chunks_exact(3) {
            let g =
                (0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32) as u8;
            gray.push(g);
        }
        Self::new(gray, width, height)
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_rgb(&frame.data, frame.width, frame.height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Per-frame camera displacement in pixels; index 0 is always (0, 0).
pub type CameraMovement = Vec<Point2>;

/// Per-frame possession outcome. Team id 0 means "no team yet".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PossessionRecord {
    /// Team in control per frame; 0 until the first assignment, then the
    /// previous frame's team carries forward through unassigned frames.
    pub team_control: Vec<u8>,
    /// Player assigned the ball per frame, if any was within threshold.
    pub owner: Vec<Option<TrackId>>,
}
