//! Landmark data model produced by the extraction front-end.
//!
//! Coordinates are normalized to [0, 1] relative to frame width/height with
//! `y` growing downwards; `z` is a relative depth scale. A keypoint the
//! tracker did not resolve is `None` and is skipped by every computation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::HAND_KEYPOINTS;

pub const WRIST: usize = 0;
pub const THUMB_MCP: usize = 2;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

/// Wrist plus the four metacarpophalangeal joints.
pub const PALM_POINTS: [usize; 5] = [WRIST, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

pub const POSE_LEFT_SHOULDER: usize = 11;
pub const POSE_RIGHT_SHOULDER: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar (x, y) distance; depth is too noisy to be useful here.
    pub fn distance(&self, other: &Keypoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand: 21 ordered keypoints plus an optional handedness label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub keypoints: [Option<Keypoint>; HAND_KEYPOINTS],
    #[serde(default)]
    pub handedness: Option<Handedness>,
}

impl HandLandmarks {
    pub fn new(keypoints: [Option<Keypoint>; HAND_KEYPOINTS], handedness: Option<Handedness>) -> Self {
        Self {
            keypoints,
            handedness,
        }
    }

    /// A hand with every keypoint resolved.
    pub fn complete(points: [Keypoint; HAND_KEYPOINTS], handedness: Option<Handedness>) -> Self {
        Self::new(points.map(Some), handedness)
    }

    pub fn point(&self, index: usize) -> Option<Keypoint> {
        self.keypoints.get(index).copied().flatten()
    }

    pub fn wrist(&self) -> Option<Keypoint> {
        self.point(WRIST)
    }

    /// Mean of the visible palm points (wrist + MCP knuckles).
    ///
    /// More stable under tracking jitter than the wrist alone.
    pub fn palm_centroid(&self) -> Option<Keypoint> {
        let visible: Vec<Keypoint> = PALM_POINTS.iter().filter_map(|&i| self.point(i)).collect();
        if visible.is_empty() {
            return None;
        }
        let n = visible.len() as f64;
        Some(Keypoint::new(
            visible.iter().map(|p| p.x).sum::<f64>() / n,
            visible.iter().map(|p| p.y).sum::<f64>() / n,
            visible.iter().map(|p| p.z).sum::<f64>() / n,
        ))
    }
}

/// One sampled instant from the landmark front-end.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
    #[serde(default)]
    pub pose: Option<Vec<Option<Keypoint>>>,
    /// Part of the data contract; not consumed by recognition.
    #[serde(default)]
    pub face: Option<Vec<Keypoint>>,
}

impl LandmarkFrame {
    /// A frame with nothing detected, as the extractor reports for bad input.
    pub fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    pub fn with_hands(timestamp: i64, hands: Vec<HandLandmarks>) -> Self {
        Self {
            timestamp,
            hands,
            ..Self::default()
        }
    }

    pub fn has_hands(&self) -> bool {
        !self.hands.is_empty()
    }

    pub fn pose_point(&self, index: usize) -> Option<Keypoint> {
        self.pose.as_ref()?.get(index).copied().flatten()
    }

    /// Midpoint of the two shoulders when both are visible.
    pub fn shoulder_midpoint(&self) -> Option<Keypoint> {
        let l = self.pose_point(POSE_LEFT_SHOULDER)?;
        let r = self.pose_point(POSE_RIGHT_SHOULDER)?;
        Some(Keypoint::new((l.x + r.x) / 2.0, (l.y + r.y) / 2.0, (l.z + r.z) / 2.0))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("a window needs at least one frame")]
    Empty,
    #[error("window holds {len} frames, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("frame {index} goes back in time")]
    OutOfOrder { index: usize },
}

/// Fixed-length run of consecutive frames used as one recognition input.
///
/// Never mutated after construction; frames are shared with the session
/// buffer they were sliced from.
#[derive(Clone, Debug)]
pub struct LandmarkWindow {
    frames: Vec<Arc<LandmarkFrame>>,
    ts_start: i64,
    ts_end: i64,
}

impl LandmarkWindow {
    pub fn new(frames: Vec<Arc<LandmarkFrame>>, max_len: usize) -> Result<Self, WindowError> {
        let (first, last) = match (frames.first(), frames.last()) {
            (Some(f), Some(l)) => (f.timestamp, l.timestamp),
            _ => return Err(WindowError::Empty),
        };
        if frames.len() > max_len {
            return Err(WindowError::TooLong {
                len: frames.len(),
                max: max_len,
            });
        }
        if let Some(pos) = frames
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(WindowError::OutOfOrder { index: pos + 1 });
        }
        Ok(Self {
            frames,
            ts_start: first,
            ts_end: last,
        })
    }

    pub fn frames(&self) -> &[Arc<LandmarkFrame>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn ts_start(&self) -> i64 {
        self.ts_start
    }

    pub fn ts_end(&self) -> i64 {
        self.ts_end
    }

    /// Frames carrying at least one detected hand, in order.
    pub fn hand_frames(&self) -> impl Iterator<Item = &LandmarkFrame> {
        self.frames.iter().map(|f| f.as_ref()).filter(|f| f.has_hands())
    }

    pub fn frames_with_hands(&self) -> usize {
        self.hand_frames().count()
    }
}
