use crate::shared::landmarks::{LandmarkFrame, LandmarkWindow};

use super::feature_extractor::pair_hands;

/// Skips classification for windows with too little hand data or motion.
#[derive(Clone, Copy, Debug)]
pub struct ActivityGate {
    min_hand_fraction: f64,
    motion_threshold: f64,
}

impl ActivityGate {
    pub fn new(min_hand_fraction: f64, motion_threshold: f64) -> Self {
        Self {
            min_hand_fraction,
            motion_threshold,
        }
    }

    pub fn is_active(&self, window: &LandmarkWindow) -> bool {
        if window.is_empty() {
            return false;
        }
        let hand_frames: Vec<&LandmarkFrame> = window.hand_frames().collect();
        let fraction = hand_frames.len() as f64 / window.len() as f64;
        if fraction < self.min_hand_fraction {
            return false;
        }
        match mean_wrist_displacement(&hand_frames) {
            Some(motion) => motion > self.motion_threshold,
            None => false,
        }
    }
}

impl Default for ActivityGate {
    fn default() -> Self {
        Self::new(0.3, 0.003)
    }
}

/// Average wrist travel per step between consecutive hand-bearing frames.
fn mean_wrist_displacement(hand_frames: &[&LandmarkFrame]) -> Option<f64> {
    let steps: Vec<f64> = hand_frames
        .windows(2)
        .flat_map(|pair| pair_hands(pair[0], pair[1]))
        .filter_map(|(a, b)| Some(a.wrist()?.distance(&b.wrist()?)))
        .collect();
    if steps.is_empty() {
        return None;
    }
    Some(steps.iter().sum::<f64>() / steps.len() as f64)
}
