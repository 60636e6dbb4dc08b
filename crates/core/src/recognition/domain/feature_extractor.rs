//! Window → fixed 7-dimension feature vector.
//!
//! Every dimension is normalized against its scale constant and clamped to
//! [0, 1]. Keypoints missing from a frame are skipped rather than treated as
//! zero, so partial tracking degrades the estimate instead of biasing it.

use crate::shared::landmarks::{
    HandLandmarks, Keypoint, LandmarkFrame, LandmarkWindow, FINGERTIPS, INDEX_MCP, MIDDLE_MCP,
    PINKY_MCP, RING_MCP,
};

pub const FEATURE_DIM: usize = 7;

pub const HAND_DISTANCE: usize = 0;
pub const HAND_HEIGHT: usize = 1;
pub const FINGER_SPREAD: usize = 2;
pub const MOTION: usize = 3;
pub const SPEED: usize = 4;
pub const VERTICAL_SHARE: usize = 5;
pub const FINGER_CURL: usize = 6;

/// Wrist-to-wrist distance (frame widths) that maps to 1.0.
pub const HAND_DISTANCE_SCALE: f64 = 0.5;
/// Height above the shoulder line that maps to 1.0 (shoulder level is 0.5).
pub const SHOULDER_HEIGHT_SCALE: f64 = 0.6;
/// Fingertip-to-wrist distance, in palm lengths, that maps to 1.0.
pub const SPREAD_SCALE: f64 = 2.5;
/// Total palm travel across a window (frame widths) that maps to 1.0.
pub const MOTION_SCALE: f64 = 1.0;
/// Palm travel per frame that maps to 1.0.
pub const SPEED_SCALE: f64 = 0.1;
/// Curl ratio is already in [0, 1].
pub const CURL_SCALE: f64 = 1.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    /// Clamps every component to [0, 1]; NaN becomes 0.
    pub fn new(values: [f64; FEATURE_DIM]) -> Self {
        Self(values.map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }))
    }

    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[f64; FEATURE_DIM] {
        &self.0
    }

    pub fn get(&self, dim: usize) -> f64 {
        self.0[dim]
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

/// Extract the feature vector for a window. Windows without any hand
/// yield the zero vector.
pub fn extract_features(window: &LandmarkWindow) -> FeatureVector {
    let hand_frames: Vec<&LandmarkFrame> = window.hand_frames().collect();
    if hand_frames.is_empty() {
        return FeatureVector::zeros();
    }

    let motion = palm_motion(&hand_frames);
    FeatureVector::new([
        mean(hand_frames.iter().filter_map(|f| hand_distance(f))) / HAND_DISTANCE_SCALE,
        mean(hand_frames.iter().flat_map(|f| hand_heights(f))),
        mean(hand_frames.iter().flat_map(|f| f.hands.iter()).filter_map(finger_spread))
            / SPREAD_SCALE,
        motion.total / MOTION_SCALE,
        motion.per_step() / SPEED_SCALE,
        motion.vertical_share(),
        mean(hand_frames.iter().flat_map(|f| f.hands.iter()).filter_map(finger_curl))
            / CURL_SCALE,
    ])
}

/// Pairs each hand in `a` with its counterpart in `b`.
///
/// Hands are matched by handedness when every hand in both frames is
/// labelled, otherwise by position in the list.
pub fn pair_hands<'a>(
    a: &'a LandmarkFrame,
    b: &'a LandmarkFrame,
) -> Vec<(&'a HandLandmarks, &'a HandLandmarks)> {
    let labelled = a.hands.iter().chain(b.hands.iter()).all(|h| h.handedness.is_some());
    if labelled {
        a.hands
            .iter()
            .filter_map(|ha| {
                b.hands
                    .iter()
                    .find(|hb| hb.handedness == ha.handedness)
                    .map(|hb| (ha, hb))
            })
            .collect()
    } else {
        a.hands.iter().zip(b.hands.iter()).collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn hand_distance(frame: &LandmarkFrame) -> Option<f64> {
    if frame.hands.len() < 2 {
        return None;
    }
    let a = frame.hands[0].wrist()?;
    let b = frame.hands[1].wrist()?;
    Some(a.distance(&b))
}

/// Per-hand height: relative to the shoulder line when pose is available,
/// otherwise raw height in the frame (1.0 = top edge).
fn hand_heights(frame: &LandmarkFrame) -> Vec<f64> {
    let shoulders = frame.shoulder_midpoint();
    frame
        .hands
        .iter()
        .filter_map(|h| h.palm_centroid())
        .map(|c| match shoulders {
            Some(s) => 0.5 + (s.y - c.y) / SHOULDER_HEIGHT_SCALE,
            None => 1.0 - c.y,
        })
        .collect()
}

/// Mean fingertip-to-wrist distance in units of palm length.
fn finger_spread(hand: &HandLandmarks) -> Option<f64> {
    let wrist = hand.wrist()?;
    let palm_len = wrist.distance(&hand.point(MIDDLE_MCP)?);
    if palm_len < 1e-6 {
        return None;
    }
    let tips: Vec<f64> = FINGERTIPS
        .iter()
        .filter_map(|&i| hand.point(i))
        .map(|tip| tip.distance(&wrist))
        .collect();
    if tips.is_empty() {
        return None;
    }
    Some(mean(tips.into_iter()) / palm_len)
}

/// Average over the four fingers of `1 - straight / path`, where `straight`
/// is knuckle-to-tip distance and `path` the summed bone lengths.
fn finger_curl(hand: &HandLandmarks) -> Option<f64> {
    let curls: Vec<f64> = [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP]
        .iter()
        .filter_map(|&mcp| {
            let joints: Vec<Keypoint> = (mcp..mcp + 4).map(|i| hand.point(i)).collect::<Option<_>>()?;
            let path: f64 = joints.windows(2).map(|w| w[0].distance(&w[1])).sum();
            if path < 1e-9 {
                return None;
            }
            let straight = joints[0].distance(&joints[3]);
            Some(1.0 - (straight / path).min(1.0))
        })
        .collect();
    if curls.is_empty() {
        None
    } else {
        Some(mean(curls.into_iter()))
    }
}

struct PalmMotion {
    total: f64,
    vertical: f64,
    steps: usize,
}

impl PalmMotion {
    fn per_step(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.total / self.steps as f64
        }
    }

    fn vertical_share(&self) -> f64 {
        if self.total <= 0.0 {
            0.0
        } else {
            self.vertical / self.total
        }
    }
}

/// Palm-centroid travel between consecutive hand-bearing frames, averaged
/// over the hands that appear in both frames.
fn palm_motion(hand_frames: &[&LandmarkFrame]) -> PalmMotion {
    let mut motion = PalmMotion {
        total: 0.0,
        vertical: 0.0,
        steps: 0,
    };
    for pair in hand_frames.windows(2) {
        let moves: Vec<(f64, f64)> = pair_hands(pair[0], pair[1])
            .into_iter()
            .filter_map(|(a, b)| {
                let (ca, cb) = (a.palm_centroid()?, b.palm_centroid()?);
                Some((ca.distance(&cb), (cb.y - ca.y).abs()))
            })
            .collect();
        if moves.is_empty() {
            continue;
        }
        let n = moves.len() as f64;
        motion.total += moves.iter().map(|m| m.0).sum::<f64>() / n;
        motion.vertical += moves.iter().map(|m| m.1).sum::<f64>() / n;
        motion.steps += 1;
    }
    motion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::landmarks::test_support::*;
    use crate::shared::landmarks::{Handedness, POSE_LEFT_SHOULDER, POSE_RIGHT_SHOULDER};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn still(hand: HandLandmarks, n: usize) -> LandmarkWindow {
        window_of((0..n).map(|i| frame_at(i as i64, vec![hand.clone()])).collect())
    }

    #[test]
    fn test_no_hands_yields_zero_vector() {
        let frames = (0..10).map(|i| frame_at(i, vec![])).collect();
        assert!(extract_features(&window_of(frames)).is_zero());
    }

    #[test]
    fn test_deterministic() {
        let w = window_of(wave_frames(10));
        assert_eq!(extract_features(&w), extract_features(&w));
    }

    #[test]
    fn test_all_dimensions_within_unit_range() {
        let frames = (0..10)
            .map(|i| {
                let x = if i % 2 == 0 { 0.0 } else { 1.0 };
                frame_at(i, vec![open_hand(x, 0.1), fist(1.0 - x, 0.9)])
            })
            .collect();
        let f = extract_features(&window_of(frames));
        for v in f.values() {
            assert!((0.0..=1.0).contains(v), "{v} out of range");
        }
    }

    #[test]
    fn test_open_hand_spread_exceeds_fist() {
        let open = extract_features(&still(open_hand(0.5, 0.5), 5));
        let closed = extract_features(&still(fist(0.5, 0.5), 5));
        assert!(open.get(FINGER_SPREAD) > closed.get(FINGER_SPREAD));
    }

    #[test]
    fn test_curl_straight_fingers_zero_fist_one() {
        let open = extract_features(&still(open_hand(0.5, 0.5), 5));
        let closed = extract_features(&still(fist(0.5, 0.5), 5));
        assert_relative_eq!(open.get(FINGER_CURL), 0.0, epsilon = 1e-9);
        assert_relative_eq!(closed.get(FINGER_CURL), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_still_hand_has_no_motion() {
        let f = extract_features(&still(open_hand(0.5, 0.5), 10));
        assert_relative_eq!(f.get(MOTION), 0.0);
        assert_relative_eq!(f.get(SPEED), 0.0);
        assert_relative_eq!(f.get(VERTICAL_SHARE), 0.0);
    }

    #[test]
    fn test_horizontal_motion_measured() {
        let frames = (0..5)
            .map(|i| frame_at(i, vec![open_hand(0.1 + 0.02 * i as f64, 0.5)]))
            .collect();
        let f = extract_features(&window_of(frames));
        // 4 steps of 0.02
        assert_relative_eq!(f.get(MOTION), 0.08, epsilon = 1e-9);
        assert_relative_eq!(f.get(SPEED), 0.02 / SPEED_SCALE, epsilon = 1e-9);
        assert_relative_eq!(f.get(VERTICAL_SHARE), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_vertical_motion_share() {
        let frames = (0..5)
            .map(|i| frame_at(i, vec![open_hand(0.5, 0.8 - 0.03 * i as f64)]))
            .collect();
        let f = extract_features(&window_of(frames));
        assert_relative_eq!(f.get(VERTICAL_SHARE), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hand_distance_uses_two_hand_frames_only() {
        let mut left = open_hand(0.3, 0.5);
        left.handedness = Some(Handedness::Left);
        let right = open_hand(0.5, 0.5);
        let frames = vec![
            frame_at(0, vec![left.clone(), right.clone()]),
            frame_at(1, vec![right.clone()]),
        ];
        let f = extract_features(&window_of(frames));
        assert_relative_eq!(f.get(HAND_DISTANCE), 0.2 / HAND_DISTANCE_SCALE, epsilon = 1e-9);
    }

    #[test]
    fn test_height_without_pose_is_frame_relative() {
        let f = extract_features(&still(open_hand(0.5, 0.35), 3));
        let centroid_y = (0.35 + 4.0 * 0.30) / 5.0;
        assert_relative_eq!(f.get(HAND_HEIGHT), 1.0 - centroid_y, epsilon = 1e-9);
    }

    #[test]
    fn test_height_with_pose_is_shoulder_relative() {
        let hand = open_hand(0.5, 0.5);
        let centroid_y = hand.palm_centroid().unwrap().y;
        let mut pose = vec![None; 33];
        pose[POSE_LEFT_SHOULDER] = Some(Keypoint::new(0.4, centroid_y, 0.0));
        pose[POSE_RIGHT_SHOULDER] = Some(Keypoint::new(0.6, centroid_y, 0.0));
        let mut frame = LandmarkFrame::with_hands(0, vec![hand]);
        frame.pose = Some(pose);

        let f = extract_features(&window_of(vec![Arc::new(frame)]));
        assert_relative_eq!(f.get(HAND_HEIGHT), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_keypoints_are_skipped_not_zeroed() {
        let full = still(open_hand(0.5, 0.5), 3);
        let mut partial_hand = open_hand(0.5, 0.5);
        partial_hand.keypoints[INDEX_MCP + 3] = None; // index fingertip
        let partial = still(partial_hand, 3);

        let a = extract_features(&full);
        let b = extract_features(&partial);
        // Remaining fingers are straight, so curl stays at zero.
        assert_relative_eq!(b.get(FINGER_CURL), a.get(FINGER_CURL), epsilon = 1e-9);
        assert!(b.get(FINGER_SPREAD) > 0.0);
    }

    #[test]
    fn test_pair_hands_by_label_ignores_order() {
        let mut left = open_hand(0.2, 0.5);
        left.handedness = Some(Handedness::Left);
        let right = open_hand(0.8, 0.5);
        let a = LandmarkFrame::with_hands(0, vec![left.clone(), right.clone()]);
        let b = LandmarkFrame::with_hands(1, vec![right.clone(), left.clone()]);

        let pairs = pair_hands(&a, &b);
        assert_eq!(pairs.len(), 2);
        for (x, y) in pairs {
            assert_eq!(x.handedness, y.handedness);
        }
    }

    #[test]
    fn test_pair_hands_by_index_when_unlabelled() {
        let mut h = open_hand(0.2, 0.5);
        h.handedness = None;
        let a = LandmarkFrame::with_hands(0, vec![h.clone(), h.clone()]);
        let b = LandmarkFrame::with_hands(1, vec![h.clone()]);
        assert_eq!(pair_hands(&a, &b).len(), 1);
    }

    #[test]
    fn test_feature_vector_clamps_and_clears_nan() {
        let f = FeatureVector::new([-1.0, 2.0, f64::NAN, 0.5, 0.0, 1.0, 0.25]);
        assert_eq!(f.values(), &[0.0, 1.0, 0.0, 0.5, 0.0, 1.0, 0.25]);
    }
}
