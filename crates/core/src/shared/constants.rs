pub const APP_DIR_NAME: &str = "SignCall";

pub const POSE_BACKBONE_MODEL_NAME: &str = "posenet_mobilenet_v1.onnx";
pub const POSE_HEAD_MODEL_NAME: &str = "pose_classifier_head.onnx";
pub const POSE_LABELS_NAME: &str = "metadata.json";

/// Frames per recognition window (~1.2 s at 8 fps capture).
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Per-key buffer cap; older frames are evicted FIFO beyond this.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 30;

/// Keypoints per detected hand (MediaPipe hand topology).
pub const HAND_KEYPOINTS: usize = 21;

/// Keypoints in a body-pose observation (MediaPipe pose topology).
pub const POSE_KEYPOINTS: usize = 33;
