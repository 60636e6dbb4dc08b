use crate::shared::frame::Frame;
use crate::shared::landmarks::LandmarkWindow;
use crate::shared::session_store::SessionKey;

/// Classifier output: best token, its confidence, and the two best tokens.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub token: String,
    /// Always within [0, 1].
    pub confidence: f64,
    /// `[best, runner_up]`.
    pub top2: [String; 2],
    pub timestamp: i64,
}

impl Prediction {
    /// Clamps `confidence` into [0, 1]; NaN becomes 0.
    pub fn new(token: &str, confidence: f64, runner_up: &str, timestamp: i64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            token: token.to_string(),
            confidence,
            top2: [token.to_string(), runner_up.to_string()],
            timestamp,
        }
    }

    pub fn runner_up(&self) -> &str {
        &self.top2[1]
    }
}

/// Domain interface for sign classification.
///
/// `raw_frame` is the newest video frame when the transport supplied one;
/// strategies that work on landmarks alone ignore it. Per-key state (such
/// as feature smoothing) is addressed by `key`, hence `&self` + `Sync`.
/// Failures are handled inside the strategy; callers always get a
/// prediction.
pub trait SignClassifier: Send + Sync {
    fn classify(
        &self,
        window: &LandmarkWindow,
        raw_frame: Option<&Frame>,
        key: &SessionKey,
    ) -> Prediction;

    /// Drops any per-key state the strategy keeps.
    fn reset(&self, _key: &SessionKey) {}

    fn evict_idle(&self, _now: std::time::Instant) -> usize {
        0
    }

    /// Number of times the strategy fell back to a weaker one.
    fn fallback_count(&self) -> u64 {
        0
    }
}
