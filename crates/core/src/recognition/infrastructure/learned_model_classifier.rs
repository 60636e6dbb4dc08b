use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::recognition::domain::frame_model::{ClassifierError, FrameModel};
use crate::recognition::domain::prototype_classifier::PrototypeClassifier;
use crate::recognition::domain::sign_classifier::{Prediction, SignClassifier};
use crate::shared::frame::Frame;
use crate::shared::landmarks::LandmarkWindow;
use crate::shared::session_store::SessionKey;

/// Single-frame model classifier with an explicit prototype fallback.
///
/// Only the newest raw frame is classified, not the window. When no frame
/// was supplied or inference fails, the prototype strategy answers instead
/// and the fallback counter is bumped.
pub struct LearnedModelClassifier {
    model: Box<dyn FrameModel>,
    fallback: PrototypeClassifier,
    fallbacks: AtomicU64,
}

impl LearnedModelClassifier {
    pub fn new(model: Box<dyn FrameModel>, fallback: PrototypeClassifier) -> Self {
        Self {
            model,
            fallback,
            fallbacks: AtomicU64::new(0),
        }
    }

    fn predict_frame(&self, frame: &Frame, timestamp: i64) -> Result<Prediction, ClassifierError> {
        let ranked = self.model.predict(frame)?;
        match ranked.as_slice() {
            [best, second, ..] => Ok(Prediction::new(
                &best.token,
                best.probability,
                &second.token,
                timestamp,
            )),
            _ => Err(ClassifierError::ShapeMismatch {
                expected: 2,
                got: ranked.len(),
            }),
        }
    }
}

impl SignClassifier for LearnedModelClassifier {
    fn classify(
        &self,
        window: &LandmarkWindow,
        raw_frame: Option<&Frame>,
        key: &SessionKey,
    ) -> Prediction {
        let Some(frame) = raw_frame else {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            log::debug!("No raw frame for {key}; using prototype classifier");
            return self.fallback.classify(window, None, key);
        };
        match self.predict_frame(frame, window.ts_end()) {
            Ok(prediction) => prediction,
            Err(e) => {
                let n = self.fallbacks.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("Pose model failed for {key} ({e}); prototype fallback #{n}");
                self.fallback.classify(window, Some(frame), key)
            }
        }
    }

    fn reset(&self, key: &SessionKey) {
        self.fallback.reset(key);
    }

    fn evict_idle(&self, now: Instant) -> usize {
        self.fallback.evict_idle(now)
    }

    fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}
