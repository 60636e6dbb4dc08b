//! Nearest-prototype classification over smoothed window features.

use std::sync::Arc;
use std::time::Instant;

use crate::shared::frame::Frame;
use crate::shared::landmarks::LandmarkWindow;
use crate::shared::session_store::{EvictionPolicy, SessionKey, SessionStore};

use super::feature_extractor::{extract_features, FeatureVector, FEATURE_DIM};
use super::sign_classifier::{Prediction, SignClassifier};

/// Reference feature vector for one token.
///
/// Dimensions: hand distance, height, spread, motion, speed, vertical
/// share, curl.
#[derive(Clone, Copy, Debug)]
pub struct Prototype {
    pub token: &'static str,
    pub features: [f64; FEATURE_DIM],
}

pub const PROTOTYPES: &[Prototype] = &[
    Prototype {
        token: "HELLO",
        features: [0.0, 0.70, 1.0, 0.40, 0.45, 0.10, 0.0],
    },
    Prototype {
        token: "THANKS",
        features: [0.0, 0.55, 0.95, 0.30, 0.35, 0.60, 0.05],
    },
    Prototype {
        token: "REPEAT",
        features: [0.25, 0.45, 0.60, 0.35, 0.40, 0.55, 0.50],
    },
    Prototype {
        token: "SLOW",
        features: [0.10, 0.40, 0.95, 0.15, 0.15, 0.20, 0.05],
    },
    Prototype {
        token: "HOW",
        features: [0.10, 0.45, 0.50, 0.25, 0.30, 0.40, 0.70],
    },
    Prototype {
        token: "YOU",
        features: [0.0, 0.50, 0.55, 0.10, 0.10, 0.20, 0.75],
    },
    Prototype {
        token: "CAN",
        features: [0.35, 0.45, 0.45, 0.35, 0.40, 0.90, 0.95],
    },
    Prototype {
        token: "SEE_YOU_LATER",
        features: [0.0, 0.65, 0.70, 0.50, 0.55, 0.30, 0.40],
    },
    Prototype {
        token: "FATHER",
        features: [0.0, 0.85, 1.0, 0.10, 0.10, 0.30, 0.0],
    },
    Prototype {
        token: "MOTHER",
        features: [0.0, 0.70, 1.0, 0.10, 0.10, 0.30, 0.0],
    },
];

/// Motion, speed and curl separate the phrase set best.
pub const FEATURE_WEIGHTS: [f64; FEATURE_DIM] = [1.0, 1.0, 1.0, 1.5, 1.5, 1.0, 1.5];

/// Lowest confidence the prototype strategy ever reports.
pub const CONFIDENCE_FLOOR: f64 = 0.10;

#[derive(Clone, Copy, Debug)]
pub struct PrototypeConfig {
    /// EMA factor: `new = alpha * raw + (1 - alpha) * previous`.
    pub alpha: f64,
    /// Distance at which confidence bottoms out.
    pub max_distance: f64,
    /// Top-two distance gap below which the match counts as ambiguous.
    pub ambiguity_gap: f64,
    pub ambiguity_penalty: f64,
}

impl Default for PrototypeConfig {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            max_distance: 1.2,
            ambiguity_gap: 0.05,
            ambiguity_penalty: 0.75,
        }
    }
}

pub struct PrototypeClassifier {
    config: PrototypeConfig,
    ema: SessionStore<Option<FeatureVector>>,
}

impl PrototypeClassifier {
    pub fn new(config: PrototypeConfig, policy: Arc<dyn EvictionPolicy>) -> Self {
        Self {
            config,
            ema: SessionStore::new(policy),
        }
    }

    /// Exponentially smooths `raw` against the key's previous vector.
    ///
    /// An all-zero vector (no hand data) clears the state and is returned
    /// as is.
    pub fn smooth_features(&self, raw: FeatureVector, key: &SessionKey) -> FeatureVector {
        if raw.is_zero() {
            self.ema.remove(key);
            return raw;
        }
        let alpha = self.config.alpha;
        self.ema.with_entry(key, |state| {
            let smoothed = match state {
                None => raw,
                Some(prev) => {
                    let mut values = [0.0; FEATURE_DIM];
                    for (i, v) in values.iter_mut().enumerate() {
                        *v = alpha * raw.get(i) + (1.0 - alpha) * prev.get(i);
                    }
                    FeatureVector::new(values)
                }
            };
            *state = Some(smoothed);
            smoothed
        })
    }

    /// Nearest prototype to `features`; stateless.
    pub fn match_features(&self, features: &FeatureVector, timestamp: i64) -> Prediction {
        let mut ranked: Vec<(&'static str, f64)> = PROTOTYPES
            .iter()
            .map(|p| (p.token, weighted_distance(features, &p.features)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let (best, best_d) = ranked[0];
        let (second, second_d) = ranked[1];

        let mut confidence = 1.0 - (best_d / self.config.max_distance).clamp(0.0, 1.0);
        if second_d - best_d < self.config.ambiguity_gap {
            confidence *= self.config.ambiguity_penalty;
        }
        confidence = confidence.max(CONFIDENCE_FLOOR);
        Prediction::new(best, confidence, second, timestamp)
    }
}

impl SignClassifier for PrototypeClassifier {
    fn classify(
        &self,
        window: &LandmarkWindow,
        _raw_frame: Option<&Frame>,
        key: &SessionKey,
    ) -> Prediction {
        let features = self.smooth_features(extract_features(window), key);
        self.match_features(&features, window.ts_end())
    }

    fn reset(&self, key: &SessionKey) {
        self.ema.remove(key);
    }

    fn evict_idle(&self, now: Instant) -> usize {
        self.ema.evict_idle(now)
    }
}

fn weighted_distance(features: &FeatureVector, prototype: &[f64; FEATURE_DIM]) -> f64 {
    features
        .values()
        .iter()
        .zip(prototype)
        .zip(FEATURE_WEIGHTS)
        .map(|((f, p), w)| w * (f - p).powi(2))
        .sum::<f64>()
        .sqrt()
}
