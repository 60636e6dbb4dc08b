use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::shared::session_store::{EvictionPolicy, SessionKey, SessionStore};

use super::sign_classifier::Prediction;

/// Vote weights, oldest → newest, for a five-slot history.
pub const DEFAULT_RECENCY_WEIGHTS: [f64; 5] = [0.5, 0.6, 0.75, 0.9, 1.0];
/// Largest confidence boost for agreeing with the majority.
pub const MAX_AGREEMENT_BOOST: f64 = 0.15;
/// Confidence multiplier when the raw token is overruled.
pub const DISAGREEMENT_PENALTY: f64 = 0.5;
pub const CONFIDENCE_CAP: f64 = 0.99;

/// Per-key majority vote over recent predictions (debounce).
///
/// Each history entry votes `confidence × recency weight`. A prediction
/// that agrees with the majority gets a boost proportional to the
/// majority's vote share; one that disagrees is replaced by the majority
/// token at reduced confidence. Fewer than two entries pass through.
pub struct PredictionSmoother {
    history: SessionStore<VecDeque<(String, f64)>>,
    weights: Vec<f64>,
}

impl PredictionSmoother {
    pub fn new(history_len: usize, policy: Arc<dyn EvictionPolicy>) -> Self {
        Self::with_weights(recency_weights(history_len.max(1)), policy)
    }

    /// `weights` must be non-decreasing, oldest first; its length is the
    /// history length.
    pub fn with_weights(weights: Vec<f64>, policy: Arc<dyn EvictionPolicy>) -> Self {
        Self {
            history: SessionStore::new(policy),
            weights,
        }
    }

    pub fn history_len(&self) -> usize {
        self.weights.len()
    }

    pub fn smooth(&self, prediction: Prediction, key: &SessionKey) -> Prediction {
        let cap = self.weights.len();
        let history: Vec<(String, f64)> = self.history.with_entry(key, |h| {
            h.push_back((prediction.token.clone(), prediction.confidence));
            while h.len() > cap {
                h.pop_front();
            }
            h.iter().cloned().collect()
        });
        if history.len() < 2 {
            return prediction;
        }

        let weights = &self.weights[cap - history.len()..];
        let Some((majority, score)) = majority_vote(&history, weights) else {
            return prediction;
        };
        let total: f64 = weights.iter().sum();
        let vote_share = if total > 0.0 { score / total } else { 0.0 };

        if majority == prediction.token {
            let confidence =
                (prediction.confidence + vote_share * MAX_AGREEMENT_BOOST).min(CONFIDENCE_CAP);
            Prediction {
                confidence,
                ..prediction
            }
        } else {
            log::debug!(
                "Smoother overruled {} with {majority} for {key}",
                prediction.token
            );
            Prediction {
                token: majority,
                confidence: prediction.confidence * DISAGREEMENT_PENALTY,
                ..prediction
            }
        }
    }

    pub fn reset(&self, key: &SessionKey) {
        self.history.remove(key);
    }

    pub fn evict_idle(&self, now: Instant) -> usize {
        self.history.evict_idle(now)
    }
}

/// Recency weights for a history of `len` slots: the newest suffix of the
/// default table, or an even ramp from 0.5 to 1.0 for longer histories.
fn recency_weights(len: usize) -> Vec<f64> {
    let table = DEFAULT_RECENCY_WEIGHTS.len();
    if len <= table {
        return DEFAULT_RECENCY_WEIGHTS[table - len..].to_vec();
    }
    (0..len)
        .map(|i| 0.5 + 0.5 * i as f64 / (len - 1) as f64)
        .collect()
}

/// Highest-scoring token; ties go to the token that entered history first.
fn majority_vote(history: &[(String, f64)], weights: &[f64]) -> Option<(String, f64)> {
    let mut scores: Vec<(&str, f64)> = Vec::new();
    for ((token, confidence), w) in history.iter().zip(weights) {
        match scores.iter_mut().find(|(t, _)| *t == token.as_str()) {
            Some(entry) => entry.1 += confidence * w,
            None => scores.push((token.as_str(), confidence * w)),
        }
    }
    scores
        .into_iter()
        .fold(None, |best: Option<(&str, f64)>, (t, s)| match best {
            Some((_, bs)) if bs >= s => best,
            _ => Some((t, s)),
        })
        .map(|(t, s)| (t.to_string(), s))
}
