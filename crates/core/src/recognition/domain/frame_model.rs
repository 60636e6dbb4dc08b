use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to load model {path}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("invalid label metadata {path}: {message}")]
    Labels { path: PathBuf, message: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced {got} scores for {expected} labels")]
    ShapeMismatch { expected: usize, got: usize },
}

/// A token score from a single-frame model.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenScore {
    pub token: String,
    pub probability: f64,
}

/// Domain interface for single-frame classification models.
///
/// Returns one score per known token, sorted by descending probability.
pub trait FrameModel: Send + Sync {
    fn predict(&self, frame: &Frame) -> Result<Vec<TokenScore>, ClassifierError>;
}

/// Pairs `labels` with `probabilities` and sorts best first.
pub fn rank_scores(
    labels: &[String],
    probabilities: &[f32],
) -> Result<Vec<TokenScore>, ClassifierError> {
    if labels.len() != probabilities.len() {
        return Err(ClassifierError::ShapeMismatch {
            expected: labels.len(),
            got: probabilities.len(),
        });
    }
    let mut scores: Vec<TokenScore> = labels
        .iter()
        .zip(probabilities)
        .map(|(token, p)| TokenScore {
            token: token.clone(),
            probability: f64::from(*p),
        })
        .collect();
    scores.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    Ok(scores)
}
