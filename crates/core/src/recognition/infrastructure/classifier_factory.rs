use std::sync::Arc;

use crate::recognition::domain::prototype_classifier::{PrototypeClassifier, PrototypeConfig};
use crate::recognition::domain::sign_classifier::SignClassifier;
use crate::shared::model_resolver::{resolve_pose_artifacts, PoseModelArtifacts};
use crate::shared::session_store::EvictionPolicy;
use crate::shared::settings::Settings;

use super::learned_model_classifier::LearnedModelClassifier;
use super::onnx_pose_model::OnnxPoseModel;

pub fn prototype_config(settings: &Settings) -> PrototypeConfig {
    PrototypeConfig {
        alpha: settings.ema_alpha,
        max_distance: settings.prototype_max_distance,
        ambiguity_gap: settings.ambiguity_gap,
        ambiguity_penalty: settings.ambiguity_penalty,
    }
}

/// Creates the best available classifier, preferring the learned model.
///
/// Looks for pose model artifacts once at startup. If a complete set loads,
/// returns the learned classifier (with prototype fallback); otherwise the
/// prototype classifier alone. Logs which strategy is selected.
pub fn create_classifier(
    settings: &Settings,
    policy: Arc<dyn EvictionPolicy>,
) -> Box<dyn SignClassifier> {
    let artifacts = resolve_pose_artifacts(settings.model_dir.as_deref());
    create_classifier_from(artifacts.as_ref(), settings, policy)
}

pub fn create_classifier_from(
    artifacts: Option<&PoseModelArtifacts>,
    settings: &Settings,
    policy: Arc<dyn EvictionPolicy>,
) -> Box<dyn SignClassifier> {
    let prototypes = PrototypeClassifier::new(prototype_config(settings), policy);
    let Some(artifacts) = artifacts else {
        log::info!("No pose model found, using prototype classifier");
        return Box::new(prototypes);
    };
    match OnnxPoseModel::load(artifacts) {
        Ok(model) => {
            log::info!("Using learned pose classifier ({} tokens)", model.tokens().len());
            Box::new(LearnedModelClassifier::new(Box::new(model), prototypes))
        }
        Err(e) => {
            log::warn!("Pose model unavailable ({e}), using prototype classifier");
            Box::new(prototypes)
        }
    }
}
