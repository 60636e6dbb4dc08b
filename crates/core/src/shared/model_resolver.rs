use std::path::{Path, PathBuf};

use super::constants::{
    APP_DIR_NAME, POSE_BACKBONE_MODEL_NAME, POSE_HEAD_MODEL_NAME, POSE_LABELS_NAME,
};

/// File set required by the learned pose classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoseModelArtifacts {
    pub backbone: PathBuf,
    pub head: PathBuf,
    pub labels: PathBuf,
}

impl PoseModelArtifacts {
    /// Returns the artifact set in `dir` if every file is present.
    pub fn locate_in(dir: &Path) -> Option<Self> {
        let artifacts = Self {
            backbone: dir.join(POSE_BACKBONE_MODEL_NAME),
            head: dir.join(POSE_HEAD_MODEL_NAME),
            labels: dir.join(POSE_LABELS_NAME),
        };
        artifacts.is_complete().then_some(artifacts)
    }

    pub fn is_complete(&self) -> bool {
        self.backbone.exists() && self.head.exists() && self.labels.exists()
    }
}

/// Find pose model artifacts without loading them.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled/explicit model directory
///
/// Returns `None` when neither location holds a complete set; the caller
/// then runs the prototype classifier only.
pub fn resolve_pose_artifacts(model_dir: Option<&Path>) -> Option<PoseModelArtifacts> {
    if let Some(found) = model_cache_dir().and_then(|d| PoseModelArtifacts::locate_in(&d)) {
        return Some(found);
    }
    model_dir.and_then(PoseModelArtifacts::locate_in)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/SignCall/models/`
/// - Linux: `$XDG_CACHE_HOME/SignCall/models/` or `~/.cache/SignCall/models/`
/// - Windows: `%LOCALAPPDATA%/SignCall/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join(APP_DIR_NAME).join("models"))
    }
}
