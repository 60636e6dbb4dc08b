use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::shared::session_store::{EvictionPolicy, SessionKey, SessionStore};

use super::caption_style::CaptionStyle;

/// Per-(session, user) caption preference and learned correction bias.
///
/// `bias[wrong][right]` counts how often the user corrected `wrong` to
/// `right`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrectionProfile {
    pub style: CaptionStyle,
    bias: HashMap<String, HashMap<String, u32>>,
}

impl CorrectionProfile {
    pub fn with_style(style: CaptionStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn apply_correction(&mut self, wrong: &str, right: &str) {
        *self
            .bias
            .entry(wrong.to_string())
            .or_default()
            .entry(right.to_string())
            .or_insert(0) += 1;
    }

    pub fn count(&self, wrong: &str, right: &str) -> u32 {
        self.bias
            .get(wrong)
            .and_then(|m| m.get(right))
            .copied()
            .unwrap_or(0)
    }

    /// The token `token` should be replaced with, if any.
    ///
    /// The most frequent correction wins (ties go to the alphabetically
    /// first token). It applies once its count reaches `min_count` and
    /// exceeds the count of `token` confirmed as itself.
    pub fn corrected_token(&self, token: &str, min_count: u32) -> Option<&str> {
        let corrections = self.bias.get(token)?;
        let (best, count) = corrections
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))?;
        if best == token || *count < min_count || *count <= self.count(token, token) {
            return None;
        }
        Some(best.as_str())
    }
}

/// Lazily created correction profiles, one per key.
pub struct ProfileStore {
    profiles: SessionStore<CorrectionProfile>,
}

impl ProfileStore {
    pub fn new(policy: Arc<dyn EvictionPolicy>) -> Self {
        Self {
            profiles: SessionStore::new(policy),
        }
    }

    /// Snapshot of the key's profile, created with defaults on first use.
    pub fn get_profile(&self, key: &SessionKey) -> CorrectionProfile {
        self.profiles.with_entry(key, |p| p.clone())
    }

    pub fn apply_correction(&self, key: &SessionKey, wrong: &str, right: &str) {
        log::info!("Correction for {key}: {wrong} -> {right}");
        self.profiles
            .with_entry(key, |p| p.apply_correction(wrong, right));
    }

    pub fn set_style(&self, key: &SessionKey, style: CaptionStyle) {
        self.profiles.with_entry(key, |p| p.style = style);
    }

    pub fn evict_idle(&self, now: Instant) -> usize {
        self.profiles.evict_idle(now)
    }
}
