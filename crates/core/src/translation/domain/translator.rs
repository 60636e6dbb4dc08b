//! Confidence-gated caption selection.
//!
//! Below `low` the user is asked to disambiguate; between `low` and `high`
//! a canned template is used; at or above `high` the generation service is
//! tried and the template path covers any failure. Correction bias is
//! applied before any of this and style never changes the tier.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::recognition::domain::phrase_set::gloss_for;
use crate::recognition::domain::sign_classifier::Prediction;

use super::caption_generator::CaptionGenerator;
use super::caption_style::CaptionStyle;
use super::correction_profile::CorrectionProfile;
use super::templates::template_caption;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionMode {
    Template,
    Llm,
    Uncertain,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Translation {
    pub caption: String,
    pub mode: CaptionMode,
    pub confidence: f64,
    /// Token the caption was built from, after bias correction.
    pub token: String,
}

#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
    /// Corrections needed before a bias override applies.
    pub min_bias_count: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 0.55,
            high: 0.80,
            min_bias_count: 2,
        }
    }
}

pub struct Translator {
    generator: Arc<dyn CaptionGenerator>,
    thresholds: Thresholds,
}

impl Translator {
    pub fn new(generator: Arc<dyn CaptionGenerator>, thresholds: Thresholds) -> Self {
        Self {
            generator,
            thresholds,
        }
    }

    /// `style` falls back to the profile's stored preference.
    pub fn translate(
        &self,
        prediction: &Prediction,
        profile: &CorrectionProfile,
        style: Option<CaptionStyle>,
    ) -> Translation {
        let style = style.unwrap_or(profile.style);
        let token = profile
            .corrected_token(&prediction.token, self.thresholds.min_bias_count)
            .unwrap_or(&prediction.token)
            .to_string();
        if token != prediction.token {
            log::debug!("Bias override {} -> {token}", prediction.token);
        }
        let confidence = prediction.confidence;

        if confidence < self.thresholds.low {
            let alternative = if prediction.top2[1] == token {
                &prediction.top2[0]
            } else {
                &prediction.top2[1]
            };
            return Translation {
                caption: clarification(&token, alternative),
                mode: CaptionMode::Uncertain,
                confidence,
                token,
            };
        }

        if confidence >= self.thresholds.high {
            match self.generator.generate(gloss_for(&token), style) {
                Ok(caption) if !caption.trim().is_empty() => {
                    return Translation {
                        caption,
                        mode: CaptionMode::Llm,
                        confidence,
                        token,
                    };
                }
                Ok(_) => log::warn!("Empty generated caption for {token}, using template"),
                Err(e) => log::debug!("Caption generation unavailable for {token}: {e}"),
            }
        }

        Translation {
            caption: template_caption(&token, style),
            mode: CaptionMode::Template,
            confidence,
            token,
        }
    }

    /// Caption confirming that a correction was recorded.
    pub fn acknowledge_correction(&self, correct_token: &str) -> Translation {
        Translation {
            caption: format!("Noted correction: {correct_token}"),
            mode: CaptionMode::Template,
            confidence: 1.0,
            token: correct_token.to_string(),
        }
    }
}

fn clarification(token: &str, alternative: &str) -> String {
    if alternative == token || alternative.is_empty() {
        format!("Unclear: did you mean {token}?")
    } else {
        format!("Unclear: did you mean {token} or {alternative}?")
    }
}
