use std::sync::Arc;

use crate::shared::settings::LlmSettings;
use crate::translation::domain::caption_generator::{CaptionGenerator, UnavailableCaptionGenerator};

use super::cached_caption_generator::CachedCaptionGenerator;
use super::openai_caption_generator::OpenAiCaptionGenerator;

/// Creates the caption generator for `settings`, cached per (gloss, style).
///
/// Without credentials or a local endpoint the generator is permanently
/// unavailable and every high-confidence caption uses its template.
pub fn create_generator(settings: &LlmSettings) -> Arc<dyn CaptionGenerator> {
    if !settings.is_configured() {
        log::info!("No caption service configured, using templates only");
        return Arc::new(UnavailableCaptionGenerator);
    }
    match OpenAiCaptionGenerator::new(settings.clone()) {
        Ok(gen) => {
            log::info!(
                "Using caption service {} (model {})",
                settings.endpoint,
                settings.model
            );
            Arc::new(CachedCaptionGenerator::new(Arc::new(gen), settings.cache_ttl()))
        }
        Err(e) => {
            log::warn!("Caption service unavailable ({e}), using templates only");
            Arc::new(UnavailableCaptionGenerator)
        }
    }
}
