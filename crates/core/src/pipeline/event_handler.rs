use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::shared::frame::Frame;
use crate::shared::landmarks::LandmarkFrame;
use crate::shared::session_store::SessionKey;

use super::caption_pipeline::{CaptionPipeline, FrameOutcome};
use super::messages::{CaptionEvent, CorrectionEvent, EventError, FrameEvent, InboundEvent};

/// Turns a raw frame into landmarks when the producer sent pixels only.
pub trait LandmarkExtractor: Send + Sync {
    fn extract(&self, frame: &Frame, timestamp: i64) -> LandmarkFrame;
}

/// Reports nothing detected for every frame.
///
/// Used when no landmark front-end is wired in; such frames still reach the
/// buffer so the window keeps advancing and the gate sees the missing hands.
pub struct NoHandsExtractor;

impl LandmarkExtractor for NoHandsExtractor {
    fn extract(&self, _frame: &Frame, timestamp: i64) -> LandmarkFrame {
        LandmarkFrame::empty(timestamp)
    }
}

/// Maps inbound transport events onto pipeline calls.
pub struct EventHandler {
    pipeline: Arc<CaptionPipeline>,
    extractor: Box<dyn LandmarkExtractor>,
}

impl EventHandler {
    pub fn new(pipeline: Arc<CaptionPipeline>, extractor: Box<dyn LandmarkExtractor>) -> Self {
        Self {
            pipeline,
            extractor,
        }
    }

    pub fn pipeline(&self) -> &Arc<CaptionPipeline> {
        &self.pipeline
    }

    pub fn parse(line: &str) -> Result<InboundEvent, EventError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn handle(&self, event: InboundEvent) -> Result<Option<CaptionEvent>, EventError> {
        match event {
            InboundEvent::Frame(frame) => self.handle_frame(frame),
            InboundEvent::Correction(correction) => Ok(self.handle_correction(correction)),
        }
    }

    /// Parses and handles one line; malformed input is logged and dropped.
    pub fn handle_line(&self, line: &str) -> Option<CaptionEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match Self::parse(line).and_then(|event| self.handle(event)) {
            Ok(caption) => caption,
            Err(e) => {
                log::warn!("Dropping event: {e}");
                None
            }
        }
    }

    fn handle_frame(&self, event: FrameEvent) -> Result<Option<CaptionEvent>, EventError> {
        let key = SessionKey::new(event.session, event.user);
        let raw_frame = match &event.image_jpeg_b64 {
            Some(encoded) => Some(decode_image(encoded, event.ts)?),
            None => None,
        };

        let landmarks = match (event.landmarks, &raw_frame) {
            (Some(mut landmarks), _) => {
                landmarks.timestamp = event.ts;
                landmarks
            }
            (None, Some(frame)) => self.extractor.extract(frame, event.ts),
            (None, None) => LandmarkFrame::empty(event.ts),
        };

        let outcome =
            self.pipeline
                .process_frame(&key, event.ts, landmarks, raw_frame.as_ref(), event.style);
        if !matches!(outcome, FrameOutcome::Captioned(_)) {
            log::trace!("Frame {} for {key}: {}", event.ts, outcome.label());
        }
        Ok(outcome.into_caption())
    }

    fn handle_correction(&self, event: CorrectionEvent) -> Option<CaptionEvent> {
        let key = SessionKey::new(event.session, event.user);
        self.pipeline
            .apply_correction(&key, event.ts, &event.incorrect_token, &event.correct_token)
    }
}

fn decode_image(encoded: &str, timestamp: i64) -> Result<Frame, EventError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(Frame::from_image(image, timestamp))
}
