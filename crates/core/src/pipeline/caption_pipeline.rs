//! Per-frame orchestration:
//! buffer → gate → classify → floor → smooth → profile → translate.
//!
//! Purely reactive: every call handles one frame and returns at most one
//! caption. All per-key state lives in session stores, so one pipeline
//! serves any number of concurrent sessions.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::recognition::domain::activity_gate::ActivityGate;
use crate::recognition::domain::landmark_buffer::LandmarkBuffer;
use crate::recognition::domain::prediction_smoother::PredictionSmoother;
use crate::recognition::domain::sign_classifier::SignClassifier;
use crate::recognition::infrastructure::classifier_factory::create_classifier;
use crate::shared::frame::Frame;
use crate::shared::landmarks::LandmarkFrame;
use crate::shared::session_store::{EvictionPolicy, IdleTimeout, NeverEvict, SessionKey};
use crate::shared::settings::Settings;
use crate::translation::domain::caption_generator::CaptionGenerator;
use crate::translation::domain::caption_style::CaptionStyle;
use crate::translation::domain::correction_profile::ProfileStore;
use crate::translation::domain::translator::{Thresholds, Translator};
use crate::translation::infrastructure::generator_factory::create_generator;

use super::messages::CaptionEvent;
use super::pipeline_logger::PipelineLogger;

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Fewer frames than the window size are buffered for the key.
    Buffering,
    /// Too little hand data or motion in the window.
    Inactive,
    /// Classifier confidence under the configured floor.
    BelowFloor,
    Captioned(CaptionEvent),
}

impl FrameOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FrameOutcome::Buffering => "buffering",
            FrameOutcome::Inactive => "inactive",
            FrameOutcome::BelowFloor => "below_floor",
            FrameOutcome::Captioned(_) => "captioned",
        }
    }

    pub fn into_caption(self) -> Option<CaptionEvent> {
        match self {
            FrameOutcome::Captioned(event) => Some(event),
            _ => None,
        }
    }
}

pub struct CaptionPipeline {
    buffer: LandmarkBuffer,
    gate: ActivityGate,
    classifier: Box<dyn SignClassifier>,
    smoother: PredictionSmoother,
    profiles: ProfileStore,
    translator: Translator,
    confidence_floor: Option<f64>,
    ack_corrections: bool,
    logger: Mutex<Box<dyn PipelineLogger>>,
}

impl CaptionPipeline {
    /// Wires a pipeline from settings with the given strategies.
    pub fn new(
        settings: &Settings,
        classifier: Box<dyn SignClassifier>,
        generator: Arc<dyn CaptionGenerator>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        let policy = eviction_policy(settings);
        Self {
            buffer: LandmarkBuffer::new(
                settings.window_size,
                settings.max_buffer_len,
                policy.clone(),
            ),
            gate: ActivityGate::new(settings.min_hand_fraction, settings.motion_threshold),
            classifier,
            smoother: PredictionSmoother::new(settings.smoothing_history, policy.clone()),
            profiles: ProfileStore::new(policy),
            translator: Translator::new(
                generator,
                Thresholds {
                    low: settings.confidence_low,
                    high: settings.confidence_high,
                    min_bias_count: settings.min_bias_count,
                },
            ),
            confidence_floor: settings.confidence_floor,
            ack_corrections: settings.ack_corrections,
            logger: Mutex::new(logger),
        }
    }

    /// Selects classifier and caption generator from what is available.
    pub fn from_settings(settings: &Settings, logger: Box<dyn PipelineLogger>) -> Self {
        let classifier = create_classifier(settings, eviction_policy(settings));
        let generator = create_generator(&settings.llm);
        Self::new(settings, classifier, generator, logger)
    }

    /// Processes one frame for `key`, stamped with the request time `ts`.
    ///
    /// A supplied `style` becomes the key's stored preference.
    pub fn process_frame(
        &self,
        key: &SessionKey,
        ts: i64,
        landmarks: LandmarkFrame,
        raw_frame: Option<&Frame>,
        style: Option<CaptionStyle>,
    ) -> FrameOutcome {
        let mut timings = Vec::with_capacity(5);
        let outcome = self.run_stages(key, ts, landmarks, raw_frame, style, &mut timings);
        self.record(&outcome, &timings);
        outcome
    }

    fn run_stages(
        &self,
        key: &SessionKey,
        ts: i64,
        landmarks: LandmarkFrame,
        raw_frame: Option<&Frame>,
        style: Option<CaptionStyle>,
        timings: &mut Vec<(&'static str, f64)>,
    ) -> FrameOutcome {
        if let Some(style) = style {
            self.profiles.set_style(key, style);
        }

        let t = Instant::now();
        self.buffer.append(key, landmarks);
        let window = self.buffer.window(key);
        timings.push(("buffer", elapsed_ms(t)));
        let Some(window) = window else {
            return FrameOutcome::Buffering;
        };

        let t = Instant::now();
        let active = self.gate.is_active(&window);
        timings.push(("gate", elapsed_ms(t)));
        if !active {
            return FrameOutcome::Inactive;
        }

        let t = Instant::now();
        let prediction = self.classifier.classify(&window, raw_frame, key);
        timings.push(("classify", elapsed_ms(t)));
        if let Some(floor) = self.confidence_floor {
            if prediction.confidence < floor {
                log::debug!(
                    "Dropping {} at {:.2} below floor {floor} for {key}",
                    prediction.token,
                    prediction.confidence
                );
                return FrameOutcome::BelowFloor;
            }
        }

        let t = Instant::now();
        let smoothed = self.smoother.smooth(prediction, key);
        timings.push(("smooth", elapsed_ms(t)));

        let t = Instant::now();
        let profile = self.profiles.get_profile(key);
        let translation = self.translator.translate(&smoothed, &profile, style);
        timings.push(("translate", elapsed_ms(t)));

        FrameOutcome::Captioned(CaptionEvent::new(
            key.session(),
            key.user(),
            ts,
            translation,
            Some(window.frames_with_hands()),
        ))
    }

    /// Records a user correction; returns the acknowledgement caption when
    /// acknowledgements are enabled.
    pub fn apply_correction(
        &self,
        key: &SessionKey,
        ts: i64,
        incorrect_token: &str,
        correct_token: &str,
    ) -> Option<CaptionEvent> {
        self.profiles
            .apply_correction(key, incorrect_token, correct_token);
        self.ack_corrections.then(|| {
            CaptionEvent::new(
                key.session(),
                key.user(),
                ts,
                self.translator.acknowledge_correction(correct_token),
                None,
            )
        })
    }

    /// Clears buffered frames, feature smoothing and vote history for `key`.
    /// The correction profile is kept.
    pub fn reset_session(&self, key: &SessionKey) {
        self.buffer.reset(key);
        self.classifier.reset(key);
        self.smoother.reset(key);
    }

    /// Sweeps every per-key store; returns the number of entries dropped.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let dropped = self.buffer.evict_idle(now)
            + self.classifier.evict_idle(now)
            + self.smoother.evict_idle(now)
            + self.profiles.evict_idle(now);
        if dropped > 0 {
            log::info!("Evicted {dropped} idle session entries");
        }
        dropped
    }

    pub fn fallback_count(&self) -> u64 {
        self.classifier.fallback_count()
    }

    pub fn summary(&self) {
        let mut logger = self.logger.lock().unwrap_or_else(|e| e.into_inner());
        let fallbacks = self.fallback_count();
        if fallbacks > 0 {
            logger.info(&format!("Classifier fell back to prototypes {fallbacks} times"));
        }
        logger.summary();
    }

    fn record(&self, outcome: &FrameOutcome, timings: &[(&'static str, f64)]) {
        let mut logger = self.logger.lock().unwrap_or_else(|e| e.into_inner());
        for (stage, ms) in timings {
            logger.timing(stage, *ms);
        }
        if let FrameOutcome::Captioned(event) = outcome {
            logger.metric("confidence", event.confidence);
            if let Some(hands) = event.hands_detected {
                logger.metric("hands_detected", hands as f64);
            }
        }
        logger.outcome(outcome.label());
    }
}

pub fn eviction_policy(settings: &Settings) -> Arc<dyn EvictionPolicy> {
    match settings.session_idle_timeout() {
        Some(timeout) => Arc::new(IdleTimeout::new(timeout)),
        None => Arc::new(NeverEvict),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::recognition::domain::prototype_classifier::{PrototypeClassifier, PrototypeConfig};
    use crate::recognition::domain::sign_classifier::Prediction;
    use crate::shared::landmarks::test_support::*;
    use crate::shared::landmarks::LandmarkWindow;
    use crate::translation::domain::caption_generator::{CaptionError, UnavailableCaptionGenerator};
    use crate::translation::domain::translator::CaptionMode;
    use std::time::Duration;

    struct FixedClassifier(f64);

    impl SignClassifier for FixedClassifier {
        fn classify(
            &self,
            window: &LandmarkWindow,
            _raw_frame: Option<&Frame>,
            _key: &SessionKey,
        ) -> Prediction {
            Prediction::new("HELLO", self.0, "THANKS", window.ts_end())
        }
    }

    struct FixedGenerator;

    impl CaptionGenerator for FixedGenerator {
        fn generate(&self, _gloss: &str, _style: CaptionStyle) -> Result<String, CaptionError> {
            Ok("Hi there".to_string())
        }
    }

    fn prototype_pipeline(settings: &Settings) -> CaptionPipeline {
        let classifier = PrototypeClassifier::new(PrototypeConfig::default(), Arc::new(NeverEvict));
        CaptionPipeline::new(
            settings,
            Box::new(classifier),
            Arc::new(UnavailableCaptionGenerator),
            Box::new(NullPipelineLogger),
        )
    }

    fn fixed_pipeline(confidence: f64, generator: Arc<dyn CaptionGenerator>) -> CaptionPipeline {
        CaptionPipeline::new(
            &Settings::default(),
            Box::new(FixedClassifier(confidence)),
            generator,
            Box::new(NullPipelineLogger),
        )
    }

    fn key() -> SessionKey {
        SessionKey::new("call-1", "alice")
    }

    fn feed(pipeline: &CaptionPipeline, frames: &[Arc<LandmarkFrame>]) -> Vec<FrameOutcome> {
        frames
            .iter()
            .map(|f| {
                pipeline.process_frame(
                    &key(),
                    f.timestamp,
                    (**f).clone(),
                    None,
                    Some(CaptionStyle::Concise),
                )
            })
            .collect()
    }

    #[test]
    fn test_wave_stream_produces_captions() {
        let pipeline = prototype_pipeline(&Settings::default());
        let outcomes = feed(&pipeline, &wave_frames(30));
        let captions: Vec<CaptionEvent> =
            outcomes.into_iter().filter_map(FrameOutcome::into_caption).collect();

        assert!(!captions.is_empty());
        for c in &captions {
            assert!(matches!(
                c.mode,
                CaptionMode::Template | CaptionMode::Llm | CaptionMode::Uncertain
            ));
            assert!((0.0..=1.0).contains(&c.confidence));
            assert!(!c.caption.is_empty());
            assert_eq!(c.session, "call-1");
            assert_eq!(c.user, "alice");
            assert_eq!(c.hands_detected, Some(10));
        }
        assert_eq!(captions.last().unwrap().caption, "Hello");
    }

    #[test]
    fn test_no_caption_before_window_fills() {
        let pipeline = prototype_pipeline(&Settings::default());
        let outcomes = feed(&pipeline, &wave_frames(10));
        for outcome in &outcomes[..9] {
            assert_eq!(*outcome, FrameOutcome::Buffering);
        }
        assert!(matches!(outcomes[9], FrameOutcome::Captioned(_)));
    }

    #[test]
    fn test_caption_echoes_request_timestamp() {
        let pipeline = prototype_pipeline(&Settings::default());
        let frames = wave_frames(10);
        let mut last = FrameOutcome::Buffering;
        for (i, f) in frames.iter().enumerate() {
            last = pipeline.process_frame(&key(), 5000 + i as i64, (**f).clone(), None, None);
        }
        assert_eq!(last.into_caption().unwrap().ts, 5009);
    }

    #[test]
    fn test_stale_frame_does_not_silence_the_key() {
        let pipeline = fixed_pipeline(0.7, Arc::new(UnavailableCaptionGenerator));
        let mut frames = wave_frames(30);
        let mut stale = (*frames[12]).clone();
        stale.timestamp = 0;
        frames[12] = Arc::new(stale);
        let outcomes = feed(&pipeline, &frames);
        let silent = outcomes[9..]
            .iter()
            .filter(|o| !matches!(o, FrameOutcome::Captioned(_)))
            .count();
        assert!(silent <= 1, "{silent} frames without a caption");
    }

    #[test]
    fn test_idle_hands_are_gated() {
        let pipeline = prototype_pipeline(&Settings::default());
        let frames: Vec<_> = (0..12).map(|i| frame_at(i, vec![open_hand(0.5, 0.5)])).collect();
        let outcomes = feed(&pipeline, &frames);
        assert!(outcomes[9..].iter().all(|o| *o == FrameOutcome::Inactive));
    }

    #[test]
    fn test_low_confidence_asks_for_clarification() {
        let pipeline = fixed_pipeline(0.15, Arc::new(UnavailableCaptionGenerator));
        let outcomes = feed(&pipeline, &wave_frames(10));
        let caption = outcomes.last().cloned().unwrap().into_caption().unwrap();
        assert_eq!(caption.mode, CaptionMode::Uncertain);
        assert!(caption.caption.contains("HELLO"));
        assert!(caption.caption.contains("THANKS"));
    }

    #[test]
    fn test_unavailable_service_falls_back_to_template() {
        let pipeline = fixed_pipeline(0.90, Arc::new(UnavailableCaptionGenerator));
        let outcomes = feed(&pipeline, &wave_frames(10));
        let caption = outcomes.last().cloned().unwrap().into_caption().unwrap();
        assert_eq!(caption.mode, CaptionMode::Template);
        assert_eq!(caption.caption, "Hello");
    }

    #[test]
    fn test_available_service_is_used_at_high_confidence() {
        let pipeline = fixed_pipeline(0.90, Arc::new(FixedGenerator));
        let outcomes = feed(&pipeline, &wave_frames(10));
        let caption = outcomes.last().cloned().unwrap().into_caption().unwrap();
        assert_eq!(caption.mode, CaptionMode::Llm);
        assert_eq!(caption.caption, "Hi there");
    }

    #[test]
    fn test_confidence_floor_drops_prediction() {
        let settings = Settings {
            confidence_floor: Some(0.35),
            ..Settings::default()
        };
        let pipeline = CaptionPipeline::new(
            &settings,
            Box::new(FixedClassifier(0.2)),
            Arc::new(UnavailableCaptionGenerator),
            Box::new(NullPipelineLogger),
        );
        let outcomes = feed(&pipeline, &wave_frames(10));
        assert_eq!(outcomes[9], FrameOutcome::BelowFloor);
    }

    #[test]
    fn test_corrections_bias_later_captions() {
        let pipeline = fixed_pipeline(0.7, Arc::new(UnavailableCaptionGenerator));
        let ack = pipeline.apply_correction(&key(), 1, "HELLO", "MOTHER").unwrap();
        assert_eq!(ack.caption, "Noted correction: MOTHER");
        assert_eq!(ack.confidence, 1.0);
        assert_eq!(ack.mode, CaptionMode::Template);
        assert_eq!(ack.hands_detected, None);
        pipeline.apply_correction(&key(), 2, "HELLO", "MOTHER");

        let outcomes = feed(&pipeline, &wave_frames(10));
        let caption = outcomes.last().cloned().unwrap().into_caption().unwrap();
        assert_eq!(caption.caption, "Mother");
    }

    #[test]
    fn test_ack_can_be_disabled() {
        let settings = Settings {
            ack_corrections: false,
            ..Settings::default()
        };
        let pipeline = prototype_pipeline(&settings);
        assert!(pipeline.apply_correction(&key(), 1, "HOW", "YOU").is_none());
    }

    #[test]
    fn test_frame_style_sticks_to_profile() {
        let pipeline = fixed_pipeline(0.7, Arc::new(UnavailableCaptionGenerator));
        let frames = wave_frames(11);
        for (i, f) in frames.iter().take(10).enumerate() {
            let style = (i == 0).then_some(CaptionStyle::Detailed);
            pipeline.process_frame(&key(), f.timestamp, (**f).clone(), None, style);
        }
        let last = pipeline
            .process_frame(&key(), 1000, (*frames[10]).clone(), None, None)
            .into_caption()
            .unwrap();
        assert_eq!(last.caption, "Hello! The user just greeted me.");
    }

    #[test]
    fn test_reset_session_restarts_buffering() {
        let pipeline = prototype_pipeline(&Settings::default());
        feed(&pipeline, &wave_frames(10));
        pipeline.reset_session(&key());
        let outcome = pipeline.process_frame(&key(), 0, LandmarkFrame::empty(2000), None, None);
        assert_eq!(outcome, FrameOutcome::Buffering);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let pipeline = prototype_pipeline(&Settings::default());
        feed(&pipeline, &wave_frames(9));
        let other = SessionKey::new("call-1", "bob");
        let outcome = pipeline.process_frame(&other, 0, (*wave_frames(1)[0]).clone(), None, None);
        assert_eq!(outcome, FrameOutcome::Buffering);
    }

    #[test]
    fn test_idle_sessions_are_evicted() {
        let settings = Settings {
            session_idle_timeout_secs: Some(60),
            ..Settings::default()
        };
        let pipeline = prototype_pipeline(&settings);
        feed(&pipeline, &wave_frames(10));
        assert_eq!(pipeline.evict_idle(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(120);
        assert!(pipeline.evict_idle(later) >= 3);
        let outcome = pipeline.process_frame(&key(), 0, LandmarkFrame::empty(0), None, None);
        assert_eq!(outcome, FrameOutcome::Buffering);
    }
}
