//! Wire format of the transport boundary: one JSON object per event.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::landmarks::LandmarkFrame;
use crate::translation::domain::caption_style::CaptionStyle;
use crate::translation::domain::translator::{CaptionMode, Translation};

#[derive(Error, Debug)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("undecodable image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEvent {
    Frame(FrameEvent),
    Correction(CorrectionEvent),
}

impl InboundEvent {
    pub fn session(&self) -> &str {
        match self {
            InboundEvent::Frame(f) => &f.session,
            InboundEvent::Correction(c) => &c.session,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            InboundEvent::Frame(f) => &f.user,
            InboundEvent::Correction(c) => &c.user,
        }
    }
}

/// One sampled video frame. Landmarks, when present, were already
/// extracted upstream; otherwise the image is handed to the extractor.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FrameEvent {
    pub session: String,
    pub user: String,
    pub ts: i64,
    #[serde(default)]
    pub landmarks: Option<LandmarkFrame>,
    #[serde(default)]
    pub image_jpeg_b64: Option<String>,
    #[serde(default)]
    pub style: Option<CaptionStyle>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CorrectionEvent {
    pub session: String,
    pub user: String,
    pub ts: i64,
    pub incorrect_token: String,
    pub correct_token: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaptionEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session: String,
    pub user: String,
    pub ts: i64,
    pub caption: String,
    pub confidence: f64,
    pub mode: CaptionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hands_detected: Option<usize>,
}

impl CaptionEvent {
    pub fn new(
        session: &str,
        user: &str,
        ts: i64,
        translation: Translation,
        hands_detected: Option<usize>,
    ) -> Self {
        Self {
            kind: "caption",
            session: session.to_string(),
            user: user.to_string(),
            ts,
            caption: translation.caption,
            confidence: translation.confidence,
            mode: translation.mode,
            hands_detected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_event_with_landmarks() {
        let json = r#"{"type":"frame","session":"s1","user":"u1","ts":42,"style":"detailed",
            "landmarks":{"hands":[]}}"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        let InboundEvent::Frame(frame) = event else {
            panic!("expected frame event");
        };
        assert_eq!(frame.ts, 42);
        assert_eq!(frame.style, Some(CaptionStyle::Detailed));
        assert!(frame.landmarks.is_some());
        assert!(frame.image_jpeg_b64.is_none());
    }

    #[test]
    fn test_parse_correction_event() {
        let json = r#"{"type":"correction","session":"s","user":"u","ts":1,
            "incorrect_token":"HOW","correct_token":"YOU"}"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.session(), "s");
        assert!(matches!(event, InboundEvent::Correction(c) if c.correct_token == "YOU"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"type":"ping","session":"s","user":"u","ts":1}"#;
        assert!(serde_json::from_str::<InboundEvent>(json).is_err());
    }

    #[test]
    fn test_unknown_style_is_rejected() {
        let json = r#"{"type":"frame","session":"s","user":"u","ts":1,"style":"verbose"}"#;
        assert!(serde_json::from_str::<InboundEvent>(json).is_err());
    }

    #[test]
    fn test_caption_event_json_shape() {
        let event = CaptionEvent::new(
            "s",
            "u",
            7,
            Translation {
                caption: "Hello".into(),
                mode: CaptionMode::Template,
                confidence: 0.7,
                token: "HELLO".into(),
            },
            Some(10),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "caption");
        assert_eq!(value["mode"], "template");
        assert_eq!(value["hands_detected"], 10);
        assert_eq!(value["ts"], 7);
    }

    #[test]
    fn test_caption_event_omits_missing_hand_count() {
        let event = CaptionEvent::new(
            "s",
            "u",
            7,
            Translation {
                caption: "Noted correction: YOU".into(),
                mode: CaptionMode::Template,
                confidence: 1.0,
                token: "YOU".into(),
            },
            None,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("hands_detected").is_none());
    }
}
