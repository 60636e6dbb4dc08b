use thiserror::Error;

use super::caption_style::CaptionStyle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptionError {
    #[error("caption service is not configured")]
    Unavailable,
    #[error("caption request failed: {0}")]
    Request(String),
    #[error("caption service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("caption service returned no text")]
    Empty,
    #[error("caption service is cooling down after a failure")]
    CoolingDown,
}

/// Domain interface for generative caption polishing.
///
/// Turns a gloss into natural phrasing without adding information.
/// Implementations may block on I/O and must bound how long they do.
pub trait CaptionGenerator: Send + Sync {
    fn generate(&self, gloss: &str, style: CaptionStyle) -> Result<String, CaptionError>;
}

/// Always unavailable; selects the template path.
pub struct UnavailableCaptionGenerator;

impl CaptionGenerator for UnavailableCaptionGenerator {
    fn generate(&self, _gloss: &str, _style: CaptionStyle) -> Result<String, CaptionError> {
        Err(CaptionError::Unavailable)
    }
}

/// Trims, drops wrapping quotes, and caps the word count.
pub fn tidy_caption(raw: &str, max_words: usize) -> Option<String> {
    let text = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let words: Vec<&str> = text.split_whitespace().take(max_words).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_generator() {
        assert_eq!(
            UnavailableCaptionGenerator.generate("HELLO", CaptionStyle::Concise),
            Err(CaptionError::Unavailable)
        );
    }

    #[test]
    fn test_tidy_strips_quotes_and_whitespace() {
        assert_eq!(tidy_caption("  \"Hello there.\"\n", 12).as_deref(), Some("Hello there."));
    }

    #[test]
    fn test_tidy_caps_words() {
        assert_eq!(tidy_caption("one two three four", 2).as_deref(), Some("one two"));
    }

    #[test]
    fn test_tidy_rejects_blank() {
        assert_eq!(tidy_caption("  \"\" ", 12), None);
    }
}
