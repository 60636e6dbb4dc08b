//! Caption polishing through an OpenAI-compatible chat completions API.
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::shared::settings::LlmSettings;
use crate::translation::domain::caption_generator::{tidy_caption, CaptionError, CaptionGenerator};
use crate::translation::domain::caption_style::CaptionStyle;

const SYSTEM_PROMPT: &str = "You turn sign language glosses into natural English captions.\n\
Rules:\n\
1. NEVER add information that is not in the gloss.\n\
2. NEVER invent context or meaning.\n\
3. Concise captions stay under 12 words.\n\
4. Detailed captions stay under 20 words.\n\
5. Sound natural and conversational.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiCaptionGenerator {
    settings: LlmSettings,
    client: Client,
}

impl OpenAiCaptionGenerator {
    pub fn new(settings: LlmSettings) -> Result<Self, CaptionError> {
        if !settings.is_configured() {
            return Err(CaptionError::Unavailable);
        }
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| CaptionError::Request(e.to_string()))?;
        Ok(Self { settings, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.settings.endpoint.trim_end_matches('/'))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.settings.api_key.is_empty() {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", self.settings.api_key)) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn request<'a>(&'a self, gloss: &str, style: CaptionStyle) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(gloss, style),
                },
            ],
            max_tokens: style.max_tokens(),
            temperature: self.settings.temperature,
        }
    }
}

impl CaptionGenerator for OpenAiCaptionGenerator {
    fn generate(&self, gloss: &str, style: CaptionStyle) -> Result<String, CaptionError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(self.headers())
            .json(&self.request(gloss, style))
            .send()
            .map_err(|e| CaptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| CaptionError::Request(e.to_string()))?;
        let caption = parse_caption(parsed, style)?;
        log::debug!("Generated caption for {gloss}: {caption}");
        Ok(caption)
    }
}

fn user_prompt(gloss: &str, style: CaptionStyle) -> String {
    format!(
        "Convert this sign language gloss to {style} English:\n\
         Gloss: {gloss}\n\
         Output only the caption, no explanations."
    )
}

fn parse_caption(response: ChatResponse, style: CaptionStyle) -> Result<String, CaptionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| tidy_caption(&c.message.content, style.max_words()))
        .ok_or(CaptionError::Empty)
}
