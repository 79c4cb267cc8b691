use crate::error::TextGenError;
use crate::level::Level;
use include_dir::{include_dir, Dir};
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::time::Duration;

static FALLBACK_DIR: Dir = include_dir!("src/fallback");

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Text ready to be typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeText {
    pub text: String,
    pub level: Level,
    /// True when generation failed and a canned text was substituted
    pub is_fallback: bool,
}

/// Something that can produce practice text for a level
pub trait TextSource: Send + Sync {
    fn generate(&self, level: Level) -> Result<String, TextGenError>;
}

/// Always returns the same text, e.g. one given on the command line
#[derive(Debug, Clone)]
pub struct StaticText(pub String);

impl TextSource for StaticText {
    fn generate(&self, _level: Level) -> Result<String, TextGenError> {
        Ok(self.0.clone())
    }
}

/// Google Gemini `generateContent` client
pub struct GeminiTextSource {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .flatten()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl GeminiTextSource {
    /// `api_key` falls back to `GEMINI_API_KEY` when not configured
    pub fn new(api_key: Option<String>) -> Result<Self, TextGenError> {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, TextGenError> {
        let api_key = api_key
            .or_else(|| std::env::var(GEMINI_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty());
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into(),
            model: GEMINI_MODEL.to_string(),
        })
    }

    fn request_body(level: Level) -> GenerateRequest<'static> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart {
                    text: level.prompt(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.9,
                top_k: 1,
                top_p: 1.0,
                max_output_tokens: 2048,
            },
            safety_settings: vec![SafetySetting {
                category: "HARM_CATEGORY_HARASSMENT",
                threshold: "BLOCK_MEDIUM_AND_ABOVE",
            }],
        }
    }
}

impl TextSource for GeminiTextSource {
    fn generate(&self, level: Level) -> Result<String, TextGenError> {
        let api_key = self.api_key.as_ref().ok_or(TextGenError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!("requesting {level} text from {}", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(level))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(TextGenError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json()?;
        let text = normalize_text(&body.into_text());
        if text.is_empty() {
            return Err(TextGenError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct FallbackFile {
    texts: Vec<String>,
}

/// A canned text for the level, used when generation fails
pub fn fallback_text(level: Level) -> String {
    let file_name = format!("{}.json", level.to_string().to_lowercase());
    let texts = FALLBACK_DIR
        .get_file(&file_name)
        .and_then(|f| f.contents_utf8())
        .and_then(|s| serde_json::from_str::<FallbackFile>(s).ok())
        .map(|f| f.texts)
        .unwrap_or_default();

    texts
        .choose(&mut rand::thread_rng())
        .map(|t| normalize_text(t))
        .unwrap_or_else(|| "the quick brown fox jumps over the lazy dog".to_string())
}

/// Trim and collapse all whitespace runs to single spaces
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Obtain practice text, substituting a fallback on any failure
pub fn fetch_practice_text(source: &dyn TextSource, level: Level) -> PracticeText {
    match source.generate(level).map(|t| normalize_text(&t)) {
        Ok(text) if !text.is_empty() => PracticeText {
            text,
            level,
            is_fallback: false,
        },
        Ok(_) => {
            warn!("text source returned nothing for {level}, using fallback text");
            fallback(level)
        }
        Err(e) => {
            warn!("text generation failed for {level}, using fallback text: {e}");
            fallback(level)
        }
    }
}

fn fallback(level: Level) -> PracticeText {
    PracticeText {
        text: fallback_text(level),
        level,
        is_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct FailingSource;

    impl TextSource for FailingSource {
        fn generate(&self, _level: Level) -> Result<String, TextGenError> {
            Err(TextGenError::Api {
                status: 429,
                message: "quota".into(),
            })
        }
    }

    #[test]
    fn test_fallback_texts_exist_for_every_level() {
        for level in Level::ALL {
            let text = fallback_text(level);
            assert!(!text.is_empty());
            assert_eq!(text, normalize_text(&text));
        }
    }

    #[test]
    fn test_beginner_fallback_has_no_punctuation() {
        let text = fallback_text(Level::Beginner);
        assert!(text
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == ' '));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  hello \n\n world\t"), "hello world");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_fetch_uses_source_text() {
        let text = fetch_practice_text(&StaticText("hi  there\n".into()), Level::Advanced);
        assert_eq!(
            text,
            PracticeText {
                text: "hi there".into(),
                level: Level::Advanced,
                is_fallback: false,
            }
        );
    }

    #[test]
    fn test_fetch_falls_back_on_error() {
        let text = fetch_practice_text(&FailingSource, Level::Intermediate);
        assert!(text.is_fallback);
        assert_eq!(text.level, Level::Intermediate);
        assert!(!text.text.is_empty());
    }

    #[test]
    fn test_fetch_falls_back_on_blank_text() {
        let text = fetch_practice_text(&StaticText("   ".into()), Level::Beginner);
        assert!(text.is_fallback);
    }

    #[test]
    fn test_missing_api_key() {
        let source = GeminiTextSource {
            client: reqwest::blocking::Client::new(),
            api_key: None,
            base_url: "http://127.0.0.1:9".into(),
            model: GEMINI_MODEL.into(),
        };
        assert_matches!(
            source.generate(Level::Beginner),
            Err(TextGenError::MissingApiKey)
        );
    }

    #[test]
    fn test_request_body_shape() {
        let json = serde_json::to_value(GeminiTextSource::request_body(Level::Beginner)).unwrap();
        assert_eq!(json["generationConfig"]["topK"], 1);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(
            json["contents"][0]["parts"][0]["text"],
            Level::Beginner.prompt()
        );
        assert_eq!(json["safetySettings"][0]["category"], "HARM_CATEGORY_HARASSMENT");
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"one two"},{"text":"three"}]}}]}"#;
        let body: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.into_text(), "one two three");
    }

    #[test]
    fn test_response_without_candidates() {
        let body: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(body.into_text(), "");
    }
}
