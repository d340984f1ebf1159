//! External AI vision service.
//!
//! A [`VisionAdvisor`] looks at a screenshot and the page HTML and suggests
//! a CSS selector (and some descriptive text) for the section it shows.
//! [`GeminiAdvisor`] implements it over Google's `generateContent` REST API.
//!
//! Callers treat every advisor error as "no suggestion available"; see
//! [`SectionMatcher`](crate::matcher::SectionMatcher).

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::screenshot::Screenshot;
use crate::{Result, SpliceError};

/// Names offered when the service cannot suggest any.
pub const DEFAULT_SECTION_NAMES: &[&str] = &["header", "content", "section"];

/// Vision service configuration.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API key; the advisor is disabled without one.
    pub api_key: Option<String>,
    /// Service base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Number of leading page HTML characters included in the prompt.
    pub html_excerpt_chars: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout: 60,
            html_excerpt_chars: 2000,
        }
    }
}

impl VisionConfig {
    /// Default configuration with the key taken from `GEMINI_API_KEY`.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        Self { api_key, ..Default::default() }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Where the vision service thinks a screenshot's section lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSuggestion {
    #[serde(default = "default_selector")]
    pub css_selector: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub section_type: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub visual_elements: Vec<String>,
    /// True when the selector was scraped from free text instead of JSON.
    #[serde(default, skip_serializing)]
    pub from_text: bool,
}

fn default_selector() -> String {
    "body".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Override strategy for screenshot matching.
#[async_trait]
pub trait VisionAdvisor: Send + Sync {
    /// Suggests where in `page_html` the screenshot's section is.
    async fn locate(&self, screenshot: &Screenshot, page_html: &str, section_name: &str) -> Result<VisionSuggestion>;

    /// Suggests 3-5 semantic names for the screenshot's section.
    async fn suggest_names(&self, screenshot: &Screenshot) -> Result<Vec<String>>;
}

/// Section names from an advisor, or [`DEFAULT_SECTION_NAMES`] on any failure.
pub async fn suggest_names_or_default(advisor: Option<&dyn VisionAdvisor>, screenshot: &Screenshot) -> Vec<String> {
    let defaults = || -> Vec<String> { DEFAULT_SECTION_NAMES.iter().map(|s| s.to_string()).collect() };
    let Some(advisor) = advisor else {
        return defaults();
    };

    match advisor.suggest_names(screenshot).await {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => defaults(),
        Err(err) => {
            tracing::warn!(error = %err, "section name suggestion failed, using defaults");
            defaults()
        }
    }
}

/// Gemini `generateContent` client.
pub struct GeminiAdvisor {
    client: Client,
    config: VisionConfig,
    api_key: String,
}

impl GeminiAdvisor {
    /// Creates an advisor; `None` when no API key is configured.
    pub fn new(config: VisionConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(SpliceError::HttpError)?;
        Ok(Some(Self { client, config, api_key }))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, prompt: &str, screenshot: &Screenshot) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(screenshot.bytes());
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": screenshot.mime(), "data": data } }
                ]
            }]
        });

        tracing::debug!(model = %self.config.model, image_bytes = screenshot.bytes().len(), "calling vision service");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| SpliceError::VisionUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpliceError::VisionUnavailable(format!("service answered {status}")));
        }

        let payload: GenerateResponse =
            response.json().await.map_err(|e| SpliceError::VisionResponse(e.to_string()))?;

        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SpliceError::VisionResponse("empty response".to_string()));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Deserialize)]
struct GenerateCandidate {
    content: GenerateContent,
}

#[derive(Debug, Deserialize)]
struct GenerateContent {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Deserialize)]
struct GeneratePart {
    text: Option<String>,
}

#[async_trait]
impl VisionAdvisor for GeminiAdvisor {
    async fn locate(&self, screenshot: &Screenshot, page_html: &str, section_name: &str) -> Result<VisionSuggestion> {
        let prompt = locate_prompt(page_html, section_name, self.config.html_excerpt_chars);
        let text = self.generate(&prompt, screenshot).await?;
        parse_vision_response(&text)
    }

    async fn suggest_names(&self, screenshot: &Screenshot) -> Result<Vec<String>> {
        let text = self.generate(NAMES_PROMPT, screenshot).await?;
        parse_name_suggestions(&text)
    }
}

const NAMES_PROMPT: &str = r#"Look at this screenshot of a website section and suggest appropriate names for this section.
Consider common web development naming conventions.

Respond with a JSON array of 3-5 suggested names, ordered by relevance:
["header", "navigation", "nav"]

Focus on descriptive, semantic names that web developers would use."#;

fn locate_prompt(page_html: &str, section_name: &str, excerpt_chars: usize) -> String {
    let excerpt: String = page_html.chars().take(excerpt_chars).collect();
    format!(
        r#"You are an expert web developer analyzing a screenshot of a website section. Identify which HTML element in the HTML below renders the section shown in the screenshot.

HTML Content:
{excerpt}...

Section Name: {section_name}

Respond in JSON with this structure:
{{
    "css_selector": "a CSS selector that uniquely identifies the section",
    "confidence": 0.95,
    "reasoning": "why this selector was chosen",
    "section_type": "header|hero|content|footer|sidebar|etc",
    "text_content": "key text visible in the section",
    "visual_elements": ["list", "of", "visual", "elements"]
}}"#
    )
}

fn json_object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

fn json_array_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"))
}

fn selector_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.#][A-Za-z_][A-Za-z0-9_-]*").expect("valid regex"))
}

/// Interprets a model answer for [`VisionAdvisor::locate`].
///
/// The first `{...}` block is read as JSON. Without one, the first `.class`
/// or `#id` token in the text is used at confidence 0.7.
pub fn parse_vision_response(text: &str) -> Result<VisionSuggestion> {
    if let Some(found) = json_object_regex().find(text)
        && let Ok(mut suggestion) = serde_json::from_str::<VisionSuggestion>(found.as_str())
    {
        suggestion.confidence = suggestion.confidence.clamp(0.0, 1.0);
        suggestion.from_text = false;
        return Ok(suggestion);
    }

    let selector = selector_token_regex()
        .find(text)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SpliceError::VisionResponse("no selector in response".to_string()))?;

    Ok(VisionSuggestion {
        css_selector: selector,
        confidence: 0.7,
        reasoning: "selector taken from free-text answer".to_string(),
        section_type: String::new(),
        text_content: String::new(),
        visual_elements: Vec::new(),
        from_text: true,
    })
}

/// Interprets a model answer for [`VisionAdvisor::suggest_names`].
pub fn parse_name_suggestions(text: &str) -> Result<Vec<String>> {
    let found = json_array_regex()
        .find(text)
        .ok_or_else(|| SpliceError::VisionResponse("no JSON array in response".to_string()))?;
    let names: Vec<String> = serde_json::from_str(found.as_str())?;
    Ok(names.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect())
}
