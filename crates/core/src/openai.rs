//! OpenAI-compatible chat completions adapter.
//!
//! Implements [`SemanticGrouper`] and [`SemanticLabeler`] over the
//! `/chat/completions` endpoint in JSON mode. Any server speaking the same
//! protocol works; point `base_url` at it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LayoutError, Result};
use crate::semantic::{Granularity, SemanticGrouper, SemanticRequest};
use crate::wash::SemanticLabeler;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// HTTP client for an OpenAI-compatible API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    /// Sends one JSON-mode completion and returns the message text.
    async fn complete(&self, system_prompt: &str, payload: &serde_json::Value) -> Result<String> {
        let user_content = serde_json::to_string(payload)?;
        let request = ChatRequest {
            model: &self.settings.model,
            messages: [
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: &user_content,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        };

        let response = self
            .client
            .post(self.settings.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LayoutError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LayoutError::Provider(format!("API error ({status}): {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LayoutError::Provider(format!("unreadable response: {e}")))?;
        debug!(model = %self.settings.model, choices = chat.choices.len(), "completion received");

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LayoutError::Provider("response has no message content".to_string()))
    }
}

#[async_trait]
impl SemanticGrouper for OpenAiClient {
    async fn group(&self, request: &SemanticRequest) -> Result<String> {
        let prompt = match request.granularity {
            Granularity::Lines => LINE_GROUPING_PROMPT,
            Granularity::Segments => SEGMENT_GROUPING_PROMPT,
        };
        self.complete(prompt, &request.payload).await
    }
}

#[async_trait]
impl SemanticLabeler for OpenAiClient {
    async fn label(&self, payload: &serde_json::Value) -> Result<String> {
        self.complete(WASH_PROMPT, payload).await
    }
}

const LINE_GROUPING_PROMPT: &str = r#"You group OCR lines from a photographed restaurant menu into dish description paragraphs.

Each input line has: index, text, bbox (normalized to 0..1, with centers) and flags (price_like, numeric_only, word_count).

Rules:
- A paragraph holds only lines that describe one dish (ingredients, preparation, serving notes).
- Never put dish names, prices, section headers, branding or promotions in a paragraph.
- Lines of one description are usually stacked closely below the dish name in the same column.
- Every index may appear at most once. When unsure, leave the line out.

Answer with JSON only:
{"paragraphs": [{"lineIndices": [<int>, ...]}, ...]}"#;

const SEGMENT_GROUPING_PROMPT: &str = r#"You group text segments from a photographed restaurant menu into dish description paragraphs.

Segments are pieces of OCR lines. Each has: index, source_line_index, segment_order (position within its line), text, bbox (normalized to 0..1) and role_hint (title, description, price or unknown).

Rules:
- One OCR line may hold several dishes, or a dish and its price. Do not treat a line as one dish.
- Use source_line_index, segment_order and bbox proximity to keep neighbouring dishes apart.
- role_hint is a hint only; OCR noise can make a description look like a title.
- Group description-like segments (ingredients, preparation) that belong to the same dish.
- Never group titles, prices, headers, store names or promotions.
- Every index may appear at most once. Do not return an empty answer when clear descriptions exist.

Answer with JSON only:
{"paragraphs": [{"segmentIndices": [<int>, ...]}, ...]}"#;

const WASH_PROMPT: &str = r#"You label text items from a photographed restaurant menu. The menu may be in any language.

Each item has: index, text, bbox (normalized to 0..1), and optionally source_line_index, segment_index, role_hint and origin (individual or paragraph).

Give every index one label:
- dish_title: the name of a menu item.
- description: ingredients or preparation details of a dish.
- price: standalone pricing text.
- non_dish: branding, addresses, contact details, legal text, promotions, section or category headers.
- unknown: anything you are unsure about.

Use text and layout together. Label clear non-dish context as non_dish. Every index at most once.

Answer with JSON only:
{"segments": [{"index": <int>, "label": "<label>"}, ...]}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let mut settings = OpenAiSettings::new("key");
        assert_eq!(settings.endpoint(), "https://api.openai.com/v1/chat/completions");
        settings.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(settings.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn request_uses_json_mode() {
        let request = ChatRequest {
            model: "m",
            messages: [
                Message {
                    role: "system",
                    content: "s",
                },
                Message {
                    role: "user",
                    content: "[]",
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][1]["content"], "[]");
    }

    #[test]
    fn prompts_name_the_decoded_fields() {
        assert!(LINE_GROUPING_PROMPT.contains("lineIndices"));
        assert!(SEGMENT_GROUPING_PROMPT.contains("segmentIndices"));
        assert!(WASH_PROMPT.contains("non_dish"));
    }
}
