//! Language Model Client
//!
//! Defines the [`LanguageModel`] collaborator trait and the Gemini REST
//! implementation. The model is stateless per call: conversation history is
//! embedded into the prompt text by the client, never stored server-side.
//!
//! Also home to [`strip_code_fence`], the shared post-processing step for
//! model replies that arrive wrapped in Markdown code fences (```sql,
//! ```json, or bare ```).

use serde_json::json;

use crate::context::Turn;
use crate::error::{Result, TabletalkError};

/// Default Gemini API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Text-in, text-out language model
///
/// One operation: given a prompt and the trailing conversation turns the
/// caller wants visible, return generated text.
pub trait LanguageModel {
    /// Ask the model; `history` may be empty
    fn ask(
        &self,
        prompt: &str,
        history: &[Turn],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Gemini REST API client (`generateContent`)
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    /// Create a client for the given model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create a client against a non-default endpoint (proxies, tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }
}

impl LanguageModel for GeminiModel {
    async fn ask(&self, prompt: &str, history: &[Turn]) -> Result<String> {
        let full_prompt = prompt_with_history(prompt, history);

        // Temperature 0: SQL generation wants precision, not creativity
        let body = json!({
            "contents": [
                {"role": "user", "parts": [{"text": full_prompt}]}
            ],
            "generationConfig": {"temperature": 0}
        });

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TabletalkError::model_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(TabletalkError::model_failed(format!("HTTP {status}: {detail}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TabletalkError::model_failed(format!("invalid response body: {e}")))?;

        extract_reply(&payload)
            .ok_or_else(|| TabletalkError::model_failed("response contained no candidate text"))
    }
}

/// Pull the generated text out of a `generateContent` response
fn extract_reply(payload: &serde_json::Value) -> Option<String> {
    let text = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;

    Some(text.trim().to_string())
}

/// Embed trailing conversation turns ahead of the current prompt
#[must_use]
pub fn prompt_with_history(prompt: &str, history: &[Turn]) -> String {
    if history.is_empty() {
        return prompt.to_string();
    }

    let rendered: Vec<String> = history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect();

    format!(
        "Previous conversation:\n{}\n\nCurrent request:\n{}",
        rendered.join("\n"),
        prompt
    )
}

/// Remove a Markdown code fence wrapping, if present
///
/// Handles ```sql / ```json / bare ``` fences, multi-line or single-line.
/// Unfenced input is returned trimmed.
#[must_use]
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();

    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    let inner = match after_open.find('\n') {
        // Multi-line fence: drop the opening line (with any language tag)
        Some(pos) => &after_open[pos + 1..],
        // Single-line fence: drop a leading language tag if present
        None => {
            let rest = after_open.trim_start();
            ["sql", "json"]
                .iter()
                .find_map(|lang| rest.strip_prefix(lang))
                .unwrap_or(rest)
        }
    };

    let inner = inner.trim_end();
    inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
}
