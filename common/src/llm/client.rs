use crate::config::GenerationConfig;
use crate::error::{Result, ScribeError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// boundary to the external text-generation service. the trait exists so
/// the pipeline can run against a substitute client in tests.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// send one prompt and return the raw response text
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// generateContent client for the gemini api
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_attempts: usize,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScribeError::Generation(format!("http client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    async fn request_once(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScribeError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ScribeError::Generation(format!(
                "service returned {}: {}",
                status, detail
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ScribeError::Generation(format!("invalid response body: {}", e)))?;

        extract_text(&payload).ok_or_else(|| {
            ScribeError::Generation("response contained no generated text".to_string())
        })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error: Option<ScribeError> = None;

        for attempt in 1..=self.max_attempts {
            match self.request_once(prompt).await {
                Ok(text) => {
                    tracing::debug!(attempt, response_len = text.len(), "generation succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!("generation attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    last_error = Some(e);

                    if attempt < self.max_attempts {
                        tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ScribeError::Generation("no generation attempts were made".to_string())
        }))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn extract_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_from_candidate() {
        let payload = json!({
            "candidates": [
                {"content": {"parts": [{"text": "SELECT 1;"}]}}
            ]
        });

        assert_eq!(extract_text(&payload).unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let payload = json!({
            "candidates": [
                {"content": {"parts": [{"text": "SELECT "}, {"text": "1;"}]}}
            ]
        });

        assert_eq!(extract_text(&payload).unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_extract_text_missing_candidates() {
        assert!(extract_text(&json!({})).is_none());
        assert!(extract_text(&json!({"candidates": []})).is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
        };

        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(encoded["contents"][0]["parts"][0]["text"], "hello");
    }
}
