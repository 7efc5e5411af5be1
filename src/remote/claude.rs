//! Claude API client used as the remote analyzer
//!
//! Requires the `ai` feature to be enabled:
//! ```toml
//! quill = { version = "1.0", features = ["ai"] }
//! ```

use super::{EnrichmentClient, RemoteError};

#[cfg(feature = "ai")]
const API_URL: &str = "https://api.anthropic.com/v1/messages";
#[cfg(feature = "ai")]
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Claude API client. Without the `ai` feature it holds nothing and every
/// request fails.
pub struct ClaudeClient {
    #[cfg(feature = "ai")]
    api_key: String,
    #[cfg(feature = "ai")]
    model: String,
    #[cfg(feature = "ai")]
    base_url: String,
    #[cfg(feature = "ai")]
    max_tokens: u32,
}

impl ClaudeClient {
    /// Create a new Claude client using ANTHROPIC_API_KEY from environment
    pub fn from_env() -> Result<Self, RemoteError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| RemoteError::NoApiKey)?;
        if api_key.trim().is_empty() {
            return Err(RemoteError::NoApiKey);
        }
        Ok(Self::with_key(api_key))
    }

    /// Create a client with a specific API key
    #[cfg(feature = "ai")]
    pub fn with_key(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: API_URL.to_string(),
            max_tokens: 1000,
        }
    }

    #[cfg(not(feature = "ai"))]
    pub fn with_key(_api_key: String) -> Self {
        Self {}
    }

    /// Set the model to use
    #[cfg(feature = "ai")]
    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    #[cfg(not(feature = "ai"))]
    pub fn model(self, _model: &str) -> Self {
        self
    }

    /// Send a prompt to Claude and return the text of the reply
    #[cfg(feature = "ai")]
    pub fn send_request(&self, prompt: &str) -> Result<String, RemoteError> {
        use serde_json::json;

        let client = reqwest::blocking::Client::new();

        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.3,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let response = client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized(status.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            return Err(RemoteError::ApiError(format!("{}: {}", status, error_text)));
        }

        let json: serde_json::Value = response
            .json()
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        json["content"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|item| item["text"].as_str())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::InvalidResponse("No content in response".to_string()))
    }

    #[cfg(not(feature = "ai"))]
    pub fn send_request(&self, _prompt: &str) -> Result<String, RemoteError> {
        Err(RemoteError::RequestFailed(
            "AI feature not enabled. Rebuild with: cargo build --features ai".to_string(),
        ))
    }
}

impl EnrichmentClient for ClaudeClient {
    fn query(&self, prompt: &str) -> Result<String, RemoteError> {
        self.send_request(prompt)
    }
}

/// Check if the AI feature is available
pub fn is_ai_available() -> bool {
    cfg!(feature = "ai")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "ai")]
    #[test]
    fn test_builder_sets_model() {
        let client = ClaudeClient::with_key("key".to_string()).model("claude-haiku");
        assert_eq!(client.model, "claude-haiku");
        assert_eq!(client.api_key, "key");
        assert_eq!(client.base_url, API_URL);
        assert_eq!(client.max_tokens, 1000);
        assert!(is_ai_available());
    }

    #[cfg(not(feature = "ai"))]
    #[test]
    fn test_without_feature_query_fails() {
        let client = ClaudeClient::with_key("key".to_string()).model("claude-haiku");
        assert!(matches!(client.query("hi"), Err(RemoteError::RequestFailed(_))));
        assert!(!is_ai_available());
        assert_eq!(std::mem::size_of::<ClaudeClient>(), 0);
    }
}
