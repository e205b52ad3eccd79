//! OpenAI-compatible chat completions transport.

use super::{LlmHttpConfig, build_http_client};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Sampling defaults for analyst prose.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Completion length cap.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Blocking client for any `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    provider: &'static str,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

impl ChatCompletionsClient {
    pub fn new(
        provider: &'static str,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        http: LlmHttpConfig,
    ) -> Self {
        Self {
            provider,
            api_key: None,
            endpoint: endpoint.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client: build_http_client(http),
        }
    }

    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_api_key(&mut self, key: Option<SecretString>) {
        self.api_key = key.filter(|k| !k.expose_secret().trim().is_empty());
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub const fn set_sampling(&mut self, temperature: f32, max_tokens: u32) {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
    }

    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn operation(&self) -> String {
        format!("{}_request", self.provider)
    }

    /// Posts the messages and returns the first choice's content.
    pub fn send(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::operation(self.operation(), "API key not configured"))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|e| Error::operation(self.operation(), e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::debug!(provider = self.provider, %status, "Chat completion rejected");
            return Err(Error::operation(
                self.operation(),
                format!("API returned status: {status} - {body}"),
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| Error::operation(self.operation(), format!("invalid response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| Error::operation(self.operation(), "response contained no choices"))
    }
}

/// Request body for chat completions.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ChatCompletionsClient {
        ChatCompletionsClient::new(
            "openai",
            "https://api.example.com/v1",
            "gpt-4o",
            LlmHttpConfig::default(),
        )
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let mut client = client();
        client.set_api_key(Some(SecretString::from("   ")));
        assert!(!client.is_configured());
        client.set_api_key(Some(SecretString::from("sk-test")));
        assert!(client.is_configured());
    }

    #[test]
    fn test_send_without_key_fails_fast() {
        let err = client().send(vec![ChatMessage::user("hi")]).unwrap_err();
        assert!(err.to_string().contains("openai_request"));
        assert!(err.to_string().contains("API key not configured"));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "sonar-pro",
            messages: vec![ChatMessage::system("analyst"), ChatMessage::user("data")],
            temperature: 0.7,
            max_tokens: 1000,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "sonar-pro");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "data");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  Bedok looks underserved. "}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.trim(), "Bedok looks underserved.");
    }
}
