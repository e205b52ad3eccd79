//! `OpenAI` client.

use super::chat::{ChatCompletionsClient, ChatMessage, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use super::{LlmHttpConfig, LlmProvider};
use crate::Result;
use crate::config::LlmConfig;
use secrecy::SecretString;

/// `OpenAI` LLM client.
pub struct OpenAiClient {
    inner: ChatCompletionsClient,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    /// Creates a client with the key from `OPENAI_API_KEY`.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = ChatCompletionsClient::new(
            "openai",
            Self::DEFAULT_ENDPOINT,
            Self::DEFAULT_MODEL,
            LlmHttpConfig::default(),
        );
        inner.set_api_key(std::env::var("OPENAI_API_KEY").ok().map(SecretString::from));
        Self { inner }
    }

    /// Creates a client from the `[llm]` config section.
    #[must_use]
    pub fn from_config(config: &LlmConfig, http: LlmHttpConfig) -> Self {
        let mut inner = ChatCompletionsClient::new(
            "openai",
            config
                .openai_endpoint
                .as_deref()
                .unwrap_or(Self::DEFAULT_ENDPOINT),
            config.openai_model.as_deref().unwrap_or(Self::DEFAULT_MODEL),
            http,
        );
        inner.set_api_key(std::env::var("OPENAI_API_KEY").ok().map(SecretString::from));
        inner.set_sampling(
            config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        );
        Self { inner }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.inner.set_api_key(Some(SecretString::from(key.into())));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.inner.set_endpoint(endpoint);
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.inner.set_model(model);
        self
    }

    /// Returns true when an API key is available.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    /// The configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        self.inner.provider()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.inner.send(vec![ChatMessage::user(prompt)])
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.inner
            .send(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}
