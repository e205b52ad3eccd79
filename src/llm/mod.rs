//! LLM client abstraction.
//!
//! Chat-completion providers used to write the optional prose analysis on a
//! recommendation report. Every provider is synchronous and is expected to be
//! called from a blocking task.

mod chat;
mod fallback;
mod openai;
mod perplexity;
mod resilience;

pub use fallback::FallbackLlmProvider;
pub use openai::OpenAiClient;
pub use perplexity::PerplexityClient;
pub use resilience::{BreakerState, LlmResilienceConfig, ResilientLlmProvider};

use crate::config::LlmConfig;
use crate::Result;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// The default implementation folds the system prompt into the user
    /// message; chat providers override it with a native system role.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

impl<P: LlmProvider + ?Sized> LlmProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        (**self).complete_with_system(system, user)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Reads timeouts from the `[llm]` config section.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: config.timeout_ms.unwrap_or(defaults.timeout_ms),
            connect_timeout_ms: config
                .connect_timeout_ms
                .unwrap_or(defaults.connect_timeout_ms),
        }
    }

    /// Applies `LAUNCHGAP_LLM_TIMEOUT_MS` and `LAUNCHGAP_LLM_CONNECT_TIMEOUT_MS`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("LAUNCHGAP_LLM_TIMEOUT_MS")
            && let Ok(timeout_ms) = v.parse::<u64>()
        {
            self.timeout_ms = timeout_ms;
        }
        if let Ok(v) = std::env::var("LAUNCHGAP_LLM_CONNECT_TIMEOUT_MS")
            && let Ok(connect_timeout_ms) = v.parse::<u64>()
        {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

/// Builds a blocking HTTP client with the configured timeouts.
///
/// Must not be called from inside an async context.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Builds the configured provider chain.
///
/// Providers are taken from `config.providers` in order; a provider without an
/// API key is skipped. Returns `None` when the LLM is disabled or no provider
/// is usable, in which case reports carry the fallback analysis.
#[must_use]
pub fn build_provider(config: &LlmConfig) -> Option<Box<dyn LlmProvider>> {
    if !config.enabled {
        return None;
    }

    let http = LlmHttpConfig::from_config(config).with_env_overrides();
    let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();
    for name in &config.providers {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => {
                let client = OpenAiClient::from_config(config, http);
                if client.is_configured() {
                    providers.push(Box::new(client));
                } else {
                    tracing::debug!("Skipping openai provider: no API key");
                }
            },
            "perplexity" => {
                let client = PerplexityClient::from_config(config, http);
                if client.is_configured() {
                    providers.push(Box::new(client));
                } else {
                    tracing::debug!("Skipping perplexity provider: no API key");
                }
            },
            other => tracing::warn!(provider = other, "Unknown LLM provider in config"),
        }
    }

    if providers.is_empty() {
        tracing::info!("LLM enabled but no provider is configured; using fallback analysis");
        return None;
    }

    let resilience = LlmResilienceConfig::from_config(config);
    let chain = FallbackLlmProvider::new(
        providers
            .into_iter()
            .map(|provider| {
                Box::new(ResilientLlmProvider::new(provider, resilience.clone()))
                    as Box<dyn LlmProvider>
            })
            .collect(),
    );
    Some(Box::new(chain))
}
