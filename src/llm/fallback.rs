//! Ordered provider chain.

use super::LlmProvider;
use crate::{Error, Result};

/// Tries each provider in order and returns the first success.
///
/// When every provider fails the error names each provider and its cause.
pub struct FallbackLlmProvider {
    providers: Vec<Box<dyn LlmProvider>>,
}

impl FallbackLlmProvider {
    /// Creates a chain from providers in priority order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Number of providers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true when the chain has no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn run<F>(&self, mut call: F) -> Result<String>
    where
        F: FnMut(&dyn LlmProvider) -> Result<String>,
    {
        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match call(provider.as_ref()) {
                Ok(text) => return Ok(text),
                Err(err) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %err,
                        "LLM provider failed, trying next"
                    );
                    failures.push(format!("{}: {err}", provider.name()));
                },
            }
        }

        if failures.is_empty() {
            return Err(Error::operation("llm_fallback", "no providers configured"));
        }
        Err(Error::operation("llm_fallback", failures.join("; ")))
    }
}

impl LlmProvider for FallbackLlmProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.run(|provider| provider.complete(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.run(|provider| provider.complete_with_system(system, user))
    }
}
