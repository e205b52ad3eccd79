//! LLM client integration tests.
//!
//! Exercise provider configuration, the resilience and fallback layers, and
//! narrative generation on a ranked report. No API keys or network access
//! are needed: remote calls go to an unroutable local port.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use launchgap::config::LlmConfig;
use launchgap::llm::{
    BreakerState, FallbackLlmProvider, LlmProvider, LlmResilienceConfig, OpenAiClient,
    PerplexityClient, ResilientLlmProvider, build_provider,
};
use launchgap::models::AnalysisSource;
use launchgap::services::{
    FALLBACK_ANALYSIS, LlmNarrativeGenerator, NarrativeError, NarrativeGenerator, RankingSummary,
};
use launchgap::{
    Engine, Error, FixedClock, FlatType, MemoryTransactionStore, Town, TransactionRecord,
    YearMonth,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

const ANALYST_REPLY: &str = "Bishan stands out: three decades since its last major launch \
                             and a steady stream of four-room resales.";

/// Provider whose replies are scripted per call.
struct MockProvider {
    name: &'static str,
    replies: Mutex<Vec<Result<String, Error>>>,
    calls: Arc<AtomicU32>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    fn new(name: &'static str, replies: Vec<Result<String, Error>>) -> Self {
        Self {
            name,
            replies: Mutex::new(replies.into_iter().rev().collect()),
            calls: Arc::new(AtomicU32::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn always_failing(name: &'static str, cause: &str, times: usize) -> Self {
        Self::new(
            name,
            (0..times)
                .map(|_| Err(Error::operation(format!("{name}_request"), cause)))
                .collect(),
        )
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn complete(&self, prompt: &str) -> launchgap::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(Error::operation("mock", "script exhausted")))
    }
}

fn resilience(threshold: u32, retries: u32) -> LlmResilienceConfig {
    LlmResilienceConfig {
        max_retries: retries,
        retry_backoff_ms: 0,
        breaker_failure_threshold: threshold,
        breaker_reset_timeout_ms: 60_000,
        breaker_half_open_max_calls: 1,
    }
}

// ============================================================================
// Provider Configuration Tests
// ============================================================================

mod provider_config {
    use super::*;

    #[test]
    fn test_openai_client_builder() {
        let client = OpenAiClient::new()
            .with_api_key("sk-proj-test-key-for-testing-only1234567890")
            .with_endpoint("https://test.openai.com/v1")
            .with_model("gpt-4o-mini");

        assert_eq!(client.name(), "openai");
        assert!(client.is_configured());
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.endpoint(), "https://test.openai.com/v1");
    }

    #[test]
    fn test_perplexity_client_builder() {
        let client = PerplexityClient::new()
            .with_api_key("pplx-test-key")
            .with_model("sonar");

        assert_eq!(client.name(), "perplexity");
        assert!(client.is_configured());
        assert_eq!(client.model(), "sonar");
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let client = OpenAiClient::new().with_api_key("   ");
        assert!(!client.is_configured());
        let err = client.complete("hello").unwrap_err();
        assert!(err.to_string().contains("API key not configured"));
    }

    #[test]
    fn test_disabled_llm_builds_no_provider() {
        let config = LlmConfig::default();
        assert!(!config.enabled);
        assert!(build_provider(&config).is_none());
    }

    #[test]
    fn test_unknown_providers_build_nothing() {
        let config = LlmConfig {
            enabled: true,
            providers: vec!["carrier-pigeon".to_string()],
            ..LlmConfig::default()
        };
        assert!(build_provider(&config).is_none());
    }

    #[test]
    fn test_unreachable_endpoint_reports_failure() {
        let client = OpenAiClient::new()
            .with_api_key("sk-test")
            .with_endpoint("http://127.0.0.1:9");

        let err = client
            .complete_with_system("You are terse.", "Say hi.")
            .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "openai_request"));
    }
}

// ============================================================================
// Resilience Tests
// ============================================================================

mod resilience_layer {
    use super::*;

    #[test]
    fn test_success_passes_through() {
        let mock = MockProvider::new("mock", vec![Ok("fine".to_string())]);
        let calls = Arc::clone(&mock.calls);
        let provider = ResilientLlmProvider::new(mock, resilience(3, 0));

        assert_eq!(provider.complete("hi").unwrap(), "fine");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.breaker_state(), BreakerState::Closed);
    }

    #[test]
    fn test_breaker_opens_and_short_circuits() {
        let mock = MockProvider::always_failing("mock", "HTTP 500", 10);
        let calls = Arc::clone(&mock.calls);
        let provider = ResilientLlmProvider::new(mock, resilience(2, 0));

        assert!(provider.complete("one").is_err());
        assert!(provider.complete("two").is_err());
        assert_eq!(provider.breaker_state(), BreakerState::Open);

        let err = provider.complete("three").unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeouts_are_retried() {
        let mock = MockProvider::new(
            "mock",
            vec![
                Err(Error::operation("mock_request", "operation timed out")),
                Ok("second try".to_string()),
            ],
        );
        let calls = Arc::clone(&mock.calls);
        let provider = ResilientLlmProvider::new(mock, resilience(5, 1));

        assert_eq!(provider.complete("hi").unwrap(), "second try");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mock = MockProvider::always_failing("mock", "API returned status: 401", 5);
        let calls = Arc::clone(&mock.calls);
        let provider = ResilientLlmProvider::new(mock, resilience(5, 3));

        assert!(provider.complete("hi").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// Fallback Chain Tests
// ============================================================================

mod fallback_chain {
    use super::*;

    #[test]
    fn test_second_provider_answers() {
        let primary = MockProvider::always_failing("primary", "HTTP 503", 1);
        let secondary = MockProvider::new("secondary", vec![Ok("from backup".to_string())]);
        let primary_calls = Arc::clone(&primary.calls);

        let providers: Vec<Box<dyn LlmProvider>> = vec![Box::new(primary), Box::new(secondary)];
        let chain = FallbackLlmProvider::new(providers);

        assert_eq!(chain.complete("hi").unwrap(), "from backup");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_failures_are_reported() {
        let providers: Vec<Box<dyn LlmProvider>> = vec![
            Box::new(MockProvider::always_failing("primary", "HTTP 503", 1)),
            Box::new(MockProvider::always_failing("secondary", "HTTP 429", 1)),
        ];
        let chain = FallbackLlmProvider::new(providers);

        let message = chain.complete("hi").unwrap_err().to_string();
        assert!(message.contains("primary"));
        assert!(message.contains("secondary"));
    }

    #[test]
    fn test_open_breaker_falls_through_to_next() {
        let flaky = ResilientLlmProvider::new(
            MockProvider::always_failing("primary", "HTTP 500", 10),
            resilience(1, 0),
        );
        let steady = MockProvider::new(
            "secondary",
            vec![Ok("a".to_string()), Ok("b".to_string())],
        );
        let providers: Vec<Box<dyn LlmProvider>> = vec![Box::new(flaky), Box::new(steady)];
        let chain = FallbackLlmProvider::new(providers);

        assert_eq!(chain.complete("one").unwrap(), "a");
        assert_eq!(chain.complete("two").unwrap(), "b");
    }
}

// ============================================================================
// Narrative Tests
// ============================================================================

mod narrative {
    use super::*;

    fn record(town: Town, lease: i32) -> TransactionRecord {
        TransactionRecord {
            town,
            flat_type: FlatType::FourRoom,
            floor_area_sqm: 92.0,
            storey: 8,
            lease_commence_year: lease,
            resale_price: 610_000.0,
            transaction_date: YearMonth { year: 2024, month: 5 },
        }
    }

    fn engine_with(provider: MockProvider) -> Engine {
        let store = MemoryTransactionStore::with_records(vec![
            record(Town::Bishan, 1992),
            record(Town::Bishan, 1995),
            record(Town::Sengkang, 2016),
        ])
        .unwrap();
        Engine::builder(Arc::new(store))
            .clock(Arc::new(FixedClock(YearMonth { year: 2025, month: 6 })))
            .narrative(Arc::new(LlmNarrativeGenerator::new(provider)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_generated_narrative_is_attached() {
        let provider = MockProvider::new("mock", vec![Ok(ANALYST_REPLY.to_string())]);
        let prompts = Arc::clone(&provider.prompts);
        let engine = engine_with(provider);

        let report = engine.recommend(2).await.unwrap();
        assert_eq!(report.analysis_source, AnalysisSource::Generated);
        assert_eq!(report.analysis.as_deref(), Some(ANALYST_REPLY));

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Singapore HDB"));
        assert!(prompts[0].contains("1. BISHAN"));
    }

    #[tokio::test]
    async fn test_provider_failure_uses_fallback_text() {
        let engine = engine_with(MockProvider::always_failing("mock", "HTTP 500", 1));

        let report = engine.recommend(2).await.unwrap();
        assert_eq!(report.analysis_source, AnalysisSource::Fallback);
        assert_eq!(report.analysis.as_deref(), Some(FALLBACK_ANALYSIS));
        assert_eq!(report.entries[0].town, Town::Bishan);
    }

    #[tokio::test]
    async fn test_structured_reply_is_rejected() {
        let engine = engine_with(MockProvider::new(
            "mock",
            vec![Ok(r#"{"towns": ["BISHAN", "SENGKANG"], "note": "json, not prose"}"#.to_string())],
        ));

        let report = engine.recommend(2).await.unwrap();
        assert_eq!(report.analysis_source, AnalysisSource::Fallback);
    }

    #[test]
    fn test_generator_maps_errors() {
        let summary = RankingSummary {
            as_of: YearMonth { year: 2025, month: 6 },
            summary: "Ranked 0 of 0 candidate towns".to_string(),
            towns: Vec::new(),
        };

        let down = LlmNarrativeGenerator::new(MockProvider::always_failing("mock", "HTTP 502", 1));
        assert!(matches!(
            down.generate(&summary),
            Err(NarrativeError::Unavailable(_))
        ));

        let terse = LlmNarrativeGenerator::new(MockProvider::new("mock", vec![Ok("ok".to_string())]));
        let err = terse.generate(&summary).unwrap_err();
        assert_eq!(err.reason(), "malformed");
    }
}
