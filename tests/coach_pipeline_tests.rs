//! End-to-end tests of the coaching pipeline against a mocked Anthropic API.
//!
//! These tests verify:
//! - Breaker behaviour across consecutive provider failures
//! - Fallback content while the provider is unavailable
//! - Format retries and payload extraction through the real client
//! - The stdio protocol loop

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines
)]

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use typing_coach::anthropic::{AnthropicClient, ClientConfig};
use typing_coach::coach::{
    CoachService, CoachSettings, ErrorDetail, Intent, KeyMismatch, PerformanceSnapshot,
    StructuredResponse,
};
use typing_coach::config::{Config, SecretString};
use typing_coach::fallback::{uses_only_keys, DegradedReason};
use typing_coach::resilience::CircuitState;
use typing_coach::server::{CoachServer, StdioTransport};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Utilities
// ============================================================================

fn settings() -> CoachSettings {
    CoachSettings {
        failure_threshold: 3,
        cooldown: Duration::from_secs(300),
        request_timeout: Duration::from_secs(5),
        max_format_retries: 2,
        retry_backoff: Duration::from_millis(1),
    }
}

fn service(server: &MockServer) -> CoachService<AnthropicClient> {
    service_with(server, settings())
}

fn service_with(server: &MockServer, settings: CoachSettings) -> CoachService<AnthropicClient> {
    let config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_timeout_ms(10_000);
    let client = AnthropicClient::new("test-api-key", config).unwrap();
    CoachService::new(client, settings)
}

fn message_body(text: &str) -> Value {
    json!({
        "id": "msg_123",
        "content": [{"type": "text", "text": text}],
        "model": "claude-3",
        "usage": {"input_tokens": 10, "output_tokens": 20},
        "stop_reason": "end_turn"
    })
}

fn ok_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(message_body(text))
}

fn snapshot() -> PerformanceSnapshot {
    PerformanceSnapshot::new(5, 45.0, 92.0)
}

async fn ask(coach: &CoachService<AnthropicClient>, message: &str) -> StructuredResponse {
    coach
        .classify_and_respond(message, &snapshot(), &[], None, &CancellationToken::new())
        .await
}

// ============================================================================
// Breaker
// ============================================================================

#[tokio::test]
async fn test_three_failures_open_breaker_and_stop_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(3)
        .mount(&server)
        .await;
    let coach = service(&server);

    for _ in 0..3 {
        let response = ask(&coach, "hello").await;
        assert!(response.satisfies_invariant());
        assert!(response
            .reply
            .starts_with(DegradedReason::ProviderFailed.notice()));
    }
    assert_eq!(coach.tracker().state(), CircuitState::Open);

    for _ in 0..2 {
        let response = ask(&coach, "hello").await;
        assert!(response
            .reply
            .starts_with(DegradedReason::ProviderUnavailable.notice()));
    }

    let stats = coach.tracker().stats();
    assert_eq!(stats.total_failures, 3);
    assert_eq!(stats.trips, 1);
    // `.expect(3)` is verified when the server drops.
}

#[tokio::test]
async fn test_success_resets_consecutive_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok_text(
            r#"{"intent": "chitchat", "generated_text": null, "reply": "Welcome back!"}"#,
        ))
        .mount(&server)
        .await;
    let coach = service(&server);

    ask(&coach, "hi").await;
    ask(&coach, "hi").await;
    assert_eq!(coach.tracker().stats().consecutive_failures, 2);

    let response = ask(&coach, "hi").await;
    assert_eq!(response.reply, "Welcome back!");
    assert_eq!(coach.tracker().stats().consecutive_failures, 0);
    assert_eq!(coach.tracker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_timeout_counts_as_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_text("{}").set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    let coach = service_with(
        &server,
        CoachSettings {
            request_timeout: Duration::from_millis(50),
            ..settings()
        },
    );

    let response = ask(&coach, "give me a 10 word passage").await;

    assert_eq!(response.intent, Intent::GenerateExercise);
    assert_eq!(
        response.generated_text.unwrap().split_whitespace().count(),
        10
    );
    assert_eq!(coach.tracker().stats().consecutive_failures, 1);
}

// ============================================================================
// Fallback scenarios
// ============================================================================

async fn unavailable_coach(server: &MockServer) -> CoachService<AnthropicClient> {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(3)
        .mount(server)
        .await;
    let coach = service(server);
    for _ in 0..3 {
        ask(&coach, "hello").await;
    }
    assert_eq!(coach.tracker().state(), CircuitState::Open);
    coach
}

#[tokio::test]
async fn test_drill_request_while_unavailable() {
    let server = MockServer::start().await;
    let coach = unavailable_coach(&server).await;

    let response = ask(&coach, "drill with a s d, 5 words").await;

    assert_eq!(response.intent, Intent::GenerateExercise);
    let text = response.generated_text.as_deref().unwrap();
    assert!(uses_only_keys(text, &['a', 's', 'd']), "unexpected keys in {text:?}");
    assert_eq!(text.split_whitespace().count(), 5);
    assert!(response
        .reply
        .starts_with(DegradedReason::ProviderUnavailable.notice()));
    assert!(response.reply.contains("a, s, d"));
}

#[tokio::test]
async fn test_progress_question_while_unavailable() {
    let server = MockServer::start().await;
    let coach = unavailable_coach(&server).await;
    let mut errors = ErrorDetail::default();
    for position in 0..4 {
        errors.record(KeyMismatch {
            position,
            expected: 'q',
            typed: 'w',
            timestamp_ms: 1_000 + position as u64,
        });
    }

    let response = coach
        .classify_and_respond(
            "how am I doing?",
            &snapshot(),
            &[],
            Some(&errors),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(response.intent, Intent::AnalyzeSession);
    assert!(response.generated_text.is_none());
    assert!(response.reply.contains("Sessions completed: 5"));
    assert!(response.reply.contains("45 WPM"));
    assert!(response.reply.contains("92%"));
    assert!(response.reply.contains("q (4)"));
    assert!(response.reply.contains("Recommendation:"));
}

// ============================================================================
// Format handling through the real client
// ============================================================================

#[tokio::test]
async fn test_fenced_payload_with_prose() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_text(
            "Sure! Here you go:\n```json\n{'intent': 'generate_exercise', 'generated_text': 'the quick brown fox jumps over the lazy dog', 'reply': 'Type this one slowly.',}\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;
    let coach = service(&server);

    let response = ask(&coach, "give me a practice sentence").await;

    assert_eq!(
        response,
        StructuredResponse::exercise(
            "the quick brown fox jumps over the lazy dog",
            "Type this one slowly."
        )
    );
}

#[tokio::test]
async fn test_format_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_text("I think you're doing great, keep it up!"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok_text(
            r#"{"intent": "analyze_session", "generated_text": null, "reply": "You average 45 WPM. Try a short drill on your weak keys."}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let coach = service(&server);

    let response = ask(&coach, "how am I doing?").await;

    assert_eq!(response.intent, Intent::AnalyzeSession);
    assert_eq!(
        response.reply,
        "You average 45 WPM. Try a short drill on your weak keys."
    );
    let requests = server.received_requests().await.unwrap();
    let retry: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(retry.to_string().contains("Correction"));
    assert_eq!(coach.tracker().stats().consecutive_failures, 0);
}

#[tokio::test]
async fn test_persistent_garbage_uses_fallback_without_tripping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_text("lorem ipsum"))
        .expect(3)
        .mount(&server)
        .await;
    let coach = service(&server);

    let response = ask(&coach, "hello").await;

    assert_eq!(response.intent, Intent::Chitchat);
    assert!(response
        .reply
        .starts_with(DegradedReason::InvalidOutput.notice()));
    assert_eq!(coach.tracker().state(), CircuitState::Closed);
    let summary = coach.metrics().summary();
    assert_eq!(summary.fallbacks_by_reason.get("invalid_output"), Some(&1));
}

// ============================================================================
// Stdio protocol
// ============================================================================

#[tokio::test]
async fn test_protocol_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_text(
            r#"{"intent": "chitchat", "generated_text": null, "reply": "Hi! Ready to type?"}"#,
        ))
        .mount(&server)
        .await;
    let config = Config {
        api_key: SecretString::new("test-api-key"),
        model: "claude-3".to_string(),
        base_url: server.uri(),
        log_level: "info".to_string(),
        request_timeout_ms: 5_000,
        failure_threshold: 3,
        cooldown_secs: 300,
        max_format_retries: 2,
        retry_backoff_ms: 1,
        snapshot_path: None,
    };
    let handler = CoachServer::new(config).handler().unwrap();

    let input = "{\"message\": \"hi\"}\nnot json\n{\"message\": \"hello\", \"performance\": {\"sessions\": 2}}\n";
    let mut output = Vec::new();
    let answered = StdioTransport::new()
        .serve_io(&handler, input.as_bytes(), &mut output, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answered, 3);
    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines[0],
        json!({"intent": "chitchat", "generated_text": null, "reply": "Hi! Ready to type?"})
    );
    assert!(lines[1]["error"].is_string());
    assert_eq!(lines[2]["intent"], "chitchat");
}
