//! Property tests of the pipeline's output guarantees.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use typing_coach::coach::{CoachService, CoachSettings, Intent, PerformanceSnapshot};
use typing_coach::error::ProviderError;
use typing_coach::fallback::uses_only_keys;
use typing_coach::traits::LanguageModel;

/// Replies with fixed text, or fails, on every call.
struct ScriptedModel {
    reply: Option<String>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.reply.clone().ok_or_else(|| ProviderError::Network {
            message: "connection refused".to_string(),
        })
    }
}

fn settings() -> CoachSettings {
    CoachSettings {
        failure_threshold: 3,
        cooldown: Duration::from_secs(300),
        request_timeout: Duration::from_secs(1),
        max_format_retries: 1,
        retry_backoff: Duration::ZERO,
    }
}

fn respond(reply: Option<String>, message: &str) -> typing_coach::coach::StructuredResponse {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let coach = CoachService::new(ScriptedModel { reply }, settings());
    runtime.block_on(coach.classify_and_respond(
        message,
        &PerformanceSnapshot::new(4, 38.0, 88.0).with_weak_keys(["f", "j"]),
        &[],
        None,
        &CancellationToken::new(),
    ))
}

fn provider_text() -> impl Strategy<Value = Option<String>> {
    let intent = prop_oneof![
        Just("chitchat"),
        Just("analyze_session"),
        Just("generate_exercise"),
        Just("unknown"),
    ];
    let text = prop_oneof![
        Just("null".to_string()),
        Just("\"\"".to_string()),
        "[a-z ]{0,80}".prop_map(|t| format!("\"{t}\"")),
    ];
    let reply = prop_oneof![Just(String::new()), "[A-Za-z ]{1,40}"];
    let payload = (intent, text, reply).prop_map(|(intent, text, reply)| {
        format!(r#"{{"intent": "{intent}", "generated_text": {text}, "reply": "{reply}"}}"#)
    });
    prop_oneof![
        Just(None),
        "[ -~]{0,60}".prop_map(Some),
        payload.clone().prop_map(Some),
        payload.prop_map(|p| Some(format!("Here you go:\n```json\n{p}\n```"))),
    ]
}

fn message() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("hello".to_string()),
        Just("how am I doing?".to_string()),
        Just("drill my weak keys".to_string()),
        (1usize..=120).prop_map(|n| format!("give me a {n} word passage")),
        (1usize..=40).prop_map(|n| format!("drill with a s d, {n} words")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_intent_invariant_always_holds(reply in provider_text(), message in message()) {
        let response = respond(reply, &message);
        prop_assert!(response.satisfies_invariant(), "{response:?}");
    }

    #[test]
    fn prop_requested_word_count_within_tolerance(
        reply in provider_text(),
        words in 1usize..=120,
    ) {
        let response = respond(reply, &format!("give me a {words} word passage"));
        if response.intent == Intent::GenerateExercise {
            let actual = response.generated_text.unwrap().split_whitespace().count();
            let tolerance = words.div_ceil(20).max(1);
            prop_assert!(actual.abs_diff(words) <= tolerance, "{actual} words for {words}");
        }
    }

    #[test]
    fn prop_drills_use_only_requested_keys(reply in provider_text(), words in 1usize..=40) {
        let response = respond(reply, &format!("drill with a s d, {words} words"));
        if response.intent == Intent::GenerateExercise {
            let text = response.generated_text.unwrap();
            prop_assert!(uses_only_keys(&text, &['a', 's', 'd']), "{text:?}");
        }
    }
}
