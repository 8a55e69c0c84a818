//! Benchmarks for the provider-free parts of the pipeline.

#![allow(missing_docs, clippy::unwrap_used)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use typing_coach::coach::{PerformanceSnapshot, RequestHints};
use typing_coach::fallback::{analysis_summary, exercise_text, key_drill, practice_text};
use typing_coach::parsing::{extract_candidates, parse_structured, repair};

const CLEAN: &str = r#"{"intent": "generate_exercise", "generated_text": "the quick brown fox jumps over the lazy dog", "reply": "Type this slowly."}"#;
const FENCED: &str = "Sure! Here is your exercise:\n```json\n{\"intent\": \"generate_exercise\", \"generated_text\": \"the quick brown fox jumps over the lazy dog\", \"reply\": \"Type this slowly.\"}\n```\nHave fun!";
const DEFECTIVE: &str = "Response: {'intent': 'generate_exercise', 'generated_text': 'the quick brown fox jumps over the lazy dog', 'reply': 'Type this slowly.',}";

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    group.bench_function("clean", |b| b.iter(|| parse_structured(black_box(CLEAN))));
    group.bench_function("fenced", |b| b.iter(|| parse_structured(black_box(FENCED))));
    group.bench_function("repaired", |b| {
        b.iter(|| parse_structured(black_box(DEFECTIVE)));
    });
    group.bench_function("extract_candidates", |b| {
        b.iter(|| extract_candidates(black_box(FENCED)));
    });
    group.bench_function("repair", |b| b.iter(|| repair(black_box(DEFECTIVE))));
    group.finish();
}

fn bench_fallbacks(c: &mut Criterion) {
    let snapshot = PerformanceSnapshot::new(12, 52.0, 94.5).with_weak_keys(["q", "z", "p"]);
    let hints = RequestHints::from_message("drill my weak keys, 40 words");

    let mut group = c.benchmark_group("fallback");
    group.bench_function("exercise_text_200", |b| b.iter(|| exercise_text(black_box(200))));
    group.bench_function("key_drill_8_keys", |b| {
        let keys = ['a', 's', 'd', 'f', 'j', 'k', 'l', ';'];
        b.iter(|| key_drill(black_box(&keys), black_box(120)));
    });
    group.bench_function("practice_text_weak_keys", |b| {
        b.iter(|| practice_text(black_box(&hints), black_box(&snapshot)));
    });
    group.bench_function("analysis_summary", |b| {
        b.iter(|| analysis_summary(black_box(&snapshot), None));
    });
    group.bench_function("request_hints", |b| {
        b.iter(|| RequestHints::from_message(black_box("drill with a s d, 25 words please")));
    });
    group.finish();
}

criterion_group!(benches, bench_parsing, bench_fallbacks);
criterion_main!(benches);
