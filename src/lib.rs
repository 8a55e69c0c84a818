//! Typing Coach
//!
//! The "intelligence" layer of a typing tutor: forwards user messages to
//! the Anthropic Claude API and returns a machine-checkable structured
//! result, falling back to deterministic content whenever the provider is
//! unavailable or answers in an unusable shape.
//!
//! # Features
//!
//! - Intent classification: chit-chat, session analysis, exercise generation
//! - Consecutive-failure breaker with cooldown in front of the provider
//! - Bounded retry of formatting failures with a corrective instruction
//! - Multi-strategy payload extraction and syntactic repair
//! - Deterministic practice text, key drills and progress summaries
//!
//! # Quick Start
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-ant-xxx ./typing-coach
//! {"message": "drill with a s d, 5 words"}
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  JSON lines   ┌─────────────────┐
//! │ Typing app  │──────────────▶│  CoachService   │──────▶ Anthropic API
//! │             │◀──────────────│     (Rust)      │
//! └─────────────┘  JSON lines   └────────┬────────┘
//!                                        │ unavailable / unusable
//!                                        ▼
//!                                 fallback generators
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod anthropic;
pub mod coach;
pub mod config;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod parsing;
pub mod prompts;
pub mod resilience;
pub mod server;
pub mod traits;
