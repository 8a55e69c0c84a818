//! Anthropic API client.
//!
//! This module provides:
//! - Direct Claude Messages API integration
//! - Request validation with size limits
//! - Status-code mapping into typed provider errors
//!
//! The client is the production [`LanguageModel`](crate::traits::LanguageModel)
//! behind the coach. It never retries on its own.

mod client;
mod config;
mod types;

pub use client::{AnthropicClient, MAX_CONTENT_LENGTH};
pub use config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT_MS,
};
pub use types::{ApiMessage, ApiRequest, ApiResponse, ApiUsage, ContentBlock};
