//! Trait definitions for mockable dependencies.
//!
//! This module defines traits for:
//! - [`LanguageModel`]: the text-generation provider behind the coach
//! - [`PerformanceSource`]: the metrics collaborator supplying statistics
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::coach::{ErrorDetail, PerformanceSnapshot};
use crate::error::{ProviderError, ServerError};

/// Language-model provider.
///
/// Implementations make a single attempt and report failures as typed
/// [`ProviderError`]s; retry and fallback policy belong to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate free text for a system and user prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider cannot be reached or
    /// answers with an error.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        (**self).generate(system_prompt, user_prompt).await
    }
}

/// Source of the user's recorded performance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PerformanceSource: Send + Sync {
    /// Current aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if the statistics cannot be read.
    async fn performance_snapshot(&self) -> Result<PerformanceSnapshot, ServerError>;

    /// Error detail of the latest session, if one was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if the detail cannot be read.
    async fn last_session_errors(&self) -> Result<Option<ErrorDetail>, ServerError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_mock_language_model() {
        let mut mock = MockLanguageModel::new();
        mock.expect_generate()
            .with(eq("system"), eq("user"))
            .times(1)
            .returning(|_, _| Ok("{\"intent\":\"chitchat\"}".to_string()));

        let text = mock.generate("system", "user").await.unwrap();
        assert!(text.contains("chitchat"));
    }

    #[tokio::test]
    async fn test_arc_language_model_delegates() {
        let mut mock = MockLanguageModel::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _| Err(ProviderError::AuthenticationFailed));

        let shared = Arc::new(mock);
        let err = shared.generate("s", "u").await.unwrap_err();
        assert_eq!(err, ProviderError::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_mock_performance_source() {
        let mut mock = MockPerformanceSource::new();
        mock.expect_performance_snapshot()
            .returning(|| Ok(PerformanceSnapshot::new(5, 45.0, 92.0)));
        mock.expect_last_session_errors().returning(|| Ok(None));

        let snapshot = mock.performance_snapshot().await.unwrap();
        assert_eq!(snapshot.session_count, 5);
        assert!(mock.last_session_errors().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_performance_source_error() {
        let mut mock = MockPerformanceSource::new();
        mock.expect_performance_snapshot().returning(|| {
            Err(ServerError::Snapshot {
                path: "stats.json".to_string(),
                message: "missing".to_string(),
            })
        });

        let result = mock.performance_snapshot().await;
        assert!(matches!(result, Err(ServerError::Snapshot { .. })));
    }
}
