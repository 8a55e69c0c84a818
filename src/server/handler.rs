//! Turning request lines into response lines.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::types::{CoachRequest, ErrorLine};
use crate::coach::{CoachService, StructuredResponse};
use crate::error::ServerError;
use crate::traits::{LanguageModel, PerformanceSource};

/// Answers decoded requests with a [`CoachService`], filling missing
/// statistics from a [`PerformanceSource`].
pub struct RequestHandler<M> {
    service: CoachService<M>,
    source: Arc<dyn PerformanceSource>,
}

impl<M> std::fmt::Debug for RequestHandler<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler").finish_non_exhaustive()
    }
}

impl<M: LanguageModel> RequestHandler<M> {
    /// Create a handler.
    #[must_use]
    pub fn new(service: CoachService<M>, source: Arc<dyn PerformanceSource>) -> Self {
        Self { service, source }
    }

    /// The coaching service.
    #[must_use]
    pub const fn service(&self) -> &CoachService<M> {
        &self.service
    }

    /// Answer one request.
    ///
    /// A failing performance source is logged and treated as "no
    /// sessions" rather than failing the request.
    pub async fn handle(
        &self,
        request: CoachRequest,
        cancel: &CancellationToken,
    ) -> StructuredResponse {
        let performance = match request.performance {
            Some(performance) => performance,
            None => self
                .source
                .performance_snapshot()
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Performance source failed, assuming no sessions");
                    crate::coach::PerformanceSnapshot::default()
                }),
        };
        let errors = match request.last_session_errors {
            Some(errors) => Some(errors),
            None => self.source.last_session_errors().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Session error source failed");
                None
            }),
        };

        self.service
            .classify_and_respond(
                &request.message,
                &performance,
                &request.history,
                errors.as_ref(),
                cancel,
            )
            .await
    }

    /// Decode `line`, answer it and encode the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] if the line is not a
    /// [`CoachRequest`].
    pub async fn handle_line(
        &self,
        line: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ServerError> {
        let request: CoachRequest =
            serde_json::from_str(line).map_err(|e| ServerError::InvalidRequest {
                message: e.to_string(),
            })?;
        let response = self.handle(request, cancel).await;
        encode(&response)
    }
}

/// Encode a value as one protocol line, without the newline.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if serialization fails.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<String, ServerError> {
    serde_json::to_string(value).map_err(|e| ServerError::Io {
        message: format!("failed to encode response: {e}"),
    })
}

/// The line written for an undecodable request.
#[must_use]
pub fn error_line(error: &ServerError) -> String {
    encode(&ErrorLine::new(error.to_string()))
        .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string())
}
