//! Server orchestration.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::handler::RequestHandler;
use super::source::{SnapshotFileSource, StaticPerformanceSource};
use super::transport::StdioTransport;
use crate::anthropic::{AnthropicClient, ClientConfig};
use crate::coach::CoachService;
use crate::config::Config;
use crate::error::AppError;
use crate::traits::PerformanceSource;

/// Wires configuration, provider client, coach and transport together.
#[derive(Debug)]
pub struct CoachServer {
    config: Config,
}

impl CoachServer {
    /// Creates a new server with the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The performance source selected by the configuration.
    #[must_use]
    pub fn performance_source(&self) -> Arc<dyn PerformanceSource> {
        match &self.config.snapshot_path {
            Some(path) => Arc::new(SnapshotFileSource::new(path)),
            None => Arc::new(StaticPerformanceSource::default()),
        }
    }

    /// Build the provider client and the request handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the Anthropic client cannot be created.
    pub fn handler(&self) -> Result<RequestHandler<AnthropicClient>, AppError> {
        let client_config = ClientConfig::default()
            .with_base_url(&self.config.base_url)
            .with_model(&self.config.model)
            .with_timeout_ms(self.config.request_timeout_ms);
        let client = AnthropicClient::new(self.config.api_key.expose(), client_config)?;
        let service = CoachService::new(client, self.config.coach_settings());
        Ok(RequestHandler::new(service, self.performance_source()))
    }

    /// Runs the server using stdio transport until stdin closes or
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or stdio fails.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run_stdio(&self, cancel: &CancellationToken) -> Result<(), AppError> {
        let handler = self.handler()?;
        let answered = StdioTransport::new().serve(&handler, cancel).await?;

        let summary = handler.service().metrics().summary();
        tracing::info!(
            answered,
            provider_rate = summary.provider_rate,
            fallbacks = summary.fallbacks_by_reason.values().sum::<u64>(),
            "Transport closed"
        );
        Ok(())
    }
}
