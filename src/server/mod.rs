//! Stdio serving surface.
//!
//! This module provides:
//! - [`CoachRequest`]: one newline-delimited JSON request
//! - [`RequestHandler`]: decodes a line, fills missing statistics from a
//!   [`PerformanceSource`](crate::traits::PerformanceSource), answers it
//! - [`StdioTransport`]: the read-answer-write loop over stdin/stdout
//! - [`CoachServer`]: builds all of the above from a [`Config`](crate::config::Config)
//!
//! # Example
//!
//! ```no_run
//! use typing_coach::config::Config;
//! use typing_coach::server::CoachServer;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = CoachServer::new(Config::from_env()?);
//! server.run_stdio(&CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod handler;
mod runner;
mod source;
mod transport;
mod types;

pub use handler::{encode, error_line, RequestHandler};
pub use runner::CoachServer;
pub use source::{SnapshotFileSource, StaticPerformanceSource};
pub use transport::{StdioTransport, TransportConfig};
pub use types::{CoachRequest, ErrorLine};
