//! Transport layer for the coach server.
//!
//! Newline-delimited JSON over stdin/stdout: one [`CoachRequest`] per input
//! line, one response object per output line.
//!
//! [`CoachRequest`]: super::CoachRequest

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::handler::{error_line, RequestHandler};
use crate::error::ServerError;
use crate::traits::LanguageModel;

/// Configuration for transport options.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum request line size in bytes.
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024, // 1MB
        }
    }
}

/// Stdio transport handler.
#[derive(Debug)]
pub struct StdioTransport {
    config: TransportConfig,
}

impl StdioTransport {
    /// Creates a new stdio transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Creates a new stdio transport with custom configuration.
    #[must_use]
    pub const fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Serve requests from stdin until it closes or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if stdin or stdout fails.
    pub async fn serve<M: LanguageModel>(
        &self,
        handler: &RequestHandler<M>,
        cancel: &CancellationToken,
    ) -> Result<u64, ServerError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve_io(handler, stdin, stdout, cancel).await
    }

    /// Serve requests from `reader`, writing responses to `writer`.
    ///
    /// Requests are answered one at a time, in order. Returns the number of
    /// lines answered, error lines included.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if reading or writing fails.
    pub async fn serve_io<M, R, W>(
        &self,
        handler: &RequestHandler<M>,
        reader: R,
        mut writer: W,
        cancel: &CancellationToken,
    ) -> Result<u64, ServerError>
    where
        M: LanguageModel,
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = reader;
        let mut buf = Vec::new();
        let mut answered = 0u64;
        let max = self.config.max_message_size;

        loop {
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!(answered, "Shutdown requested, closing transport");
                    break;
                }
                read = read_bounded_line(&mut reader, &mut buf, max) => read.map_err(io_error)?,
            };

            let output = match read {
                LineRead::Eof => {
                    tracing::info!(answered, "Input closed");
                    break;
                }
                LineRead::TooLarge => {
                    tracing::warn!(max, "Request line too large");
                    error_line(&ServerError::InvalidRequest {
                        message: format!("request exceeds {max} bytes"),
                    })
                }
                LineRead::Line => match std::str::from_utf8(&buf).map(str::trim) {
                    Err(_) => {
                        tracing::warn!("Request line is not valid UTF-8");
                        error_line(&ServerError::InvalidRequest {
                            message: "request is not valid UTF-8".to_string(),
                        })
                    }
                    Ok("") => continue,
                    Ok(line) => match handler.handle_line(line, cancel).await {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!(error = %e, "Rejected request line");
                            error_line(&e)
                        }
                    },
                },
            };

            write_line(&mut writer, &output).await?;
            answered += 1;
        }

        Ok(answered)
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of reading one request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRead {
    /// Input closed before any byte of a new line.
    Eof,
    /// A line within the limit is in the buffer, newline stripped.
    Line,
    /// The line exceeded the limit and was skipped.
    TooLarge,
}

/// Read one line into `buf`, holding at most `max` bytes of it.
///
/// The rest of an oversized line is consumed and dropped chunk by chunk.
async fn read_bounded_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut seen = false;
    let mut too_large = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (seen, too_large) {
                (false, _) => LineRead::Eof,
                (true, true) => LineRead::TooLarge,
                (true, false) => LineRead::Line,
            });
        }
        seen = true;

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        if !too_large {
            if buf.len() + chunk.len() > max {
                too_large = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }
        let used = chunk.len() + usize::from(newline.is_some());
        reader.consume(used);

        if newline.is_some() {
            return Ok(if too_large {
                LineRead::TooLarge
            } else {
                LineRead::Line
            });
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), ServerError> {
    writer.write_all(line.as_bytes()).await.map_err(io_error)?;
    writer.write_all(b"\n").await.map_err(io_error)?;
    writer.flush().await.map_err(io_error)
}

fn io_error(e: std::io::Error) -> ServerError {
    ServerError::Io {
        message: e.to_string(),
    }
}
