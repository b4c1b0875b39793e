//! Serial link
//!
//! Owns the byte stream to the television. Outbound frames are written as
//! supplied by the caller; inbound data is framed on a single terminator
//! byte (`'x'` for this protocol). The link has no protocol knowledge.
//!
//! Only one read is ever outstanding: [`Link::read_frame`] takes `&mut self`.
//! A read future that is dropped before completing (for example by a
//! timeout) loses no bytes; the partial frame is kept and the next call
//! continues where it stopped.

use super::stream::SerialStream;
use super::LineConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tvctl_core::ConnectionError;

/// Terminator byte that ends every inbound frame
pub const FRAME_TERMINATOR: u8 = b'x';

/// Termination-delimited connection to the television
pub struct Link<S = SerialStream> {
    port: String,
    stream: Option<BufReader<S>>,
    terminator: u8,
    /// Bytes of an inbound frame read so far
    pending: Vec<u8>,
}

impl Link<SerialStream> {
    /// Configure the serial line at `port` and open it for reading and writing
    ///
    /// A configuration failure is logged and ignored; the line may already be
    /// set up correctly. Failing to open the device is fatal.
    pub async fn open(port: &str, config: &LineConfig) -> Result<Self, ConnectionError> {
        let (path, line) = (port.to_string(), config.clone());
        let stream = tokio::task::spawn_blocking(move || SerialStream::open(&path, &line))
            .await
            .map_err(|e| ConnectionError::FailedToOpen {
                port: port.to_string(),
                reason: e.to_string(),
            })??;

        tracing::info!("Opened serial link {}", port);
        Ok(Self::from_stream(port, stream))
    }
}

impl<S> Link<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already open stream
    pub fn from_stream(port: impl Into<String>, stream: S) -> Self {
        Self {
            port: port.into(),
            stream: Some(BufReader::new(stream)),
            terminator: FRAME_TERMINATOR,
            pending: Vec::new(),
        }
    }

    /// Use a different inbound frame terminator
    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    /// Device path or label this link was opened with
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Whether the link is still open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write a complete, already terminated frame and flush it
    pub async fn write_frame(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read the next inbound frame
    ///
    /// Returns the bytes up to, not including, the terminator. The terminator
    /// itself is consumed.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;
        stream.read_until(self.terminator, &mut self.pending).await?;

        if self.pending.last() != Some(&self.terminator) {
            let partial = std::mem::take(&mut self.pending);
            return Err(ConnectionError::ConnectionLost {
                reason: format!(
                    "stream ended with {} unterminated byte(s)",
                    partial.len()
                ),
            });
        }

        self.pending.pop();
        Ok(std::mem::take(&mut self.pending))
    }

    /// Release the stream; later reads and writes fail with `NotConnected`
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Error shutting down {}: {}", self.port, e);
            }
            tracing::info!("Closed serial link {}", self.port);
        }
        self.pending.clear();
    }
}

impl<S> std::fmt::Debug for Link<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("port", &self.port)
            .field("open", &self.stream.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}
