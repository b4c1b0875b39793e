//! Serial device stream
//!
//! Async adapter over a blocking serial handle. A dedicated reader thread
//! polls the device with a short timeout and hands chunks to the async side
//! through a channel; writes go straight to a second handle on the same
//! device. Dropping a read on the async side leaves nothing outstanding, so
//! a missed ack never holds up the next write.

use super::serial::{
    to_serialport_data_bits, to_serialport_flow_control, to_serialport_parity,
    to_serialport_stop_bits,
};
use super::LineConfig;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tvctl_core::{ConnectionError, LineConfigWarning};

/// Read timeout of the device handle; also how often the reader checks for close
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 256;
const CHANNEL_DEPTH: usize = 32;

enum OpenFailure {
    /// The device itself could not be opened
    Device(io::Error),
    /// The device exists but rejected the line settings
    Line(LineConfigWarning),
}

/// Byte stream to a serial device
pub struct SerialStream {
    writer: Box<dyn Write + Send>,
    incoming: mpsc::Receiver<io::Result<Vec<u8>>>,
    leftover: Vec<u8>,
    stop: Arc<AtomicBool>,
}

impl SerialStream {
    /// Open `port` with the given line settings
    ///
    /// If the device rejects the settings a [`LineConfigWarning`] is logged
    /// and the device is opened as a plain file instead, on the assumption
    /// that the line is already set up. In that mode the reader thread blocks
    /// in `read` and only notices a close once the device next delivers data.
    pub fn open(port: &str, config: &LineConfig) -> Result<Self, ConnectionError> {
        let opened = match open_configured(port, config) {
            Ok(serial) => {
                tracing::debug!("Configured {} as {}", port, config);
                serial
                    .try_clone()
                    .map_err(io::Error::from)
                    .and_then(|reader| Self::spawn(port, reader, Box::new(serial)))
            }
            Err(OpenFailure::Device(e)) => Err(e),
            Err(OpenFailure::Line(warning)) => {
                tracing::warn!("{}", warning);
                std::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(port)
                    .and_then(|file| {
                        let reader = file.try_clone()?;
                        Self::spawn(port, reader, Box::new(file))
                    })
            }
        };

        opened.map_err(|e| ConnectionError::from_open_error(port, &e))
    }

    /// Start the reader thread over `reader`; writes go to `writer`
    pub fn spawn<R>(label: &str, reader: R, writer: Box<dyn Write + Send>) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, incoming) = mpsc::channel(CHANNEL_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));
        let reader_stop = stop.clone();

        std::thread::Builder::new()
            .name(format!("tvctl-read {}", label))
            .spawn(move || read_loop(reader, tx, reader_stop))?;

        Ok(Self {
            writer,
            incoming,
            leftover: Vec::new(),
            stop,
        })
    }
}

fn open_configured(
    port: &str,
    config: &LineConfig,
) -> Result<Box<dyn serialport::SerialPort>, OpenFailure> {
    let warning = |reason: String| {
        OpenFailure::Line(LineConfigWarning {
            port: port.to_string(),
            reason,
        })
    };

    let data_bits = to_serialport_data_bits(config.data_bits)
        .ok_or_else(|| warning(format!("invalid data bits: {}", config.data_bits)))?;
    let stop_bits = to_serialport_stop_bits(config.stop_bits)
        .ok_or_else(|| warning(format!("invalid stop bits: {}", config.stop_bits)))?;

    serialport::new(port, config.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(to_serialport_parity(config.parity))
        .flow_control(to_serialport_flow_control(config.flow_control))
        .timeout(POLL_INTERVAL)
        .open()
        .map_err(|e| match e.kind() {
            serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(_) => {
                OpenFailure::Device(e.into())
            }
            _ => warning(e.to_string()),
        })
}

fn read_loop<R: Read>(mut reader: R, tx: mpsc::Sender<io::Result<Vec<u8>>>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; READ_CHUNK];

    while !stop.load(Ordering::Relaxed) {
        let chunk = match reader.read(&mut buf) {
            // End of stream: dropping the sender reports EOF to the reader side.
            Ok(0) => break,
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => Err(e),
        };

        let failed = chunk.is_err();
        if tx.blocking_send(chunk).is_err() || failed {
            break;
        }
    }

    tracing::trace!("Serial reader thread exiting");
}

impl AsyncRead for SerialStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.leftover.is_empty() {
            match this.incoming.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(Some(Ok(chunk))) => this.leftover = chunk,
            }
        }

        let n = this.leftover.len().min(buf.remaining());
        buf.put_slice(&this.leftover[..n]);
        this.leftover.drain(..n);
        Poll::Ready(Ok(()))
    }
}

// Frames are a handful of bytes, so writes complete within the handle's
// short timeout and are issued inline.
impl AsyncWrite for SerialStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        retry_on_timeout(cx, self.get_mut().writer.write(buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        retry_on_timeout(cx, self.get_mut().writer.flush())
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.stop.store(true, Ordering::Relaxed);
        retry_on_timeout(cx, this.writer.flush())
    }
}

fn retry_on_timeout<T>(cx: &mut Context<'_>, result: io::Result<T>) -> Poll<io::Result<T>> {
    match result {
        Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
        result => Poll::Ready(result),
    }
}

impl Drop for SerialStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("buffered", &self.leftover.len())
            .field("stopped", &self.stop.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Blocking reader fed from a std channel; times out like a serial handle
    struct ScriptedReader(std_mpsc::Receiver<Vec<u8>>);

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv_timeout(POLL_INTERVAL) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => Ok(0),
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedWriter(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_does_not_wait_for_pending_read() {
        let (_device_tx, device_rx) = std_mpsc::channel();
        let written = SharedWriter::default();
        let mut stream =
            SerialStream::spawn("test", ScriptedReader(device_rx), Box::new(written.clone()))
                .unwrap();

        let mut buf = [0u8; 8];
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), stream.read(&mut buf)).await;
        assert!(abandoned.is_err());

        tokio::time::timeout(Duration::from_secs(1), stream.write_all(b"ka 00 01\r"))
            .await
            .expect("write must not wait on the abandoned read")
            .unwrap();
        assert_eq!(written.0.lock().as_slice(), b"ka 00 01\r");
    }

    #[tokio::test]
    async fn test_chunks_are_delivered_in_order() {
        let (device_tx, device_rx) = std_mpsc::channel();
        let mut stream =
            SerialStream::spawn("test", ScriptedReader(device_rx), Box::new(io::sink())).unwrap();

        device_tx.send(b"ka 00 ".to_vec()).unwrap();
        device_tx.send(b"OK01x".to_vec()).unwrap();
        drop(device_tx);

        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"ka 00 OK01x");
    }

    #[test]
    fn test_open_missing_device() {
        assert!(matches!(
            SerialStream::open("/dev/tvctl-does-not-exist", &LineConfig::default()),
            Err(ConnectionError::PortNotFound { .. })
        ));
    }
}
