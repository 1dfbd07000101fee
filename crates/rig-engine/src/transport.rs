//! Transport seam and call-level instrumentation
//!
//! A transport is any duplex byte stream: a `tokio_serial::SerialStream`, a
//! `tokio::io::DuplexStream`, or a simulated device. The engine splits it into
//! read and write halves so the receive loop and the transmitter never wait on
//! each other.
//!
//! Reads are expected to come back promptly. Drivers opened with a short
//! timeout report "nothing yet" either as `Ok(0)` or as `TimedOut` /
//! `WouldBlock`; [`Instrumented::read`] folds both into `Ok(0)`.

use std::io::{self, ErrorKind};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::sink::{LogEvent, LogSink};

/// A duplex byte stream the engine can drive
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Wraps one half of a transport and reports every call
///
/// Each read and write emits a `debug` event with the requested size before
/// the call and an `info` event with the transferred size and content after
/// it. Writes are also mirrored to the log sink as `send` events.
pub struct Instrumented<T> {
    inner: T,
    device: Arc<str>,
    sink: Arc<dyn LogSink>,
}

impl<T> Instrumented<T> {
    pub fn new(inner: T, device: Arc<str>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            inner,
            device,
            sink,
        }
    }

    pub fn device(&self) -> &Arc<str> {
        &self.device
    }
}

impl<T> Instrumented<T>
where
    T: AsyncRead + Unpin,
{
    /// Read whatever is available, `Ok(0)` when nothing is pending
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        debug!("prep read {} on {}", buf.len(), self.device);

        let n = match self.inner.read(buf).await {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => 0,
            Err(e) => {
                debug!("read on {} failed: {}", self.device, e);
                return Err(e);
            }
        };

        info!(
            "read {} from {}: {:?}",
            n,
            self.device,
            String::from_utf8_lossy(&buf[..n])
        );
        Ok(n)
    }
}

impl<T> Instrumented<T>
where
    T: AsyncWrite + Unpin,
{
    /// Single write call; may accept fewer bytes than offered
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        debug!("prep write {} on {}", data.len(), self.device);

        let result = self.inner.write(data).await;
        let n = *result.as_ref().unwrap_or(&0);

        info!(
            "wrote {} to {}: {:?}",
            n,
            self.device,
            String::from_utf8_lossy(&data[..n])
        );
        if n > 0 {
            self.sink
                .record(&LogEvent::send(self.device.clone(), data[..n].to_vec()));
        }
        result
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    /// Release the underlying device
    ///
    /// Delegates to the transport's shutdown, which is a successful no-op for
    /// transports that have nothing to close.
    pub async fn close(&mut self) -> io::Result<()> {
        debug!("closing {}", self.device);
        self.inner.shutdown().await
    }
}

impl<T> std::fmt::Debug for Instrumented<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented")
            .field("device", &self.device)
            .field("inner", &"<transport>")
            .field("sink", &"<sink>")
            .finish()
    }
}
