//! Loopback device
//!
//! `LoopbackTransport` behaves like a serial adapter with a loopback plug (or
//! with nothing attached, see [`LoopbackTransport::silent`]). Reads never
//! block: with nothing pending they complete immediately with zero bytes,
//! matching drivers that are opened with a short read timeout.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

/// Shared state between the device and its probe
#[derive(Debug, Default)]
struct DeviceState {
    /// Whether writes are fed back to the read side
    echo: bool,
    /// Bytes waiting to be read
    inbound: VecDeque<u8>,
    /// Every successful write call, in order
    writes: Vec<Vec<u8>>,
    /// Number of read calls, including idle ones
    read_calls: usize,
    /// Largest number of bytes a single write accepts
    write_limit: Option<usize>,
    /// Error returned by every write while set
    write_error: Option<io::ErrorKind>,
    /// Error returned by every read while set
    read_error: Option<io::ErrorKind>,
    /// Set once the device has been shut down
    closed: bool,
}

/// Simulated duplex byte stream
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Arc<Mutex<DeviceState>>,
}

/// Inspection handle for a [`LoopbackTransport`]
#[derive(Debug, Clone)]
pub struct LoopbackProbe {
    state: Arc<Mutex<DeviceState>>,
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LoopbackTransport {
    /// Device that echoes every write back to the reader
    pub fn echo() -> (Self, LoopbackProbe) {
        Self::with_echo(true)
    }

    /// Device that only ever returns data injected through the probe
    pub fn silent() -> (Self, LoopbackProbe) {
        Self::with_echo(false)
    }

    fn with_echo(echo: bool) -> (Self, LoopbackProbe) {
        let state = Arc::new(Mutex::new(DeviceState {
            echo,
            ..Default::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            LoopbackProbe { state },
        )
    }
}

impl LoopbackProbe {
    /// Bytes accepted by each write call, in call order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Number of write calls that accepted data
    pub fn write_count(&self) -> usize {
        lock(&self.state).writes.len()
    }

    /// Number of read calls issued against the device
    pub fn read_calls(&self) -> usize {
        lock(&self.state).read_calls
    }

    /// Queue bytes as if the far end had sent them
    pub fn inject(&self, data: &[u8]) {
        lock(&self.state).inbound.extend(data);
    }

    /// Accept at most `limit` bytes per write call
    pub fn set_write_limit(&self, limit: Option<usize>) {
        lock(&self.state).write_limit = limit;
    }

    /// Fail every write with `kind` until cleared
    pub fn set_write_error(&self, kind: Option<io::ErrorKind>) {
        lock(&self.state).write_error = kind;
    }

    /// Fail every read with `kind` until cleared
    pub fn set_read_error(&self, kind: Option<io::ErrorKind>) {
        lock(&self.state).read_error = kind;
    }

    /// Whether the device has been shut down
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

impl AsyncRead for LoopbackTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = lock(&self.state);
        state.read_calls += 1;

        if let Some(kind) = state.read_error {
            return Poll::Ready(Err(io::Error::new(kind, "simulated read failure")));
        }

        let n = buf.remaining().min(state.inbound.len());
        for byte in state.inbound.drain(..n) {
            buf.put_slice(&[byte]);
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for LoopbackTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = lock(&self.state);

        if state.closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device closed",
            )));
        }
        if let Some(kind) = state.write_error {
            return Poll::Ready(Err(io::Error::new(kind, "simulated write failure")));
        }

        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        let accepted = data[..n].to_vec();
        debug!("Loopback accepted {} of {} bytes", n, data.len());

        if state.echo {
            state.inbound.extend(&accepted);
        }
        if n > 0 {
            state.writes.push(accepted);
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        lock(&self.state).closed = true;
        Poll::Ready(Ok(()))
    }
}
