//! Background receive loop
//!
//! Drains the read half of a session's transport and forwards every chunk to
//! the log sink as a `recv` event. Reads return promptly when the device is
//! idle, so the loop backs off for [`IDLE_BACKOFF`] whenever a read comes back
//! empty or fails. Only a shutdown command (or the session dropping its
//! command sender) stops it; read errors never do. The loop does not close
//! the transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::sink::{LogEvent, LogSink};
use crate::transport::Instrumented;

/// Pause after an empty or failed read
pub const IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// Largest chunk requested per read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Commands that can be sent to a running receive loop
#[derive(Debug)]
pub enum ReceiveCommand {
    /// Stop reading and return
    Shutdown,
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Read calls issued
    pub reads: u64,
    /// Bytes forwarded to the sink
    pub bytes: u64,
    /// Reads that failed
    pub errors: u64,
}

/// Receive side of a session
pub struct ReceiveLoop<R> {
    reader: Instrumented<R>,
    sink: Arc<dyn LogSink>,
    buffer: Vec<u8>,
    idle_backoff: Duration,
}

impl<R> ReceiveLoop<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: Instrumented<R>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            reader,
            sink,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            idle_backoff: IDLE_BACKOFF,
        }
    }

    pub fn idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Main read loop - runs until shutdown is requested or the channel closes
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<ReceiveCommand>) -> ReceiveStats {
        let device = self.reader.device().clone();
        let mut stats = ReceiveStats::default();
        info!("Starting read loop on {}", device);

        loop {
            let back_off = tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ReceiveCommand::Shutdown) | None => {
                            info!("Shutdown requested for read loop on {}", device);
                            break;
                        }
                    }
                }

                result = self.reader.read(&mut self.buffer) => {
                    stats.reads += 1;
                    match result {
                        Ok(0) => true,
                        Ok(n) => {
                            stats.bytes += n as u64;
                            self.sink.record(&LogEvent::recv(
                                device.clone(),
                                self.buffer[..n].to_vec(),
                            ));
                            false
                        }
                        Err(e) => {
                            stats.errors += 1;
                            warn!("Read error on {}: {}", device, e);
                            true
                        }
                    }
                }
            };

            if back_off {
                tokio::select! {
                    biased;

                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(ReceiveCommand::Shutdown) | None => {
                                info!("Shutdown requested for read loop on {}", device);
                                break;
                            }
                        }
                    }

                    _ = tokio::time::sleep(self.idle_backoff) => {}
                }
            }
        }

        info!(
            "Read loop ended for {}: {} reads, {} bytes, {} errors",
            device, stats.reads, stats.bytes, stats.errors
        );
        stats
    }
}
