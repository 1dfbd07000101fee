//! Timed send scheduler
//!
//! A run walks a snapshot of compiled actions in order. For each action it
//! writes the payload (after line-ending adjustments) and then holds until
//! `hold` has elapsed since the action started, polling its cancellation token
//! at least every [`HOLD_POLL_INTERVAL`]. With repeat enabled the snapshot is
//! replayed until cancelled.
//!
//! ```text
//! Idle ──run()──▶ Sending ──all passes done──▶ Idle
//!                    │
//!                    └──token cancelled──▶ Cancelled ──▶ Idle
//! ```

use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::TransmitError;
use crate::schedule::{Action, LineEnding};
use crate::transport::Instrumented;

/// Longest stretch a hold sleeps without checking for cancellation
pub const HOLD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Completed passes between forced yields when repeating
pub const PASSES_PER_YIELD: u64 = 1000;

/// Length of the forced yield
pub const PASS_YIELD: Duration = Duration::from_millis(1);

/// Write half shared between successive runs and session close
pub type SharedWriter<W> = Arc<Mutex<Instrumented<W>>>;

/// How a run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every pass finished (single pass, or empty schedule)
    Completed,
    /// The token was cancelled mid-run
    Cancelled,
}

/// Summary of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Fully completed passes over the snapshot
    pub passes: u64,
    /// Write calls that accepted data
    pub writes: u64,
    /// Total bytes accepted by the device
    pub bytes: u64,
}

impl RunReport {
    fn new() -> Self {
        Self {
            outcome: RunOutcome::Completed,
            passes: 0,
            writes: 0,
            bytes: 0,
        }
    }
}

/// Executes schedule snapshots against a device
pub struct Transmitter<W> {
    writer: SharedWriter<W>,
    repeat: bool,
    line_ending: LineEnding,
    poll_interval: Duration,
}

impl<W> Transmitter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Single pass, default line endings
    pub fn new(writer: SharedWriter<W>) -> Self {
        Self {
            writer,
            repeat: false,
            line_ending: LineEnding::default(),
            poll_interval: HOLD_POLL_INTERVAL,
        }
    }

    pub fn repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Poll more often than [`HOLD_POLL_INTERVAL`]; longer values are capped
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.clamp(Duration::from_millis(1), HOLD_POLL_INTERVAL);
        self
    }

    /// Execute `actions` until done, cancelled, or a write fails outright
    pub async fn run(
        &self,
        actions: Arc<[Action]>,
        token: CancelToken,
    ) -> Result<RunReport, TransmitError> {
        let device = self.writer.lock().await.device().clone();
        let mut report = RunReport::new();

        if actions.is_empty() {
            debug!("Nothing scheduled for {}", device);
            return Ok(report);
        }

        info!(
            "Starting send of {} actions to {} (repeat: {})",
            actions.len(),
            device,
            self.repeat
        );

        loop {
            for (index, action) in actions.iter().enumerate() {
                let deadline = Instant::now() + action.hold;
                let payload = self.line_ending.apply(&action.payload);

                self.write_action(&payload, index, &device, &mut report)
                    .await?;

                if !self.hold_until(deadline, &token).await {
                    info!(
                        "Send to {} cancelled during action {} after {} passes",
                        device, index, report.passes
                    );
                    report.outcome = RunOutcome::Cancelled;
                    return Ok(report);
                }
            }

            report.passes += 1;
            if !self.repeat {
                break;
            }
            if token.is_cancelled() {
                info!("Send to {} cancelled after {} passes", device, report.passes);
                report.outcome = RunOutcome::Cancelled;
                return Ok(report);
            }
            if report.passes % PASSES_PER_YIELD == 0 {
                tokio::time::sleep(PASS_YIELD).await;
            }
        }

        info!(
            "Send to {} complete: {} writes, {} bytes",
            device, report.writes, report.bytes
        );
        Ok(report)
    }

    /// Write one payload, retrying short writes
    ///
    /// Fails only when the device took nothing before erroring; an error after
    /// a partial write is logged and the run carries on.
    async fn write_action(
        &self,
        payload: &[u8],
        index: usize,
        device: &Arc<str>,
        report: &mut RunReport,
    ) -> Result<(), TransmitError> {
        let mut writer = self.writer.lock().await;
        let mut offset = 0;

        while offset < payload.len() {
            let result = writer.write(&payload[offset..]).await.and_then(|n| {
                if n == 0 {
                    Err(io::Error::from(ErrorKind::WriteZero))
                } else {
                    Ok(n)
                }
            });

            match result {
                Ok(n) => {
                    offset += n;
                    report.writes += 1;
                    report.bytes += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if offset == 0 => {
                    warn!("Error writing to port {}: {}", device, e);
                    return Err(TransmitError::Write {
                        device: device.to_string(),
                        action: index,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "Short write to {}: {} of {} bytes of action {}: {}",
                        device,
                        offset,
                        payload.len(),
                        index,
                        e
                    );
                    break;
                }
            }
        }

        if offset > 0 {
            if let Err(e) = writer.flush().await {
                warn!("Flush failed on {}: {}", device, e);
            }
        }
        Ok(())
    }

    /// Sleep until `deadline` in bounded slices; false if cancelled first
    async fn hold_until(&self, deadline: Instant, token: &CancelToken) -> bool {
        loop {
            if token.is_cancelled() {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return true;
            }
            tokio::time::sleep(left.min(self.poll_interval)).await;
        }
    }
}
