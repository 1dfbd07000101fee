//! Open-device session
//!
//! A [`Session`] owns everything tied to one open device: the split
//! transport, the receive loop task, the operator's schedule and send options,
//! and the cancellation generation for runs. Dropping it cancels any run and
//! stops the receive loop; [`Session::close`] additionally waits for both and
//! closes the transport.

use std::sync::Arc;

use rig_escape::EscapeScheme;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::cancel::CancelGeneration;
use crate::error::{SessionError, TransmitError, ValidationError};
use crate::receive::{ReceiveCommand, ReceiveLoop, ReceiveStats};
use crate::schedule::{LineEnding, Schedule, ScheduleEntry};
use crate::sink::LogSink;
use crate::transmitter::{RunReport, SharedWriter, Transmitter};
use crate::transport::{Instrumented, Transport};

type RunTask = JoinHandle<Result<RunReport, TransmitError>>;

/// One open device and its send/receive state
pub struct Session<T> {
    device: Arc<str>,
    sink: Arc<dyn LogSink>,
    writer: SharedWriter<WriteHalf<T>>,
    schedule: Schedule,
    scheme: EscapeScheme,
    repeat: bool,
    line_ending: LineEnding,
    cancel: CancelGeneration,
    receive_tx: Option<mpsc::Sender<ReceiveCommand>>,
    receive_task: Option<JoinHandle<ReceiveStats>>,
    run_task: Option<RunTask>,
}

impl<T> Session<T>
where
    T: Transport,
{
    /// Take ownership of an open transport and start receiving from it
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(device: impl Into<Arc<str>>, transport: T, sink: Arc<dyn LogSink>) -> Self {
        let device = device.into();
        let (read_half, write_half): (ReadHalf<T>, WriteHalf<T>) = tokio::io::split(transport);

        let reader = Instrumented::new(read_half, device.clone(), sink.clone());
        let writer = Instrumented::new(write_half, device.clone(), sink.clone());

        let (receive_tx, receive_rx) = mpsc::channel(4);
        let receive_task = tokio::spawn(ReceiveLoop::new(reader, sink.clone()).run(receive_rx));

        info!("Opened session on {}", device);

        Self {
            device,
            sink,
            writer: Arc::new(Mutex::new(writer)),
            schedule: Schedule::new(),
            scheme: EscapeScheme::default(),
            repeat: false,
            line_ending: LineEnding::default(),
            cancel: CancelGeneration::new(),
            receive_tx: Some(receive_tx),
            receive_task: Some(receive_task),
            run_task: None,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn scheme(&self) -> EscapeScheme {
        self.scheme
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Validate and append a schedule entry; returns its index
    pub fn add_action(&mut self, hold: &str, text: &str) -> Result<usize, ValidationError> {
        let entry = ScheduleEntry::parse(hold, text, self.scheme)?;
        self.schedule.push(entry);
        Ok(self.schedule.len() - 1)
    }

    pub fn remove_action(&mut self, index: usize) -> Result<ScheduleEntry, ValidationError> {
        self.schedule.remove(index)
    }

    pub fn clear_schedule(&mut self) {
        self.schedule.clear();
    }

    pub fn set_scheme(&mut self, scheme: EscapeScheme) {
        self.scheme = scheme;
    }

    /// Select the escape scheme by name, leaving it unchanged if unknown
    pub fn select_scheme(&mut self, name: &str) -> Result<EscapeScheme, ValidationError> {
        self.scheme = EscapeScheme::lookup(name)?;
        Ok(self.scheme)
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn set_line_ending(&mut self, line_ending: LineEnding) {
        self.line_ending = line_ending;
    }

    /// Whether a run is still in flight
    pub fn is_sending(&self) -> bool {
        self.run_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Snapshot the schedule and start a run in the background
    ///
    /// Every entry is decoded with the current scheme before anything is
    /// written; a decode failure means the run never starts.
    pub fn start_run(&mut self) -> Result<(), SessionError> {
        if self.is_sending() {
            return Err(SessionError::RunInProgress);
        }

        let snapshot = self.schedule.snapshot(self.scheme)?;
        let transmitter = Transmitter::new(self.writer.clone())
            .repeat(self.repeat)
            .line_ending(self.line_ending);
        let token = self.cancel.token();

        debug!(
            "Starting run on {} with {} actions",
            self.device,
            snapshot.len()
        );
        self.run_task = Some(tokio::spawn(async move {
            transmitter.run(snapshot, token).await
        }));
        Ok(())
    }

    /// Ask the current run (if any) to stop at its next poll
    pub fn cancel_run(&self) {
        self.cancel.cancel();
    }

    /// Wait for the current run to finish; `None` if no run was started
    pub async fn wait_run(&mut self) -> Option<Result<RunReport, SessionError>> {
        let task = self.run_task.take()?;
        Some(match task.await {
            Ok(result) => result.map_err(SessionError::from),
            Err(e) => Err(self.task_failed(e)),
        })
    }

    /// Stop everything and release the device
    ///
    /// The receive loop is stopped and any in-flight run is cancelled; an
    /// in-progress write is allowed to finish. The transport is closed last.
    pub async fn close(mut self) -> Result<(), SessionError> {
        info!("Closing session on {}", self.device);
        self.cancel.cancel();

        if let Some(tx) = self.receive_tx.take() {
            // Loop already gone if this fails
            let _ = tx.send(ReceiveCommand::Shutdown).await;
        }

        let mut first_error = None;
        if let Some(task) = self.receive_task.take() {
            match task.await {
                Ok(stats) => debug!("Receive loop on {} stopped: {:?}", self.device, stats),
                Err(e) => first_error = Some(self.task_failed(e)),
            }
        }

        if let Some(result) = self.wait_run().await {
            match result {
                Ok(report) => debug!("Run on {} ended: {:?}", self.device, report),
                Err(SessionError::Transmit(e)) => debug!("Run on {} had failed: {}", self.device, e),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let closed = self.writer.lock().await.close().await;
        if let Err(e) = closed {
            warn!("Failed to close {}: {}", self.device, e);
            first_error.get_or_insert(SessionError::Io(e));
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Closed {}", self.device);
                Ok(())
            }
        }
    }

    fn task_failed(&self, e: JoinError) -> SessionError {
        SessionError::TaskFailed {
            device: self.device.to_string(),
            message: e.to_string(),
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        // Stops a run left behind; the receive loop sees its sender dropped
        self.cancel.cancel();
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("schedule", &self.schedule)
            .field("scheme", &self.scheme)
            .field("repeat", &self.repeat)
            .field("line_ending", &self.line_ending)
            .finish_non_exhaustive()
    }
}
