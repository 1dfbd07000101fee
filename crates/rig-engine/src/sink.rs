//! Traffic log events and the sinks that consume them
//!
//! Every byte written to or read from a device becomes a [`LogEvent`]. Sinks
//! decide what happens to it: render it through `tracing`, persist it one
//! line per event, keep it in memory, or hand it to a UI thread.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Local};
use tracing::{info, warn};

/// Which way the bytes travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to device
    Send,
    /// Device to host
    Recv,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Send => "send",
            Direction::Recv => "recv",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One send or receive occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub direction: Direction,
    pub device: Arc<str>,
    pub timestamp: DateTime<Local>,
    pub payload: Vec<u8>,
}

impl LogEvent {
    pub fn new(direction: Direction, device: Arc<str>, payload: Vec<u8>) -> Self {
        Self {
            direction,
            device,
            timestamp: Local::now(),
            payload,
        }
    }

    pub fn send(device: Arc<str>, payload: Vec<u8>) -> Self {
        Self::new(Direction::Send, device, payload)
    }

    pub fn recv(device: Arc<str>, payload: Vec<u8>) -> Self {
        Self::new(Direction::Recv, device, payload)
    }

    /// Payload as text, with invalid UTF-8 replaced
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Consumer of traffic events
///
/// `record` is called from the transmitter and receive tasks, so it must be
/// cheap and must not block for long.
pub trait LogSink: Send + Sync {
    fn record(&self, event: &LogEvent);
}

/// Renders events as `info` tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, event: &LogEvent) {
        info!(
            "{} {} {} bytes: {:?}",
            event.direction,
            event.device,
            event.payload.len(),
            event.payload_text()
        );
    }
}

/// Persists one `key=value` line per event
///
/// ```text
/// time=2026-03-01T10:15:02.513+01:00 level=INFO msg=recv dev=/dev/ttyUSB0 data="OK\r\n"
/// ```
///
/// Lines are handed to a dedicated writer thread, so recording from an async
/// task never touches the file. The thread writes and flushes each line as it
/// arrives. Dropping the sink drains the queue and closes the file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    tx: Option<Sender<WriterCommand>>,
    worker: Option<JoinHandle<()>>,
}

#[derive(Debug)]
enum WriterCommand {
    Line(String),
    Flush(SyncSender<()>),
}

impl FileSink {
    /// Create (or truncate) the log file at `path`
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("sendrig-log".to_string())
            .spawn({
                let path = path.clone();
                move || write_lines(&path, BufWriter::new(file), rx)
            })?;
        Ok(Self {
            path,
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until every line recorded so far is on disk
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        let queued = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send(WriterCommand::Flush(ack_tx)).is_ok());
        if queued {
            let _ = ack_rx.recv();
        }
    }

    /// Format an event as a single log line, without the trailing newline
    pub fn format_line(event: &LogEvent) -> String {
        format!(
            "time={} level=INFO msg={} dev={} data={:?}",
            event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
            event.direction,
            quote_if_needed(&event.device),
            event.payload_text()
        )
    }
}

fn write_lines(path: &Path, mut writer: BufWriter<File>, rx: Receiver<WriterCommand>) {
    for command in rx {
        match command {
            WriterCommand::Line(line) => {
                if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
                    warn!("Failed to write log line to {}: {}", path.display(), e);
                }
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

impl LogSink for FileSink {
    fn record(&self, event: &LogEvent) {
        let Some(tx) = &self.tx else { return };
        if tx.send(WriterCommand::Line(Self::format_line(event))).is_err() {
            warn!("Log writer for {} has stopped", self.path.display());
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop once the queue is drained
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn quote_if_needed(value: &str) -> Cow<'_, str> {
    if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '"' || c == '=') {
        Cow::Owned(format!("{:?}", value))
    } else {
        Cow::Borrowed(value)
    }
}

/// Default log file location for a device
///
/// `<dir>/<device base name>-MM-DDTHH:MM:SS.log`, using `sendrig` when the
/// device name has no usable base name.
pub fn log_file_name(dir: &Path, device: &str, now: DateTime<Local>) -> PathBuf {
    let base = Path::new(device)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("sendrig");
    dir.join(format!("{}{}", base, now.format("-%m-%dT%H:%M:%S.log")))
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of every event recorded so far
    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Events recorded so far in one direction
    pub fn events_in(&self, direction: Direction) -> Vec<LogEvent> {
        self.lock()
            .iter()
            .filter(|e| e.direction == direction)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn record(&self, event: &LogEvent) {
        self.lock().push(event.clone());
    }
}

/// Forwards events to another thread over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<LogEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<LogEvent>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn record(&self, event: &LogEvent) {
        // Receiver gone means nobody is watching any more
        let _ = self.tx.send(event.clone());
    }
}

/// Delivers each event to several sinks, in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl LogSink for FanoutSink {
    fn record(&self, event: &LogEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::mpsc;

    fn device() -> Arc<str> {
        Arc::from("/dev/ttyUSB0")
    }

    #[test]
    fn test_format_line() {
        let mut event = LogEvent::recv(device(), b"OK\r\n".to_vec());
        event.timestamp = Local.with_ymd_and_hms(2026, 3, 1, 10, 15, 2).unwrap();

        let line = FileSink::format_line(&event);
        assert!(line.starts_with("time=2026-03-01T10:15:02.000"));
        assert!(line.ends_with(r#" level=INFO msg=recv dev=/dev/ttyUSB0 data="OK\r\n""#));
    }

    #[test]
    fn test_format_line_quotes_odd_device_names() {
        let event = LogEvent::send(Arc::from("USB Serial"), b"x".to_vec());
        assert!(FileSink::format_line(&event).contains(r#"dev="USB Serial""#));
    }

    #[test]
    fn test_file_sink_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::create(dir.path().join("traffic.log")).unwrap();

        sink.record(&LogEvent::send(device(), b"ping\n".to_vec()));
        sink.record(&LogEvent::recv(device(), b"pong".to_vec()));
        sink.flush();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#"msg=send dev=/dev/ttyUSB0 data="ping\n""#));
        assert!(lines[1].contains(r#"msg=recv dev=/dev/ttyUSB0 data="pong""#));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_file_sink_drop_drains_queued_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let sink = FileSink::create(&path).unwrap();

        // Recorded from inside the runtime; the writes happen on the log thread
        for i in 0..100 {
            sink.record(&LogEvent::send(device(), format!("line {i}\n").into_bytes()));
        }
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 100);
        assert!(lines[0].ends_with(r#"data="line 0\n""#), "{}", lines[0]);
        assert!(lines[99].ends_with(r#"data="line 99\n""#), "{}", lines[99]);
    }

    #[test]
    fn test_file_sink_flush_is_visible_to_readers() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::create(dir.path().join("traffic.log")).unwrap();

        sink.record(&LogEvent::send(device(), b"a".to_vec()));
        sink.flush();
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap().lines().count(), 1);

        sink.record(&LogEvent::recv(device(), b"b".to_vec()));
        sink.flush();
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_log_file_name() {
        let now = Local.with_ymd_and_hms(2026, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(
            log_file_name(Path::new("/home/op"), "/dev/ttyACM0", now),
            PathBuf::from("/home/op/ttyACM0-01-02T15:04:05.log")
        );
        assert_eq!(
            log_file_name(Path::new("/tmp"), "", now),
            PathBuf::from("/tmp/sendrig-01-02T15:04:05.log")
        );
    }

    #[test]
    fn test_memory_and_fanout_sinks() {
        let memory = Arc::new(MemorySink::new());
        let (tx, rx) = mpsc::channel();
        let fanout = FanoutSink::new()
            .with(memory.clone())
            .with(Arc::new(ChannelSink::new(tx)));

        fanout.record(&LogEvent::send(device(), b"a".to_vec()));
        fanout.record(&LogEvent::recv(device(), b"b".to_vec()));

        assert_eq!(memory.events().len(), 2);
        assert_eq!(memory.events_in(Direction::Recv)[0].payload, b"b");
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelSink::new(tx).record(&LogEvent::send(device(), Vec::new()));
    }
}
