//! Send/Receive Engine
//!
//! This crate drives one open duplex byte-stream device: it replays an
//! operator-built schedule of timed writes and continuously drains whatever
//! the device sends back.
//!
//! # Architecture
//!
//! - **Transport**: any `AsyncRead + AsyncWrite` stream. A session splits it
//!   so reads and writes never wait on each other.
//! - **Instrumented**: wraps each half and reports every call through
//!   `tracing`; writes are also mirrored to the log sink.
//! - **Transmitter**: runs a snapshot of the schedule with per-action hold
//!   times, line-ending policy, optional repeat and cooperative cancellation.
//! - **ReceiveLoop**: background task forwarding inbound bytes to the sink.
//! - **LogSink**: where `send`/`recv` events end up (tracing, a file, memory,
//!   a channel).
//! - **Session**: owns all of the above for one device.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rig_engine::{Session, TracingSink};
//!
//! # async fn demo(port: tokio::io::DuplexStream) -> Result<(), rig_engine::SessionError> {
//! let mut session = Session::open("/dev/ttyUSB0", port, Arc::new(TracingSink));
//! session.select_scheme("hex")?;
//! session.add_action("0s", "41 54 0d")?;
//! session.add_action("500ms", "41 54 49 0d")?;
//!
//! session.start_run()?;
//! session.wait_run().await;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod error;
pub mod hold;
pub mod receive;
pub mod schedule;
pub mod session;
pub mod sink;
pub mod transmitter;
pub mod transport;

pub use cancel::{CancelGeneration, CancelToken};
pub use error::{SessionError, TransmitError, ValidationError};
pub use hold::parse_hold;
pub use receive::{ReceiveCommand, ReceiveLoop, ReceiveStats, IDLE_BACKOFF};
pub use schedule::{Action, LineEnding, Schedule, ScheduleEntry};
pub use session::Session;
pub use sink::{
    log_file_name, ChannelSink, Direction, FanoutSink, FileSink, LogEvent, LogSink, MemorySink,
    TracingSink,
};
pub use transmitter::{RunOutcome, RunReport, Transmitter, HOLD_POLL_INTERVAL};
pub use transport::{Instrumented, Transport};

pub use rig_escape::{EscapeError, EscapeScheme};
