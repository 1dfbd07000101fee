//! Error types for the send/receive engine

use std::io;

use rig_escape::EscapeError;
use thiserror::Error;

/// Operator input rejected before it reaches the transmitter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Hold duration could not be parsed
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    /// Hold duration parsed but is below zero
    #[error("duration must be positive: {0:?}")]
    NegativeDuration(String),

    /// Payload text or scheme name rejected by the escape layer
    #[error(transparent)]
    Escape(#[from] EscapeError),

    /// Schedule entry referenced by index does not exist
    #[error("no schedule entry at index {index} (schedule has {len})")]
    NoSuchEntry { index: usize, len: usize },
}

/// Failures that end a transmitter run early
#[derive(Debug, Error)]
pub enum TransmitError {
    /// Device accepted nothing and reported an error
    #[error("error writing action {action} to {device}: {source}")]
    Write {
        /// Device name
        device: String,
        /// Index of the action within the schedule
        action: usize,
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced by a [`Session`](crate::Session)
#[derive(Debug, Error)]
pub enum SessionError {
    /// A run is already in flight on this session
    #[error("a send is already in progress")]
    RunInProgress,

    /// Input rejected at validation time
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The run stopped on a write failure
    #[error(transparent)]
    Transmit(#[from] TransmitError),

    /// A background task panicked or was aborted
    #[error("background task for {device} failed: {message}")]
    TaskFailed { device: String, message: String },

    /// Closing the transport failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
