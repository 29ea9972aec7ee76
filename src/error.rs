use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::playback::PlaybackStatus;

/// Errors raised by a line source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("log file {0} does not exist")]
    NotFound(PathBuf),

    #[error("log file {path} is not readable: {source}")]
    NotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read from {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by a transport sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("not connected to {0}")]
    NotConnected(String),

    #[error("write to {addr} failed: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("sink {0} is closed")]
    Closed(String),
}

/// Fatal errors for a replay session
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{0} contains no timestamped sentences, playback cannot be paced")]
    NoTimestamps(String),

    #[error("playback is already running")]
    AlreadyRunning,

    #[error("playback was stopped while the log was being scanned")]
    Cancelled,

    #[error("invalid session options: {0}")]
    Options(#[from] ControlError),
}

/// Rejected control requests. The session state is left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("playback is not running")]
    NotRunning,

    #[error("speed must be a positive number, got {0}")]
    InvalidSpeed(f64),

    #[error("{value} lies outside the log ({start} .. {end})")]
    OutOfBounds {
        value: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("window start {start} must be before window end {end}")]
    WindowOrder {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("maximum paced gap must be positive, got {0:?}")]
    InvalidMaxGap(std::time::Duration),

    #[error("cannot switch playback to {0:?}")]
    InvalidStatus(PlaybackStatus),

    #[error("percentage must be within 0..=100, got {0}")]
    InvalidPercentage(f64),
}
