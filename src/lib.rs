//! Replays recorded NMEA0183/AIS logs over the network with the original
//! timing, scaled by a speed multiplier, with pause, seek and loop windows.

pub mod config;
pub mod core;
pub mod decode;
pub mod error;
pub mod input;
pub mod output;
pub mod playback;

#[cfg(test)]
mod test_support;

pub use crate::core::LogBounds;
pub use error::{ControlError, ReplayError, SinkError, SourceError};
pub use input::{FileLineSource, LineSource, MemoryLineSource};
pub use output::{LineSink, MemorySink, TcpLineSink};
pub use playback::{PlaybackEngine, PlaybackSnapshot, PlaybackStatus, SessionOptions};
