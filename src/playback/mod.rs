pub mod engine;
pub mod gate;
pub mod pacer;

pub use engine::PlaybackEngine;
pub use gate::{decide, GateDecision};
pub use pacer::{Pacer, SyncReference, DEFAULT_MAX_STEP};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::core::LogBounds;
use crate::error::ControlError;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Stopped,
    Initialising,
    Playing,
    Paused,
    Skipping,
    Stopping,
}

impl PlaybackStatus {
    /// Check if a session exists and has not been asked to stop
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused | Self::Skipping)
    }
}

/// Side of the current position a target was on when it was set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDirection {
    /// Target lies ahead of the current position
    Forward,
    /// Target lies at or behind the current position
    Backward,
}

/// A one-shot position to skip to without emitting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub at: DateTime<Utc>,
    pub direction: TargetDirection,
}

impl Target {
    /// Create a target, recording its direction relative to `current`
    pub fn new(at: DateTime<Utc>, current: DateTime<Utc>) -> Self {
        let direction = if current < at {
            TargetDirection::Forward
        } else {
            TargetDirection::Backward
        };
        Self { at, direction }
    }
}

/// Mutable playback position, window, target and speed
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackMarkers {
    pub current: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub target: Option<Target>,
    pub speed: f64, // 1.0 = real-time, 2.0 = 2x speed
    /// Longest log gap paced as recorded, longer gaps are shortened to it
    pub max_gap: Duration,
}

impl PlaybackMarkers {
    /// Markers covering the whole log at real-time speed
    pub fn new(bounds: &LogBounds) -> Self {
        Self {
            current: bounds.start,
            window_start: bounds.start,
            window_end: bounds.end,
            target: None,
            speed: 1.0,
            max_gap: DEFAULT_MAX_STEP,
        }
    }

    /// Set playback speed
    pub fn set_speed(&mut self, speed: f64) -> Result<(), ControlError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ControlError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(())
    }

    /// Set the longest log gap paced as recorded
    pub fn set_max_gap(&mut self, max_gap: Duration) -> Result<(), ControlError> {
        if max_gap.is_zero() {
            return Err(ControlError::InvalidMaxGap(max_gap));
        }
        self.max_gap = max_gap;
        Ok(())
    }

    /// Move the window start, keeping it inside the log and before the end
    pub fn set_window_start(&mut self, ts: DateTime<Utc>, bounds: &LogBounds) -> Result<(), ControlError> {
        check_within(ts, bounds)?;
        if ts >= self.window_end {
            return Err(ControlError::WindowOrder {
                start: ts,
                end: self.window_end,
            });
        }
        self.window_start = ts;
        Ok(())
    }

    /// Move the window end, keeping it inside the log and after the start
    pub fn set_window_end(&mut self, ts: DateTime<Utc>, bounds: &LogBounds) -> Result<(), ControlError> {
        check_within(ts, bounds)?;
        if ts <= self.window_start {
            return Err(ControlError::WindowOrder {
                start: self.window_start,
                end: ts,
            });
        }
        self.window_end = ts;
        Ok(())
    }

    /// Set both window bounds at once, validated as a pair
    pub fn set_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bounds: &LogBounds,
    ) -> Result<(), ControlError> {
        check_within(start, bounds)?;
        check_within(end, bounds)?;
        if start >= end {
            return Err(ControlError::WindowOrder { start, end });
        }
        self.window_start = start;
        self.window_end = end;
        Ok(())
    }

    /// Set or clear the target. Returns the recorded target.
    pub fn set_target(
        &mut self,
        at: Option<DateTime<Utc>>,
        bounds: &LogBounds,
    ) -> Result<Option<Target>, ControlError> {
        let target = match at {
            Some(at) => {
                check_within(at, bounds)?;
                Some(Target::new(at, self.current))
            }
            None => None,
        };
        self.target = target;
        Ok(target)
    }
}

fn check_within(ts: DateTime<Utc>, bounds: &LogBounds) -> Result<(), ControlError> {
    if bounds.contains(ts) {
        Ok(())
    } else {
        Err(ControlError::OutOfBounds {
            value: ts,
            start: bounds.start,
            end: bounds.end,
        })
    }
}

/// Initial settings applied when a session starts
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub speed: f64,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub target: Option<DateTime<Utc>>,
    /// Longest log gap paced as recorded
    pub max_gap: Duration,
    /// Start in the paused state
    pub paused: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            window_start: None,
            window_end: None,
            target: None,
            max_gap: DEFAULT_MAX_STEP,
            paused: false,
        }
    }
}

impl SessionOptions {
    /// Seed markers for a freshly scanned log
    pub fn seed(&self, bounds: &LogBounds) -> Result<PlaybackMarkers, ControlError> {
        let mut markers = PlaybackMarkers::new(bounds);
        markers.set_speed(self.speed)?;
        markers.set_max_gap(self.max_gap)?;
        if self.window_start.is_some() || self.window_end.is_some() {
            markers.set_window(
                self.window_start.unwrap_or(bounds.start),
                self.window_end.unwrap_or(bounds.end),
                bounds,
            )?;
        }
        markers.current = markers.window_start;
        markers.set_target(self.target, bounds)?;
        Ok(markers)
    }
}

/// Full view of a session returned by every control call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub speed: f64,
    pub current: Option<DateTime<Utc>>,
    pub target: Option<DateTime<Utc>>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub bounds: Option<LogBounds>,
    /// Scrubber positions, 0-100 across the log
    pub current_percent: Option<f64>,
    pub window_start_percent: Option<f64>,
    pub window_end_percent: Option<f64>,
    pub source: Option<String>,
    pub sink: Option<String>,
    pub messages_sent: u64,
    pub sink_errors: u64,
    pub last_sink_error: Option<String>,
    pub passes_completed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    fn bounds() -> LogBounds {
        LogBounds::new(at(10, 0, 0), at(10, 10, 0))
    }

    #[test]
    fn test_invalid_speed_is_rejected() {
        let mut markers = PlaybackMarkers::new(&bounds());
        assert_eq!(markers.set_speed(0.0), Err(ControlError::InvalidSpeed(0.0)));
        assert!(markers.set_speed(-2.0).is_err());
        assert!(markers.set_speed(f64::INFINITY).is_err());
        assert_eq!(markers.speed, 1.0);

        markers.set_speed(4.0).unwrap();
        assert_eq!(markers.speed, 4.0);
    }

    #[test]
    fn test_window_order_is_enforced() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);

        markers.set_window_end(at(10, 5, 0), &b).unwrap();
        assert!(matches!(
            markers.set_window_start(at(10, 5, 0), &b),
            Err(ControlError::WindowOrder { .. })
        ));
        assert!(markers.set_window_start(at(10, 6, 0), &b).is_err());
        assert_eq!(markers.window_start, b.start);

        markers.set_window_start(at(10, 2, 0), &b).unwrap();
        assert!(markers.set_window_end(at(10, 1, 0), &b).is_err());
        assert_eq!(markers.window_end, at(10, 5, 0));
    }

    #[test]
    fn test_window_outside_log_is_rejected() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        assert!(matches!(
            markers.set_window_end(at(11, 0, 0), &b),
            Err(ControlError::OutOfBounds { .. })
        ));
        assert!(markers.set_window_start(at(9, 0, 0), &b).is_err());
        assert_eq!(markers, PlaybackMarkers::new(&b));
    }

    #[test]
    fn test_target_direction() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.current = at(10, 5, 0);

        let ahead = markers.set_target(Some(at(10, 6, 0)), &b).unwrap().unwrap();
        assert_eq!(ahead.direction, TargetDirection::Forward);

        let behind = markers.set_target(Some(at(10, 1, 0)), &b).unwrap().unwrap();
        assert_eq!(behind.direction, TargetDirection::Backward);
        assert_eq!(markers.target, Some(behind));

        assert_eq!(markers.set_target(None, &b).unwrap(), None);
        assert_eq!(markers.target, None);
    }

    #[test]
    fn test_options_seed() {
        let b = bounds();
        let options = SessionOptions {
            speed: 2.0,
            window_start: Some(at(10, 1, 0)),
            target: Some(at(10, 3, 0)),
            ..Default::default()
        };
        let markers = options.seed(&b).unwrap();
        assert_eq!(markers.current, at(10, 1, 0));
        assert_eq!(markers.window_end, b.end);
        assert_eq!(markers.target.map(|t| t.direction), Some(TargetDirection::Forward));

        let bad = SessionOptions {
            window_start: Some(at(10, 8, 0)),
            window_end: Some(at(10, 2, 0)),
            ..Default::default()
        };
        assert!(bad.seed(&b).is_err());
    }

    #[test]
    fn test_max_gap_must_be_positive() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        assert_eq!(markers.max_gap, DEFAULT_MAX_STEP);
        assert_eq!(
            markers.set_max_gap(Duration::ZERO),
            Err(ControlError::InvalidMaxGap(Duration::ZERO))
        );

        let options = SessionOptions {
            max_gap: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(options.seed(&b).unwrap().max_gap, Duration::from_secs(2));
    }

    #[test]
    fn test_single_fix_log_seeds() {
        let b = LogBounds::new(at(10, 0, 0), at(10, 0, 0));
        let markers = SessionOptions::default().seed(&b).unwrap();
        assert_eq!(markers.window_start, markers.window_end);
    }
}
