use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// First and last timestamp found in a log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LogBounds {
    /// Create bounds, swapping the arguments if they are out of order
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Total log duration
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Check if a timestamp lies within `[start, end]`
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Map a timestamp to a 0-100 scrubber position.
    ///
    /// A log spanning a single instant maps everything to 0.
    pub fn percentage_of(&self, ts: DateTime<Utc>) -> f64 {
        let span = self.duration().num_milliseconds();
        if span <= 0 {
            return 0.0;
        }
        let offset = (ts - self.start).num_milliseconds();
        100.0 * offset as f64 / span as f64
    }

    /// Map a 0-100 scrubber position back to an absolute timestamp
    pub fn at_percentage(&self, percent: f64) -> Result<DateTime<Utc>, ControlError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(ControlError::InvalidPercentage(percent));
        }
        let span = self.duration().num_milliseconds() as f64;
        let offset = (span * percent / 100.0).round() as i64;
        Ok(self.start + Duration::milliseconds(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bounds() -> LogBounds {
        LogBounds::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 10).unwrap(),
        )
    }

    #[test]
    fn test_percentage_mapping() {
        let b = bounds();
        assert_eq!(b.percentage_of(b.start), 0.0);
        assert_eq!(b.percentage_of(b.end), 100.0);
        let mid = b.at_percentage(50.0).unwrap();
        assert_eq!(mid, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 5).unwrap());
        assert_eq!(b.percentage_of(mid), 50.0);
    }

    #[test]
    fn test_percentage_out_of_range() {
        let b = bounds();
        assert_eq!(b.at_percentage(100.5), Err(ControlError::InvalidPercentage(100.5)));
        assert!(b.at_percentage(-1.0).is_err());
        assert!(b.at_percentage(f64::NAN).is_err());
    }

    #[test]
    fn test_single_instant_log() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let b = LogBounds::new(t, t);
        assert_eq!(b.percentage_of(t), 0.0);
        assert!(b.contains(t));
    }

    #[test]
    fn test_new_orders_arguments() {
        let b = bounds();
        assert_eq!(LogBounds::new(b.end, b.start), b);
    }
}
