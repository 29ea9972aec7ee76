//! Playback clock
//!
//! Waits are computed against a reference pair of (log time, wall clock)
//! rather than from measured gaps between lines, so processing overhead and
//! time spent paused or skipping never compound into drift.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Default for the largest log-time step paced per timestamped message.
/// Longer gaps in the recording, such as a logger restart, are replayed as
/// this step.
pub const DEFAULT_MAX_STEP: Duration = Duration::from_secs(60);

/// Waits shorter than this are not scheduled
pub const MIN_WAIT: Duration = Duration::from_millis(50);

/// Falling further behind schedule than this re-anchors on the wall clock
/// instead of bursting to catch up
pub const MAX_LAG: Duration = Duration::from_secs(1);

/// Upper limit for one scaled step, reached only at extreme slow-motion speeds
const MAX_STEP_WAIT: Duration = Duration::from_secs(3600);

/// Log time paired with the wall-clock instant it is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReference {
    pub ts: DateTime<Utc>,
    pub wall: Instant,
}

/// Converts log-time progress into wall-clock waits
#[derive(Debug)]
pub struct Pacer {
    reference: Option<SyncReference>,
    max_step: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::with_max_step(DEFAULT_MAX_STEP)
    }
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pacer replaying log gaps longer than `max_step` as `max_step`
    pub fn with_max_step(max_step: Duration) -> Self {
        Self {
            reference: None,
            max_step,
        }
    }

    pub fn set_max_step(&mut self, max_step: Duration) {
        self.max_step = max_step;
    }

    /// Current reference point, `None` until the first timestamp of a pass
    pub fn reference(&self) -> Option<SyncReference> {
        self.reference
    }

    /// Drop the reference; the next timestamped message anchors a new one
    pub fn reset(&mut self) {
        self.reference = None;
    }

    /// Anchor the reference at `ts`, due now
    pub fn resync(&mut self, ts: DateTime<Utc>, now: Instant) {
        self.reference = Some(SyncReference { ts, wall: now });
    }

    /// Time to hold a message stamped `ts` before emitting it.
    ///
    /// The reference moves to the message's due instant, not to `now`, so
    /// untimestamped messages in between leave it untouched and late
    /// emissions are made up on the next message.
    pub fn compute_wait(&mut self, ts: DateTime<Utc>, speed: f64, now: Instant) -> Duration {
        let Some(reference) = self.reference else {
            self.resync(ts, now);
            return Duration::ZERO;
        };

        let delta_log = (ts - reference.ts)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(self.max_step);
        let scaled = scale(delta_log, speed);

        let mut due = reference.wall.checked_add(scaled).unwrap_or(now);
        if now.saturating_duration_since(due) > MAX_LAG {
            due = now;
        }

        self.reference = Some(SyncReference { ts, wall: due });
        due.saturating_duration_since(now)
    }
}

/// Whether a wait is long enough to be worth a timer
pub fn should_wait(wait: Duration) -> bool {
    wait >= MIN_WAIT
}

/// Log-time duration converted to wall-clock time at `speed`
pub fn scale(delta: Duration, speed: f64) -> Duration {
    if !speed.is_finite() || speed <= 0.0 {
        return delta;
    }
    Duration::try_from_secs_f64(delta.as_secs_f64() / speed)
        .unwrap_or(MAX_STEP_WAIT)
        .min(MAX_STEP_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use chrono::Duration as LogDuration;

    #[test]
    fn test_first_timestamp_anchors() {
        let mut pacer = Pacer::new();
        let now = Instant::now();
        assert_eq!(pacer.compute_wait(at(10, 0, 0), 1.0, now), Duration::ZERO);
        assert_eq!(pacer.reference(), Some(SyncReference { ts: at(10, 0, 0), wall: now }));
    }

    #[test]
    fn test_wait_scales_with_speed() {
        let mut pacer = Pacer::new();
        let now = Instant::now();
        pacer.resync(at(10, 0, 0), now);
        assert_eq!(pacer.compute_wait(at(10, 0, 1), 2.0, now), Duration::from_millis(500));

        let mut pacer = Pacer::new();
        pacer.resync(at(10, 0, 0), now);
        assert_eq!(pacer.compute_wait(at(10, 0, 1), 0.5, now), Duration::from_secs(2));
    }

    #[test]
    fn test_elapsed_wall_time_is_subtracted() {
        let mut pacer = Pacer::new();
        let start = Instant::now();
        pacer.resync(at(10, 0, 0), start);

        let wait = pacer.compute_wait(at(10, 0, 1), 1.0, start + Duration::from_millis(300));
        assert_eq!(wait, Duration::from_millis(700));

        // Due at +2000 ms regardless of when the previous one went out
        let wait = pacer.compute_wait(at(10, 0, 2), 1.0, start + Duration::from_millis(1500));
        assert_eq!(wait, Duration::from_millis(500));

        let wait = pacer.compute_wait(at(10, 0, 3), 1.0, start + Duration::from_millis(3200));
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn test_large_gaps_are_capped() {
        let now = Instant::now();
        let mut pacer = Pacer::new();
        pacer.resync(at(10, 0, 0), now);
        assert_eq!(pacer.compute_wait(at(10, 0, 5), 1.0, now), Duration::from_secs(5));

        let mut pacer = Pacer::new();
        pacer.resync(at(10, 0, 0), now);
        assert_eq!(pacer.compute_wait(at(10, 30, 0), 1.0, now), DEFAULT_MAX_STEP);

        let mut pacer = Pacer::with_max_step(Duration::from_secs(1));
        pacer.resync(at(10, 0, 0), now);
        assert_eq!(pacer.compute_wait(at(10, 30, 0), 4.0, now), Duration::from_millis(250));
    }

    #[test]
    fn test_no_drift_over_many_steps() {
        let mut pacer = Pacer::new();
        let start = Instant::now();
        pacer.resync(at(10, 0, 0), start);

        // Ten 100 ms steps, each emitted 7 ms late
        let mut now = start;
        for i in 1..=10 {
            let ts = at(10, 0, 0) + LogDuration::milliseconds(100 * i);
            let wait = pacer.compute_wait(ts, 1.0, now);
            now += wait + Duration::from_millis(7);
        }
        let reference = pacer.reference().unwrap();
        assert_eq!(reference.wall, start + Duration::from_secs(1));
    }

    #[test]
    fn test_backwards_timestamp_does_not_wait() {
        let mut pacer = Pacer::new();
        let now = Instant::now();
        pacer.resync(at(10, 0, 5), now);
        assert_eq!(pacer.compute_wait(at(10, 0, 0), 1.0, now), Duration::ZERO);
        assert_eq!(pacer.reference().map(|r| r.ts), Some(at(10, 0, 0)));
    }

    #[test]
    fn test_far_behind_reanchors() {
        let mut pacer = Pacer::new();
        let start = Instant::now();
        pacer.resync(at(10, 0, 0), start);

        let late = start + Duration::from_secs(10);
        assert_eq!(pacer.compute_wait(at(10, 0, 1), 1.0, late), Duration::ZERO);
        assert_eq!(pacer.reference().map(|r| r.wall), Some(late));
        // The next step is paced from the re-anchored point, no burst
        assert_eq!(pacer.compute_wait(at(10, 0, 2), 1.0, late), Duration::from_secs(1));
    }

    #[test]
    fn test_short_waits_are_not_scheduled() {
        assert!(!should_wait(Duration::from_millis(49)));
        assert!(should_wait(MIN_WAIT));
    }
}
