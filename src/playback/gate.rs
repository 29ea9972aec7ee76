//! Per-line emit/suppress decision
//!
//! The predicates here are pure. `decide` applies their outcome to the
//! markers and returns the status the session should move to.

use chrono::{DateTime, Utc};

use crate::core::LogBounds;
use crate::playback::{PlaybackMarkers, PlaybackStatus, Target, TargetDirection};

/// Outcome of the gate for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub emit: bool,
    /// Re-anchor the pacer before pacing this line
    pub resync: bool,
    /// Status after this line, `Playing` or `Skipping`
    pub status: PlaybackStatus,
}

/// Check if `current` has reached or crossed the target from its recorded side
pub fn target_reached(target: &Target, current: DateTime<Utc>) -> bool {
    match target.direction {
        TargetDirection::Forward => current >= target.at,
        TargetDirection::Backward => current <= target.at,
    }
}

/// Check if `current` lies strictly inside the window.
///
/// A bound sitting on the log's own edge does not clip, so an unrestricted
/// window replays the first and last timestamped sentences too.
pub fn within_window(markers: &PlaybackMarkers, bounds: &LogBounds) -> bool {
    let after_start = markers.window_start <= bounds.start || markers.current > markers.window_start;
    let before_end = markers.window_end >= bounds.end || markers.current < markers.window_end;
    after_start && before_end
}

/// Decide whether a line goes out.
///
/// A timestamp always advances `current`, even for suppressed lines. A
/// reached target is cleared. Leaving `Skipping` for `Playing` requests a
/// resync so the first emitted line is not paced against stale time.
pub fn decide(
    timestamp: Option<DateTime<Utc>>,
    markers: &mut PlaybackMarkers,
    bounds: &LogBounds,
    status: PlaybackStatus,
) -> GateDecision {
    if let Some(ts) = timestamp {
        markers.current = ts;
    }

    let seeking = match markers.target {
        Some(target) if target_reached(&target, markers.current) => {
            markers.target = None;
            false
        }
        Some(_) => true,
        None => false,
    };

    if seeking || !within_window(markers, bounds) {
        return GateDecision {
            emit: false,
            resync: false,
            status: PlaybackStatus::Skipping,
        };
    }

    GateDecision {
        emit: true,
        resync: status == PlaybackStatus::Skipping,
        status: PlaybackStatus::Playing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    fn bounds() -> LogBounds {
        LogBounds::new(at(10, 0, 0), at(10, 0, 10))
    }

    fn run(markers: &mut PlaybackMarkers, stamps: &[Option<DateTime<Utc>>]) -> Vec<GateDecision> {
        let b = bounds();
        let mut status = PlaybackStatus::Playing;
        stamps
            .iter()
            .map(|ts| {
                let decision = decide(*ts, markers, &b, status);
                status = decision.status;
                decision
            })
            .collect()
    }

    #[test]
    fn test_unrestricted_window_emits_everything() {
        let mut markers = PlaybackMarkers::new(&bounds());
        let stamps: Vec<_> = (0..=10).map(|s| Some(at(10, 0, s))).collect();
        let decisions = run(&mut markers, &stamps);
        assert!(decisions.iter().all(|d| d.emit && !d.resync));
        assert_eq!(markers.current, at(10, 0, 10));
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.set_window(at(10, 0, 3), at(10, 0, 7), &b).unwrap();

        let stamps: Vec<_> = (0..=10).map(|s| Some(at(10, 0, s))).collect();
        let emitted: Vec<u32> = run(&mut markers, &stamps)
            .iter()
            .zip(0u32..)
            .filter(|(d, _)| d.emit)
            .map(|(_, s)| s)
            .collect();
        assert_eq!(emitted, vec![4, 5, 6]);
    }

    #[test]
    fn test_window_entry_requests_resync() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.set_window_start(at(10, 0, 2), &b).unwrap();

        let decisions = run(&mut markers, &[Some(at(10, 0, 1)), None, Some(at(10, 0, 3)), None]);
        assert_eq!(decisions[0].status, PlaybackStatus::Skipping);
        assert!(!decisions[1].emit);
        assert!(decisions[2].emit && decisions[2].resync);
        assert_eq!(decisions[2].status, PlaybackStatus::Playing);
        // Untimestamped line inside the window follows its predecessor
        assert!(decisions[3].emit && !decisions[3].resync);
    }

    #[test]
    fn test_forward_target_suppresses_until_reached() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.set_target(Some(at(10, 0, 7)), &b).unwrap();

        let decisions = run(
            &mut markers,
            &[Some(at(10, 0, 1)), None, Some(at(10, 0, 6)), Some(at(10, 0, 7)), None],
        );
        assert!(decisions[..3].iter().all(|d| !d.emit));
        assert!(decisions[3].emit && decisions[3].resync);
        assert!(decisions[4].emit);
        assert_eq!(markers.target, None);
    }

    #[test]
    fn test_target_crossed_between_timestamps() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.set_target(Some(at(10, 0, 4)), &b).unwrap();

        let decisions = run(&mut markers, &[Some(at(10, 0, 3)), Some(at(10, 0, 5))]);
        assert!(!decisions[0].emit);
        assert!(decisions[1].emit);
    }

    #[test]
    fn test_backward_target() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.current = at(10, 0, 8);
        markers.set_target(Some(at(10, 0, 2)), &b).unwrap();

        let decisions = run(&mut markers, &[None, Some(at(10, 0, 9)), Some(at(10, 0, 1))]);
        assert!(!decisions[0].emit);
        assert!(!decisions[1].emit);
        assert!(decisions[2].emit);
        assert_eq!(markers.target, None);
    }

    #[test]
    fn test_target_then_window() {
        let b = bounds();
        let mut markers = PlaybackMarkers::new(&b);
        markers.set_window_end(at(10, 0, 5), &b).unwrap();
        markers.set_target(Some(at(10, 0, 2)), &b).unwrap();

        let decisions = run(&mut markers, &[Some(at(10, 0, 1)), Some(at(10, 0, 2)), Some(at(10, 0, 5))]);
        assert!(!decisions[0].emit);
        assert!(decisions[1].emit);
        // Reaching the target does not override the window
        assert!(!decisions[2].emit);
        assert_eq!(decisions[2].status, PlaybackStatus::Skipping);
    }

    #[test]
    fn test_current_never_decreases_over_ordered_log() {
        let mut markers = PlaybackMarkers::new(&bounds());
        let stamps = [Some(at(10, 0, 0)), None, Some(at(10, 0, 2)), None, None, Some(at(10, 0, 2)), Some(at(10, 0, 9))];
        let b = bounds();
        let mut last = markers.current;
        for ts in stamps {
            decide(ts, &mut markers, &b, PlaybackStatus::Playing);
            assert!(markers.current >= last);
            last = markers.current;
        }
    }
}
