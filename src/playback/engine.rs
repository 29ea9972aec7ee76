use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::core::{is_valid_sentence, LogBounds};
use crate::decode::extract_timestamp;
use crate::error::{ControlError, ReplayError};
use crate::input::{scan_range, LineSource};
use crate::output::LineSink;
use crate::playback::gate;
use crate::playback::pacer::{scale, should_wait, Pacer, MIN_WAIT};
use crate::playback::{
    PlaybackMarkers, PlaybackSnapshot, PlaybackStatus, SessionOptions, Target, TargetDirection,
};

/// Appended to every line handed to the sink
pub const LINE_TERMINATOR: &str = "\r\n";

/// Suppressed lines processed between cooperative yields
const SKIP_YIELD_INTERVAL: u32 = 64;

/// Log time between passes that emitted no span of log time, such as a
/// window holding one fix or none
const IDLE_PASS_DELAY: Duration = Duration::from_secs(1);

/// Playback engine replaying a log into a sink.
///
/// Control calls may come from any task while the pass loop runs in its own
/// task. Cloning gives another handle to the same session.
#[derive(Clone, Default)]
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<SessionState>,
    /// Signalled on every control change so a paused loop wakes immediately
    wake: Notify,
    stats: SessionStats,
}

#[derive(Default)]
struct SessionStats {
    messages_sent: AtomicU64,
    sink_errors: AtomicU64,
    passes_completed: AtomicU64,
}

impl SessionStats {
    fn reset(&self) {
        self.messages_sent.store(0, Ordering::SeqCst);
        self.sink_errors.store(0, Ordering::SeqCst);
        self.passes_completed.store(0, Ordering::SeqCst);
    }
}

/// Everything guarded by the session lock
struct SessionState {
    status: PlaybackStatus,
    session: Option<Session>,
    /// Re-anchor the pacer before the next emitted line
    resync_pending: bool,
    /// Abandon the current pass and start over from the first line
    restart_pending: bool,
    last_sink_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            session: None,
            resync_pending: false,
            restart_pending: false,
            last_sink_error: None,
        }
    }
}

struct Session {
    bounds: LogBounds,
    markers: PlaybackMarkers,
    source: String,
    sink: String,
}

/// What the pass loop does with the line it holds
enum Step {
    Emit {
        /// Log time to re-anchor the pacer on before pacing this line
        resync_at: Option<DateTime<Utc>>,
        speed: f64,
    },
    Skip,
    Restart,
    Stop,
}

impl SessionState {
    fn session_mut(&mut self) -> Result<&mut Session, ControlError> {
        if !self.status.is_running() {
            return Err(ControlError::NotRunning);
        }
        self.session.as_mut().ok_or(ControlError::NotRunning)
    }

    fn snapshot(&self, stats: &SessionStats) -> PlaybackSnapshot {
        let session = self.session.as_ref();
        let markers = session.map(|s| &s.markers);
        let bounds = session.map(|s| s.bounds);
        let percent = |ts: Option<DateTime<Utc>>| Some(bounds?.percentage_of(ts?));

        let current = markers.map(|m| m.current);
        let window_start = markers.map(|m| m.window_start);
        let window_end = markers.map(|m| m.window_end);

        PlaybackSnapshot {
            status: self.status,
            speed: markers.map_or(1.0, |m| m.speed),
            current,
            target: markers.and_then(|m| m.target).map(|t| t.at),
            window_start,
            window_end,
            bounds,
            current_percent: percent(current),
            window_start_percent: percent(window_start),
            window_end_percent: percent(window_end),
            source: session.map(|s| s.source.clone()),
            sink: session.map(|s| s.sink.clone()),
            messages_sent: stats.messages_sent.load(Ordering::SeqCst),
            sink_errors: stats.sink_errors.load(Ordering::SeqCst),
            last_sink_error: self.last_sink_error.clone(),
            passes_completed: stats.passes_completed.load(Ordering::SeqCst),
        }
    }

    /// Reset per-pass markers before streaming from the first line
    fn begin_pass(&mut self) -> Option<PlaybackMarkers> {
        self.restart_pending = false;
        self.resync_pending = false;
        let session = self.session.as_mut()?;
        let markers = &mut session.markers;
        markers.current = session.bounds.start;
        if let Some(target) = markers.target {
            markers.target = Some(Target::new(target.at, markers.current));
        }
        Some(markers.clone())
    }

    /// Run the gate for a valid line and apply its outcome
    fn decide(&mut self, timestamp: Option<DateTime<Utc>>) -> Step {
        let status = self.status;
        let Some(session) = self.session.as_mut() else {
            return Step::Stop;
        };

        let before = session.markers.current;
        let decision = gate::decide(timestamp, &mut session.markers, &session.bounds, status);
        if decision.status != status {
            debug!("Playback {:?} -> {:?} at {}", status, decision.status, session.markers.current);
        }
        self.status = decision.status;

        if !decision.emit {
            return Step::Skip;
        }
        // Leaving a skip anchors on the line itself, so it goes out at once.
        // A pause or speed change anchors on the position before it.
        let pending = std::mem::take(&mut self.resync_pending);
        let resync_at = if decision.resync {
            Some(session.markers.current)
        } else if pending {
            Some(before)
        } else {
            None
        };
        Step::Emit {
            resync_at,
            speed: session.markers.speed,
        }
    }
}

impl Shared {
    /// Block while paused, then decide what to do with the current line
    async fn next_step(&self, valid: bool, timestamp: Option<DateTime<Utc>>) -> Step {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                match state.status {
                    PlaybackStatus::Stopped | PlaybackStatus::Stopping => return Step::Stop,
                    PlaybackStatus::Paused => {}
                    PlaybackStatus::Initialising | PlaybackStatus::Playing | PlaybackStatus::Skipping => {
                        if state.restart_pending {
                            return Step::Restart;
                        }
                        if !valid {
                            return Step::Skip;
                        }
                        return state.decide(timestamp);
                    }
                }
            }

            notified.await;
        }
    }

    async fn finalize_stopped(&self) {
        let mut state = self.state.lock().await;
        state.status = PlaybackStatus::Stopped;
        state.session = None;
        state.resync_pending = false;
        state.restart_pending = false;
        drop(state);
        self.wake.notify_waiters();
    }

    async fn record_sink_error(&self, message: String) {
        self.stats.sink_errors.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.last_sink_error = Some(message);
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playback at real-time speed over the whole log
    ///
    /// # Errors
    /// Fails when a session is already running, the log cannot be read, or
    /// it holds no timestamped sentence. The engine is left stopped.
    pub async fn start(
        &self,
        source: Box<dyn LineSource>,
        sink: Box<dyn LineSink>,
    ) -> Result<PlaybackSnapshot, ReplayError> {
        self.start_with(source, sink, SessionOptions::default()).await
    }

    /// Start playback with initial speed, window, target and paused state
    ///
    /// # Errors
    /// As `start`, and when the options fail the same validation as the
    /// individual control calls.
    pub async fn start_with(
        &self,
        mut source: Box<dyn LineSource>,
        sink: Box<dyn LineSink>,
        options: SessionOptions,
    ) -> Result<PlaybackSnapshot, ReplayError> {
        {
            let mut state = self.shared.state.lock().await;
            if state.status != PlaybackStatus::Stopped {
                return Err(ReplayError::AlreadyRunning);
            }
            *state = SessionState {
                status: PlaybackStatus::Initialising,
                ..SessionState::default()
            };
        }
        self.shared.stats.reset();
        info!("Starting playback of {} to {}", source.name(), sink.name());

        let (bounds, markers) = match self.initialise(source.as_mut(), &options).await {
            Ok(seeded) => seeded,
            Err(e) => {
                error!("Cannot play {}: {}", source.name(), e);
                self.shared.finalize_stopped().await;
                return Err(e);
            }
        };

        let snapshot = {
            let mut state = self.shared.state.lock().await;
            if state.status != PlaybackStatus::Initialising {
                drop(state);
                self.shared.finalize_stopped().await;
                return Err(ReplayError::Cancelled);
            }
            state.status = if options.paused {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            };
            state.session = Some(Session {
                bounds,
                markers,
                source: source.name().to_string(),
                sink: sink.name().to_string(),
            });
            state.snapshot(&self.shared.stats)
        };

        let shared = self.shared.clone();
        let handle = tokio::spawn(run_passes(shared, source, sink));
        *self.task.lock().await = Some(handle);

        Ok(snapshot)
    }

    async fn initialise(
        &self,
        source: &mut dyn LineSource,
        options: &SessionOptions,
    ) -> Result<(LogBounds, PlaybackMarkers), ReplayError> {
        source.restart().await?;
        let report = scan_range(source).await?;
        let markers = options.seed(&report.bounds)?;
        Ok((report.bounds, markers))
    }

    /// Get the current session state
    pub async fn status(&self) -> PlaybackSnapshot {
        self.shared.state.lock().await.snapshot(&self.shared.stats)
    }

    /// Switch between playing and paused
    ///
    /// # Errors
    /// `NotRunning` without a running session; any status other than
    /// `Playing` or `Paused` is refused.
    pub async fn set_status(&self, status: PlaybackStatus) -> Result<PlaybackSnapshot, ControlError> {
        match status {
            PlaybackStatus::Playing => self.play().await,
            PlaybackStatus::Paused => self.pause().await,
            PlaybackStatus::Stopped
            | PlaybackStatus::Initialising
            | PlaybackStatus::Skipping
            | PlaybackStatus::Stopping => Err(ControlError::InvalidStatus(status)),
        }
    }

    /// Resume playback. Pacing restarts from the current position, time
    /// spent paused is not made up.
    pub async fn play(&self) -> Result<PlaybackSnapshot, ControlError> {
        self.control("play", |state| {
            state.session_mut()?;
            if state.status == PlaybackStatus::Paused {
                state.status = PlaybackStatus::Playing;
                state.resync_pending = true;
            }
            Ok(())
        })
        .await
    }

    /// Pause playback at the next line boundary
    pub async fn pause(&self) -> Result<PlaybackSnapshot, ControlError> {
        self.control("pause", |state| {
            state.session_mut()?;
            state.status = PlaybackStatus::Paused;
            Ok(())
        })
        .await
    }

    /// Set playback speed
    pub async fn set_speed(&self, speed: f64) -> Result<PlaybackSnapshot, ControlError> {
        self.control("set_speed", |state| {
            state.session_mut()?.markers.set_speed(speed)?;
            state.resync_pending = true;
            Ok(())
        })
        .await
    }

    /// Skip to `at` without emitting, or cancel a pending skip with `None`.
    ///
    /// A target behind the current position restarts the pass so the
    /// target is reached by skipping forward from the start of the log.
    pub async fn set_target(&self, at: Option<DateTime<Utc>>) -> Result<PlaybackSnapshot, ControlError> {
        self.control("set_target", |state| {
            let session = state.session_mut()?;
            let current = session.markers.current;
            let target = session.markers.set_target(at, &session.bounds)?;
            if let Some(Target { at, direction: TargetDirection::Backward }) = target {
                if at < current {
                    state.restart_pending = true;
                }
            }
            Ok(())
        })
        .await
    }

    /// Skip back to the start of the log
    pub async fn rewind(&self) -> Result<PlaybackSnapshot, ControlError> {
        let start = self
            .status()
            .await
            .bounds
            .map(|b| b.start)
            .ok_or(ControlError::NotRunning)?;
        self.set_target(Some(start)).await
    }

    /// Move the window start
    pub async fn set_window_start(&self, at: DateTime<Utc>) -> Result<PlaybackSnapshot, ControlError> {
        self.control("set_window_start", |state| {
            let session = state.session_mut()?;
            session.markers.set_window_start(at, &session.bounds)
        })
        .await
    }

    /// Move the window end
    pub async fn set_window_end(&self, at: DateTime<Utc>) -> Result<PlaybackSnapshot, ControlError> {
        self.control("set_window_end", |state| {
            let session = state.session_mut()?;
            session.markers.set_window_end(at, &session.bounds)
        })
        .await
    }

    /// Ask the pass loop to stop after the current line. Stopping a stopped
    /// engine is a no-op.
    pub async fn stop(&self) -> PlaybackSnapshot {
        let snapshot = {
            let mut state = self.shared.state.lock().await;
            match state.status {
                PlaybackStatus::Stopped | PlaybackStatus::Stopping => {}
                PlaybackStatus::Initialising
                | PlaybackStatus::Playing
                | PlaybackStatus::Paused
                | PlaybackStatus::Skipping => {
                    info!("Stopping playback");
                    state.status = PlaybackStatus::Stopping;
                }
            }
            state.snapshot(&self.shared.stats)
        };
        self.shared.wake.notify_waiters();
        snapshot
    }

    /// Wait until the session has stopped, whether through `stop` or a
    /// source failure. Returns at once on a stopped engine.
    pub async fn stopped(&self) {
        loop {
            let notified = self.shared.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.state.lock().await.status == PlaybackStatus::Stopped {
                return;
            }
            notified.await;
        }
    }

    /// Wait for the pass loop to finish after `stop`
    pub async fn join(&self) {
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Playback task failed: {}", e);
                self.shared.finalize_stopped().await;
            }
        }
    }

    /// Apply a control mutation atomically and return the resulting state
    async fn control<F>(&self, name: &str, apply: F) -> Result<PlaybackSnapshot, ControlError>
    where
        F: FnOnce(&mut SessionState) -> Result<(), ControlError>,
    {
        let mut state = self.shared.state.lock().await;
        if let Err(e) = apply(&mut state) {
            debug!("Rejected {}: {}", name, e);
            return Err(e);
        }
        let snapshot = state.snapshot(&self.shared.stats);
        drop(state);

        debug!("{} -> {:?}", name, snapshot.status);
        self.shared.wake.notify_waiters();
        Ok(snapshot)
    }
}

/// Replay the log in passes until stopped
async fn run_passes(shared: Arc<Shared>, mut source: Box<dyn LineSource>, mut sink: Box<dyn LineSink>) {
    let mut pacer = Pacer::new();
    let mut sink_failing = false;

    'passes: loop {
        if let Err(e) = source.restart().await {
            error!("Cannot restart {}: {}", source.name(), e);
            break;
        }
        let markers = {
            let mut state = shared.state.lock().await;
            if !state.status.is_running() {
                break;
            }
            match state.begin_pass() {
                Some(markers) => markers,
                None => break,
            }
        };
        pacer.reset();
        pacer.set_max_step(markers.max_gap);
        debug!("Starting pass over {}", source.name());
        tokio::task::yield_now().await;

        let mut speed = markers.speed;
        let mut first_fix = None;
        let mut last_fix = None;
        let mut skipped = 0u32;
        loop {
            let line = match source.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("{}", e);
                    break 'passes;
                }
            };

            let valid = is_valid_sentence(&line);
            let timestamp = if valid { extract_timestamp(&line) } else { None };
            if !valid {
                trace!("Ignoring malformed line: {}", line);
            }

            let resync_at = match shared.next_step(valid, timestamp).await {
                Step::Emit { resync_at, speed: step_speed } => {
                    speed = step_speed;
                    resync_at
                }
                Step::Skip => {
                    skipped = skipped.wrapping_add(1);
                    if skipped % SKIP_YIELD_INTERVAL == 0 {
                        tokio::task::yield_now().await;
                    }
                    continue;
                }
                Step::Restart => {
                    debug!("Restarting pass over {}", source.name());
                    continue 'passes;
                }
                Step::Stop => break 'passes,
            };

            if let Some(anchor) = resync_at {
                pacer.resync(anchor, Instant::now());
            }
            if let Some(ts) = timestamp {
                let wait = pacer.compute_wait(ts, speed, Instant::now());
                if should_wait(wait) {
                    tokio::time::sleep(wait).await;
                }
                first_fix.get_or_insert(ts);
                last_fix = Some(ts);
            }

            let payload = format!("{}{}", line, LINE_TERMINATOR);
            match sink.send(&payload).await {
                Ok(()) => {
                    if sink_failing {
                        info!("Delivery to {} recovered", sink.name());
                        sink_failing = false;
                    }
                    shared.stats.messages_sent.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    if sink_failing {
                        debug!("Send to {} failed: {}", sink.name(), e);
                    } else {
                        warn!("Send to {} failed: {}", sink.name(), e);
                        sink_failing = true;
                    }
                    shared.record_sink_error(e.to_string()).await;
                }
            }
        }

        shared.stats.passes_completed.fetch_add(1, Ordering::SeqCst);
        debug!("Finished pass over {}", source.name());

        // Nothing in this pass advanced log time, so nothing paced it
        if first_fix == last_fix {
            let idle = scale(IDLE_PASS_DELAY, speed).max(MIN_WAIT);
            debug!("Pass emitted no span of log time, idling {:?}", idle);
            tokio::select! {
                _ = tokio::time::sleep(idle) => {}
                _ = shared.wake.notified() => {}
            }
        }
    }

    shared.finalize_stopped().await;
    info!("Playback of {} stopped", source.name());
}
