//! Process-local sync progress state.
//!
//! One tracker is created at startup and shared through `AppState`. It is
//! not shared across processes; every server instance reports only its own
//! syncs.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

pub const STARTING_MESSAGE: &str = "Starting sync...";
pub const CANCELLED_MESSAGE: &str = "Sync cancelled";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncProgress {
    pub message: String,
    pub current: u64,
    pub total: u64,
}

impl SyncProgress {
    fn new(message: impl Into<String>, current: u64, total: u64) -> Self {
        Self {
            message: message.into(),
            current,
            total,
        }
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new("", 0, 100)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub in_progress: bool,
    pub progress: SyncProgress,
}

/// Handle for one sync run. Progress and completion reported through it
/// are dropped once the run has been cancelled.
#[derive(Debug, Clone)]
pub struct SyncRun {
    generation: u64,
    token: CancellationToken,
}

impl SyncRun {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct TrackerState {
    in_progress: bool,
    progress: SyncProgress,
    generation: u64,
    token: CancellationToken,
    last_completed: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SyncTracker {
    state: RwLock<TrackerState>,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TrackerState {
                in_progress: false,
                progress: SyncProgress::default(),
                generation: 0,
                token: CancellationToken::new(),
                last_completed: None,
            }),
        }
    }

    /// Marks a sync as in progress and resets progress to 0/100.
    ///
    /// Calling this while a run is already active keeps that run's
    /// cancellation token, so a later `cancel` still reaches it.
    pub fn start(&self) -> SyncRun {
        let mut state = self.state.write();
        if !state.in_progress || state.token.is_cancelled() {
            state.generation += 1;
            state.token = CancellationToken::new();
        }
        state.in_progress = true;
        state.progress = SyncProgress::new(STARTING_MESSAGE, 0, 100);

        SyncRun {
            generation: state.generation,
            token: state.token.clone(),
        }
    }

    /// Overwrites the progress snapshot.
    pub fn report_progress(&self, message: impl Into<String>, current: u64, total: u64) {
        self.state.write().progress = SyncProgress::new(message, current, total);
    }

    /// Stops the current run. The terminal message stays in place even if
    /// the run's work finishes afterwards.
    pub fn cancel(&self) {
        let mut state = self.state.write();
        state.in_progress = false;
        state.progress = SyncProgress::new(CANCELLED_MESSAGE, 0, 100);
        state.token.cancel();
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.state.read();
        SyncStatus {
            in_progress: state.in_progress,
            progress: state.progress.clone(),
        }
    }

    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_completed
    }

    /// Progress for `run`, ignored when the run is no longer current.
    pub fn advance(&self, run: &SyncRun, message: impl Into<String>, current: u64, total: u64) {
        let mut state = self.state.write();
        if Self::is_current(&state, run) {
            state.progress = SyncProgress::new(message, current, total);
        }
    }

    /// Ends `run` successfully.
    pub fn complete(&self, run: &SyncRun, message: impl Into<String>) {
        let mut state = self.state.write();
        if Self::is_current(&state, run) {
            state.in_progress = false;
            state.progress = SyncProgress::new(message, 100, 100);
            state.last_completed = Some(Utc::now());
        }
    }

    /// Ends `run` with a failure message.
    pub fn fail(&self, run: &SyncRun, message: impl Into<String>) {
        let mut state = self.state.write();
        if Self::is_current(&state, run) {
            state.in_progress = false;
            state.progress = SyncProgress::new(message, 0, 100);
        }
    }

    fn is_current(state: &TrackerState, run: &SyncRun) -> bool {
        state.generation == run.generation && !run.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tracker = SyncTracker::new();
        let status = tracker.status();
        assert!(!status.in_progress);
        assert_eq!(status.progress, SyncProgress::new("", 0, 100));
        assert!(tracker.last_completed().is_none());
    }

    #[test]
    fn test_start_then_status() {
        let tracker = SyncTracker::new();
        let run = tracker.start();
        let status = tracker.status();
        assert!(status.in_progress);
        assert_eq!(status.progress, SyncProgress::new(STARTING_MESSAGE, 0, 100));
        assert!(!run.is_cancelled());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let tracker = SyncTracker::new();
        let run = tracker.start();
        tracker.cancel();

        assert!(run.is_cancelled());
        let status = tracker.status();
        assert!(!status.in_progress);
        assert_eq!(status.progress.message, CANCELLED_MESSAGE);

        // Work that finishes after the cancel does not flip the state back.
        tracker.advance(&run, "Storing packages for ubuntu", 10, 20);
        tracker.complete(&run, "Sync completed");
        let status = tracker.status();
        assert!(!status.in_progress);
        assert_eq!(status.progress.message, CANCELLED_MESSAGE);
        assert!(tracker.last_completed().is_none());
    }

    #[test]
    fn test_start_while_running_keeps_token() {
        let tracker = SyncTracker::new();
        let first = tracker.start();
        let second = tracker.start();
        tracker.cancel();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());

        let third = tracker.start();
        assert!(!third.is_cancelled());
    }

    #[test]
    fn test_complete_records_last_sync() {
        let tracker = SyncTracker::new();
        let run = tracker.start();
        tracker.advance(&run, "Syncing Ubuntu (1/1)", 1, 1);
        assert_eq!(tracker.status().progress.current, 1);

        tracker.complete(&run, "Sync completed");
        let status = tracker.status();
        assert!(!status.in_progress);
        assert_eq!(status.progress, SyncProgress::new("Sync completed", 100, 100));
        assert!(tracker.last_completed().is_some());
    }

    #[test]
    fn test_report_progress_overwrites() {
        let tracker = SyncTracker::new();
        tracker.report_progress("halfway", 50, 100);
        tracker.report_progress("almost", 90, 100);
        assert_eq!(tracker.status().progress, SyncProgress::new("almost", 90, 100));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let tracker = SyncTracker::new();
        tracker.start();
        let json = serde_json::to_value(tracker.status()).unwrap();
        assert_eq!(json["inProgress"], true);
        assert_eq!(json["progress"]["message"], STARTING_MESSAGE);
        assert_eq!(json["progress"]["total"], 100);
    }
}
