pub mod scheduler;
pub mod status;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::SyncError;
use crate::fetchers::{MetadataFetcher, PlatformOutcome};
use status::SyncTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Platform(String),
    AllPlatforms,
}

/// Runs syncs one at a time and keeps the tracker in step with them.
pub struct SyncCoordinator {
    fetcher: MetadataFetcher,
    tracker: Arc<SyncTracker>,
    /// Held for the whole run; a second trigger is rejected, not queued.
    running: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(fetcher: MetadataFetcher, tracker: Arc<SyncTracker>) -> Self {
        Self {
            fetcher,
            tracker,
            running: Mutex::new(()),
        }
    }

    /// Syncs `target`.
    ///
    /// For a single platform the platform's error is returned as is. For
    /// all platforms the per-platform outcomes are returned and partial
    /// failure still counts as success.
    pub async fn run(&self, target: SyncTarget) -> Result<Vec<PlatformOutcome>, SyncError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let run = self.tracker.start();

        let result = match &target {
            SyncTarget::Platform(platform_id) => self
                .fetcher
                .sync_platform(platform_id, &run)
                .await
                .map(|report| {
                    vec![PlatformOutcome {
                        platform_id: report.platform_id.clone(),
                        result: Ok(report),
                    }]
                }),
            SyncTarget::AllPlatforms => self.fetcher.sync_all_platforms(&run).await,
        };

        match &result {
            Ok(outcomes) => {
                if run.is_cancelled() {
                    tracing::warn!("Sync cancelled");
                } else {
                    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
                    let message = if failed == 0 {
                        "Sync completed".to_string()
                    } else {
                        format!("Sync completed with {} failed platform(s)", failed)
                    };
                    self.tracker.complete(&run, message);
                }
            }
            Err(SyncError::Cancelled) => tracing::warn!("Sync cancelled"),
            Err(e) => self.tracker.fail(&run, format!("Sync failed: {}", e)),
        }

        result
    }
}
