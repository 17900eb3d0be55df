use std::sync::Arc;
use tokio::time::Duration;

use crate::error::SyncError;
use crate::sync::{SyncCoordinator, SyncTarget};

/// Runs a full sync every `interval_hours`, forever.
pub async fn run_sync_loop(coordinator: Arc<SyncCoordinator>, interval_hours: u64) {
    let sleep_duration = interval(interval_hours);

    loop {
        tracing::info!("Scheduled sync sleeping for {} hours", interval_hours);
        tokio::time::sleep(sleep_duration).await;

        run_scheduled_sync(&coordinator).await;
    }
}

fn interval(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

/// One scheduled full sync. Errors are logged, never propagated.
pub async fn run_scheduled_sync(coordinator: &SyncCoordinator) {
    tracing::info!("Starting scheduled sync of all platforms");

    match coordinator.run(SyncTarget::AllPlatforms).await {
        Ok(outcomes) => {
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            tracing::info!(
                "Scheduled sync finished: {} platforms, {} failed",
                outcomes.len(),
                failed
            );
        }
        Err(SyncError::AlreadyRunning) => {
            tracing::warn!("Skipping scheduled sync, another sync is still running");
        }
        Err(e) => {
            tracing::error!("Scheduled sync failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_saturates() {
        assert_eq!(interval(24), Duration::from_secs(86_400));
        assert_eq!(interval(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
