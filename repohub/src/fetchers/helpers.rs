use chrono::Utc;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::db::PackageStore;
use crate::error::SyncError;
use crate::fetchers::PackageRecord;
use crate::sync::status::{SyncRun, SyncTracker};

/// How often (in records) the upsert loop publishes progress.
const PROGRESS_EVERY: usize = 250;

const STDERR_EXCERPT_LEN: usize = 512;

/// Runs an external command and returns its stdout.
///
/// The child is killed if the timeout elapses or `cancel` fires first.
pub async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, SyncError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("Running {}", command);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
        result = tokio::time::timeout(timeout, output) => match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(SyncError::CommandSpawn { command, source }),
            Err(_) => return Err(SyncError::CommandTimeout { command, timeout }),
        },
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let excerpt: String = stderr
            .chars()
            .skip(stderr.chars().count().saturating_sub(STDERR_EXCERPT_LEN))
            .collect();
        return Err(SyncError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: excerpt,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Counts from one reconciliation batch.
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
    /// Every identifier present in the batch, including failed ones.
    pub seen: HashSet<String>,
}

/// Inserts or updates each record in order.
///
/// A failing record is logged and counted, and the batch moves on. The
/// cancellation token is checked before every record and once at the end.
pub fn upsert_records<S: PackageStore + ?Sized>(
    store: &S,
    platform_id: &str,
    records: Vec<PackageRecord>,
    tracker: &SyncTracker,
    run: &SyncRun,
) -> Result<UpsertReport, SyncError> {
    let total = records.len();
    let mut report = UpsertReport::default();

    tracing::info!("Storing {} packages for platform {}", total, platform_id);

    for (index, record) in records.into_iter().enumerate() {
        if run.is_cancelled() {
            tracing::warn!(
                "Sync of {} cancelled after {} of {} packages (added: {}, updated: {})",
                platform_id,
                index,
                total,
                report.added,
                report.updated
            );
            return Err(SyncError::Cancelled);
        }

        if index % PROGRESS_EVERY == 0 {
            tracker.advance(
                run,
                format!("Storing packages for {}", platform_id),
                index as u64,
                total as u64,
            );
        }

        report.seen.insert(record.id.clone());
        let id = record.id.clone();

        match upsert_record(store, platform_id, record) {
            Ok(true) => report.added += 1,
            Ok(false) => report.updated += 1,
            Err(e) => {
                tracing::error!("Error storing package {}: {}", id, e);
                report.failed += 1;
            }
        }
    }

    // An empty batch never reaches the check inside the loop
    if run.is_cancelled() {
        tracing::warn!("Sync of {} cancelled after storing its packages", platform_id);
        return Err(SyncError::Cancelled);
    }

    tracker.advance(
        run,
        format!("Stored packages for {}", platform_id),
        total as u64,
        total as u64,
    );
    tracing::info!(
        "Added: {}, Updated: {}, Failed: {}",
        report.added,
        report.updated,
        report.failed
    );

    Ok(report)
}

/// Returns `true` when the record was inserted, `false` when it updated an
/// existing package.
fn upsert_record<S: PackageStore + ?Sized>(
    store: &S,
    platform_id: &str,
    record: PackageRecord,
) -> anyhow::Result<bool> {
    let now = Utc::now();

    match store.get_package(platform_id, &record.id)? {
        Some(mut existing) => {
            existing.description = record.description;
            existing.version = record.version;
            existing.homepage_url = record.homepage_url;
            existing.category = record.category;
            existing.package_type = record.package_type;
            existing.repository = record.repository;
            existing.popularity_score = record.popularity_score;
            existing.updated_at = now;
            store.update_package(existing)?;
            Ok(false)
        }
        None => {
            store.insert_package(record.into_package(platform_id, now))?;
            Ok(true)
        }
    }
}
