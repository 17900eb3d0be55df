use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;
use crate::db::PlatformStore;
use crate::error::SyncError;
use crate::fetchers::PlatformOutcome;
use crate::handlers::{ApiError, json_body};
use crate::models::{SyncRequest, SyncStatusRequest};
use crate::sync::SyncTarget;
use crate::sync::status::SyncStatus;

#[derive(Debug, Serialize)]
pub struct PlatformSyncResult {
    pub platform_id: String,
    pub status: &'static str,
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
    pub removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PlatformOutcome> for PlatformSyncResult {
    fn from(outcome: PlatformOutcome) -> Self {
        match outcome.result {
            Ok(report) => Self {
                platform_id: outcome.platform_id,
                status: if report.skipped { "skipped" } else { "synced" },
                added: report.added,
                updated: report.updated,
                failed: report.failed,
                removed: report.removed,
                error: None,
            },
            Err(e) => Self {
                platform_id: outcome.platform_id,
                status: "failed",
                added: 0,
                updated: 0,
                failed: 0,
                removed: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<PlatformSyncResult>,
}

#[derive(Debug, Serialize)]
pub struct SyncInfo {
    pub status: &'static str,
    pub last_sync: Option<DateTime<Utc>>,
    pub platforms: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Runs a sync to completion and reports what changed.
pub async fn trigger_sync(
    State(state): State<AppState>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let request = json_body(payload)?;

    let target = if request.all_platforms {
        SyncTarget::AllPlatforms
    } else {
        match request.platform_id.filter(|id| !id.trim().is_empty()) {
            Some(platform_id) => SyncTarget::Platform(platform_id),
            None => {
                return Err(ApiError::bad_request(
                    "Either platform_id or all_platforms must be specified",
                ));
            }
        }
    };

    let outcomes = state
        .coordinator
        .run(target.clone())
        .await
        .map_err(sync_error_response)?;

    let total = outcomes.len();
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    let message = match &target {
        SyncTarget::Platform(platform_id) => {
            format!("Platform {} synced successfully", platform_id)
        }
        SyncTarget::AllPlatforms if failed == 0 => "All platforms synced successfully".to_string(),
        SyncTarget::AllPlatforms => format!("Synced {} of {} platforms", total - failed, total),
    };

    Ok(Json(SyncResponse {
        message,
        timestamp: Utc::now(),
        results: outcomes.into_iter().map(PlatformSyncResult::from).collect(),
    }))
}

fn sync_error_response(error: SyncError) -> ApiError {
    match error {
        SyncError::PlatformNotFound(_) => ApiError::not_found(error.to_string()),
        SyncError::AlreadyRunning => ApiError::conflict("A sync is already in progress"),
        SyncError::Cancelled => ApiError::conflict("Sync cancelled"),
        SyncError::Store(e) => ApiError::internal("Sync failed", e),
        e => {
            // Source failures carry the command and its stderr excerpt
            let level = if e.is_source_failure() { "source" } else { "platform" };
            tracing::error!("Sync failed ({}): {}", level, e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Sync failed").with_details(e.to_string())
        }
    }
}

pub async fn sync_info(State(state): State<AppState>) -> Result<Json<SyncInfo>, ApiError> {
    let platforms = state
        .db
        .get_all_platforms()
        .map_err(|e| ApiError::internal("Failed to fetch platforms", e))?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let status = if state.tracker.status().in_progress {
        "syncing"
    } else {
        "ready"
    };

    Ok(Json(SyncInfo {
        status,
        last_sync: state.tracker.last_completed(),
        platforms,
    }))
}

pub async fn get_sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.tracker.status())
}

/// Flips the tracker. `start` only marks a sync as running; `POST /sync`
/// is what actually fetches.
pub async fn update_sync_status(
    State(state): State<AppState>,
    payload: Result<Json<SyncStatusRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = json_body(payload)?;

    match request.action.as_str() {
        "cancel" => {
            state.tracker.cancel();
            tracing::info!("Sync cancelled via API");
            Ok(Json(MessageResponse {
                message: "Sync cancelled successfully",
            }))
        }
        "start" => {
            state.tracker.start();
            Ok(Json(MessageResponse {
                message: "Sync started",
            }))
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}
