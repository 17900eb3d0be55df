use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;

use crate::AppState;
use crate::db::{PackageStore, PlatformStore};
use crate::handlers::{ApiError, json_body};
use crate::models::{CreatePlatformRequest, Platform, UpdatePlatformRequest};

pub async fn list_platforms(State(state): State<AppState>) -> Result<Json<Vec<Platform>>, ApiError> {
    state
        .db
        .get_all_platforms()
        .map(Json)
        .map_err(|e| ApiError::internal("Failed to fetch platforms", e))
}

pub async fn get_platform(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Platform>, ApiError> {
    match state.db.get_platform(&id) {
        Ok(Some(platform)) => Ok(Json(platform)),
        Ok(None) => Err(ApiError::not_found("Platform not found")),
        Err(e) => Err(ApiError::internal("Failed to fetch platform", e)),
    }
}

pub async fn create_platform(
    State(state): State<AppState>,
    payload: Result<Json<CreatePlatformRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Platform>), ApiError> {
    let payload = json_body(payload)?;

    if payload.id.trim().is_empty()
        || payload.name.trim().is_empty()
        || payload.package_manager.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "id, name and package_manager must not be empty",
        ));
    }
    // Package keys are `{platform_id}/{package_id}`
    if payload.id.contains('/') {
        return Err(ApiError::bad_request("id must not contain '/'"));
    }

    let now = Utc::now();
    let platform = Platform {
        id: payload.id,
        name: payload.name,
        package_manager: payload.package_manager,
        icon: payload.icon,
        created_at: now,
        updated_at: now,
    };

    match state.db.insert_platform(platform) {
        Ok(platform) => {
            tracing::info!("Created platform {}", platform.id);
            Ok((StatusCode::CREATED, Json(platform)))
        }
        Err(e) => Err(ApiError::internal("Failed to create platform", e)),
    }
}

pub async fn update_platform(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<UpdatePlatformRequest>, JsonRejection>,
) -> Result<Json<Platform>, ApiError> {
    let changes = json_body(payload)?;
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    match state.db.update_platform(&id, changes) {
        Ok(Some(platform)) => Ok(Json(platform)),
        Ok(None) => Err(ApiError::not_found("Platform not found")),
        Err(e) => Err(ApiError::internal("Failed to update platform", e)),
    }
}

/// Deletes a platform that no package refers to any more.
pub async fn delete_platform(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let dependents = state
        .db
        .get_packages_by_platform(&id)
        .map_err(|e| ApiError::internal("Failed to delete platform", e))?;
    if !dependents.is_empty() {
        return Err(ApiError::conflict(format!(
            "Platform still has {} packages",
            dependents.len()
        )));
    }

    match state.db.delete_platform(&id) {
        Ok(true) => {
            tracing::info!("Deleted platform {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(ApiError::not_found("Platform not found")),
        Err(e) => Err(ApiError::internal("Failed to delete platform", e)),
    }
}
