use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};

use crate::AppState;
use crate::db::{PackageStore, PlatformStore};
use crate::handlers::{ApiError, json_body};
use crate::models::GenerateScriptRequest;
use crate::script::{self, GeneratedScript};

/// Renders an install script for the selected packages, in selection order.
pub async fn generate_script(
    State(state): State<AppState>,
    payload: Result<Json<GenerateScriptRequest>, JsonRejection>,
) -> Result<Json<GeneratedScript>, ApiError> {
    let request = json_body(payload)?;

    let platform = state
        .db
        .get_platform(&request.platform_id)
        .map_err(|e| ApiError::internal("Failed to fetch platform", e))?
        .ok_or_else(|| ApiError::not_found("Platform not found"))?;

    let mut packages = Vec::with_capacity(request.package_ids.len());
    for id in &request.package_ids {
        let package = state
            .db
            .get_package(&platform.id, id)
            .map_err(|e| ApiError::internal("Failed to fetch package", e))?
            .ok_or_else(|| ApiError::not_found(format!("Package not found: {}", id)))?;
        packages.push(package);
    }

    script::generate(&platform, &packages)
        .map(Json)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}
