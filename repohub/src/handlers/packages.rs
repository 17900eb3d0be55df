use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::db::PackageStore;
use crate::handlers::ApiError;
use crate::models::*;
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ListPackagesQuery {
    platform: Option<String>,
    #[serde(rename = "type")]
    package_type: Option<PackageType>,
    repository: Option<RepositoryOrigin>,
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl ListPackagesQuery {
    fn matches(&self, package: &Package, needle: Option<&str>) -> bool {
        if self.package_type.is_some_and(|t| t != package.package_type) {
            return false;
        }
        if self.repository.is_some_and(|r| r != package.repository) {
            return false;
        }
        match needle {
            Some(needle) => {
                package.name.to_lowercase().contains(needle)
                    || package
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(needle))
            }
            None => true,
        }
    }
}

/// Lists packages, most popular first, one page at a time.
pub async fn list_packages(
    Query(params): Query<ListPackagesQuery>,
    State(state): State<AppState>,
) -> Result<Json<PackagesResponse>, ApiError> {
    let packages = match params.platform.as_deref() {
        Some(platform_id) => state.db.get_packages_by_platform(platform_id),
        None => state.db.get_all_packages(),
    }
    .map_err(|e| ApiError::internal("Failed to fetch packages", e))?;

    let needle = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut matching: Vec<Package> = packages
        .into_iter()
        .filter(|p| params.matches(p, needle.as_deref()))
        .collect();
    matching.sort_by(|a, b| {
        b.popularity_score
            .cmp(&a.popularity_score)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.platform_id.cmp(&b.platform_id))
    });

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let total = matching.len();
    let offset = (page as usize - 1).saturating_mul(limit as usize);

    let packages = matching
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .collect();

    Ok(Json(PackagesResponse {
        packages,
        total,
        page,
        limit,
    }))
}

pub async fn get_package(
    Path((platform_id, id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<Package>, ApiError> {
    match state.db.get_package(&platform_id, &id) {
        Ok(Some(package)) => Ok(Json(package)),
        Ok(None) => Err(ApiError::not_found("Package not found")),
        Err(e) => Err(ApiError::internal("Failed to fetch package", e)),
    }
}
