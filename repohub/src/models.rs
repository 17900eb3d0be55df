use chrono::{DateTime, Utc};
use native_db::*;
use native_model::{Model, native_model};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A target OS paired with its package manager, e.g. Ubuntu/apt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct Platform {
    #[primary_key]
    pub id: String,
    pub name: String,
    pub package_manager: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog entry scoped to one platform.
///
/// Stored under the composite key `{platform_id}/{id}` so the same native
/// package name can exist on several platforms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[native_model(id = 2, version = 1)]
#[native_db(primary_key(scoped_key -> String))]
pub struct Package {
    pub id: String,
    pub platform_id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub homepage_url: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub repository: RepositoryOrigin,
    pub popularity_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn scoped_key(&self) -> String {
        package_key(&self.platform_id, &self.id)
    }
}

pub fn package_key(platform_id: &str, id: &str) -> String {
    format!("{}/{}", platform_id, id)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Gui,
    Cli,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Gui => "gui",
            PackageType::Cli => "cli",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RepositoryOrigin {
    #[serde(rename = "official")]
    Official,
    #[serde(rename = "third-party")]
    ThirdParty,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlatformRequest {
    pub id: String,
    pub name: String,
    pub package_manager: String,
    pub icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePlatformRequest {
    pub name: Option<String>,
    pub package_manager: Option<String>,
    pub icon: Option<String>,
}

impl UpdatePlatformRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.package_manager.is_none() && self.icon.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub platform_id: Option<String>,
    #[serde(default)]
    pub all_platforms: bool,
}

#[derive(Debug, Deserialize)]
pub struct SyncStatusRequest {
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateScriptRequest {
    pub platform_id: String,
    pub package_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesResponse {
    pub packages: Vec<Package>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}
