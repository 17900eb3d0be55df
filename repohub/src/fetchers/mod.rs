pub mod apt;
pub mod classify;
pub mod control;
pub mod helpers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, StalePackagePolicy};
use crate::db::CatalogStore;
use crate::error::SyncError;
use crate::models::{Package, PackageType, RepositoryOrigin};
use crate::sync::status::{SyncRun, SyncTracker};

/// Score for packages without popularity data.
pub const DEFAULT_POPULARITY_SCORE: i32 = 0;

/// Widely installed packages, most popular first.
const POPULAR_PACKAGES: [&str; 13] = [
    "curl",
    "wget",
    "git",
    "vim",
    "nano",
    "firefox",
    "chromium-browser",
    "libreoffice",
    "gimp",
    "vlc",
    "audacity",
    "thunderbird",
    "code",
];

/// Package managers that are known but have no fetcher yet. Syncing them
/// is a logged no-op.
pub const PENDING_PACKAGE_MANAGERS: [&str; 4] = ["dnf", "pacman", "winget", "brew"];

pub fn popularity_score(name: &str) -> i32 {
    POPULAR_PACKAGES
        .iter()
        .position(|popular| *popular == name)
        .map_or(DEFAULT_POPULARITY_SCORE, |rank| 100 - 5 * rank as i32)
}

/// A normalized package as produced by a metadata source.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub homepage_url: Option<String>,
    pub category: Option<String>,
    pub package_type: PackageType,
    pub repository: RepositoryOrigin,
    pub popularity_score: i32,
}

impl PackageRecord {
    /// Promotes a tokenized block. Returns `None` when the block has neither
    /// an identifier nor a name.
    pub fn from_parsed(parsed: control::ParsedRecord) -> Option<Self> {
        let id = parsed.identifier()?.to_string();
        let name = parsed.display_name().unwrap_or(&id).to_string();
        let package_type = classify::classify(&name, parsed.description.as_deref());
        let popularity_score = popularity_score(&name);

        Some(Self {
            id,
            name,
            description: parsed.description,
            version: parsed.version,
            homepage_url: parsed.homepage,
            category: parsed.section,
            package_type,
            repository: RepositoryOrigin::Official,
            popularity_score,
        })
    }

    pub fn into_package(self, platform_id: &str, now: DateTime<Utc>) -> Package {
        Package {
            id: self.id,
            platform_id: platform_id.to_string(),
            name: self.name,
            description: self.description,
            version: self.version,
            homepage_url: self.homepage_url,
            category: self.category,
            package_type: self.package_type,
            repository: self.repository,
            popularity_score: self.popularity_score,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A platform's native metadata source.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<PackageRecord>, SyncError>;
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub platform_id: String,
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
    pub removed: usize,
    /// The platform's package manager has no fetcher yet.
    pub skipped: bool,
    pub duration_ms: u64,
}

/// Result of one platform within a multi-platform sync.
#[derive(Debug)]
pub struct PlatformOutcome {
    pub platform_id: String,
    pub result: Result<SyncReport, SyncError>,
}

pub struct MetadataFetcher {
    store: Arc<dyn CatalogStore>,
    tracker: Arc<SyncTracker>,
    sources: HashMap<String, Arc<dyn MetadataSource>>,
    stale_policy: StalePackagePolicy,
}

impl MetadataFetcher {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        tracker: Arc<SyncTracker>,
        stale_policy: StalePackagePolicy,
    ) -> Self {
        Self {
            store,
            tracker,
            sources: HashMap::new(),
            stale_policy,
        }
    }

    /// Fetcher with every source this build knows how to run.
    pub fn from_config(
        store: Arc<dyn CatalogStore>,
        tracker: Arc<SyncTracker>,
        config: &Config,
    ) -> Self {
        Self::new(store, tracker, config.stale_package_policy).with_source(
            "apt",
            Arc::new(apt::AptSource::new(
                config.sync_command_timeout,
                config.apt_update,
            )),
        )
    }

    /// Registers `source` for platforms whose package manager is `package_manager`.
    pub fn with_source(mut self, package_manager: &str, source: Arc<dyn MetadataSource>) -> Self {
        self.sources.insert(package_manager.to_string(), source);
        self
    }

    /// Fetches and reconciles one platform's catalog.
    pub async fn sync_platform(
        &self,
        platform_id: &str,
        run: &SyncRun,
    ) -> Result<SyncReport, SyncError> {
        let platform = self
            .store
            .get_platform(platform_id)?
            .ok_or_else(|| SyncError::PlatformNotFound(platform_id.to_string()))?;

        tracing::info!("Starting metadata sync for platform: {}", platform.id);
        let started = Instant::now();

        let package_manager = platform.package_manager.clone();
        let Some(source) = self.sources.get(&package_manager) else {
            if PENDING_PACKAGE_MANAGERS.contains(&package_manager.as_str()) {
                tracing::info!(
                    "{} metadata fetching not yet implemented",
                    platform.name
                );
                return Ok(SyncReport {
                    platform_id: platform.id,
                    skipped: true,
                    ..Default::default()
                });
            }
            return Err(SyncError::UnsupportedPackageManager {
                platform_id: platform.id,
                package_manager,
            });
        };

        self.tracker.advance(
            run,
            format!("Fetching {} metadata for {}", source.name(), platform.name),
            0,
            100,
        );

        let records = match source.fetch(run.token()).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Sync failed for {}: {}", platform.id, e);
                return Err(e);
            }
        };

        let upserted =
            helpers::upsert_records(self.store.as_ref(), &platform.id, records, &self.tracker, run)?;

        let removed = match self.stale_policy {
            StalePackagePolicy::Retain => 0,
            StalePackagePolicy::Remove if upserted.seen.is_empty() => {
                tracing::warn!(
                    "{} returned no packages for {}, keeping existing catalog",
                    source.name(),
                    platform.id
                );
                0
            }
            StalePackagePolicy::Remove => self.remove_stale(&platform.id, &upserted.seen, run)?,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Sync completed for {} in {}ms", platform.id, duration_ms);

        Ok(SyncReport {
            platform_id: platform.id,
            added: upserted.added,
            updated: upserted.updated,
            failed: upserted.failed,
            removed,
            skipped: false,
            duration_ms,
        })
    }

    /// Syncs every platform in store order. A failing platform is logged and
    /// the loop moves on. Cancellation stops it early and fails the whole run,
    /// since the remaining platforms were never attempted.
    pub async fn sync_all_platforms(&self, run: &SyncRun) -> Result<Vec<PlatformOutcome>, SyncError> {
        tracing::info!("Starting metadata sync for all platforms...");

        let platforms = self.store.get_all_platforms()?;
        let total = platforms.len() as u64;
        let mut outcomes = Vec::with_capacity(platforms.len());

        for (index, platform) in platforms.into_iter().enumerate() {
            if run.is_cancelled() {
                tracing::warn!("Sync of all platforms cancelled before {}", platform.id);
                return Err(SyncError::Cancelled);
            }

            self.tracker.advance(
                run,
                format!("Syncing {} ({}/{})", platform.name, index + 1, total),
                index as u64,
                total,
            );

            let result = self.sync_platform(&platform.id, run).await;
            if let Err(e) = &result {
                tracing::error!("Failed to sync {}: {}", platform.name, e);
            }
            outcomes.push(PlatformOutcome {
                platform_id: platform.id,
                result,
            });
        }

        if run.is_cancelled() {
            tracing::warn!("Sync of all platforms cancelled after the last platform");
            return Err(SyncError::Cancelled);
        }

        tracing::info!("All platforms sync completed");
        Ok(outcomes)
    }

    fn remove_stale(
        &self,
        platform_id: &str,
        seen: &std::collections::HashSet<String>,
        run: &SyncRun,
    ) -> Result<usize, SyncError> {
        let mut removed = 0;
        for package in self.store.get_packages_by_platform(platform_id)? {
            if run.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if seen.contains(&package.id) {
                continue;
            }
            match self.store.remove_package(platform_id, &package.id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to remove stale package {}: {}", package.id, e),
            }
        }
        if removed > 0 {
            tracing::info!("Removed {} stale packages from {}", removed, platform_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, PackageStore, PlatformStore};
    use crate::models::{Platform, UpdatePlatformRequest};

    const FIXTURE: &str = "\
Package: vlc
Version: 3.0.20
Section: video
Description: multimedia player and streamer

Package: htop
Version: 3.3.0
Homepage: https://htop.dev/
Description: interactive processes viewer

Package: foobar
Version: 1.0

Version: 9.9
Description: no identifier here
";

    /// Serves canned metadata text.
    struct FixtureSource {
        text: parking_lot::Mutex<String>,
    }

    impl FixtureSource {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: parking_lot::Mutex::new(text.to_string()),
            })
        }

        fn replace(&self, text: &str) {
            *self.text.lock() = text.to_string();
        }
    }

    #[async_trait]
    impl MetadataSource for FixtureSource {
        fn name(&self) -> &str {
            "fixture"
        }

        async fn fetch(&self, _cancel: &CancellationToken) -> Result<Vec<PackageRecord>, SyncError> {
            Ok(apt::parse_dumpavail(&self.text.lock()))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MetadataSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _cancel: &CancellationToken) -> Result<Vec<PackageRecord>, SyncError> {
            Err(SyncError::CommandFailed {
                command: "apt-cache dumpavail".to_string(),
                status: "exit status: 100".to_string(),
                stderr: "E: Could not open lock file".to_string(),
            })
        }
    }

    /// Database wrapper that refuses to insert one package id.
    struct RejectingStore {
        inner: Database,
        reject: &'static str,
    }

    impl PackageStore for RejectingStore {
        fn get_package(&self, platform_id: &str, id: &str) -> anyhow::Result<Option<Package>> {
            self.inner.get_package(platform_id, id)
        }
        fn insert_package(&self, package: Package) -> anyhow::Result<Package> {
            if package.id == self.reject {
                anyhow::bail!("constraint violation for {}", package.id);
            }
            self.inner.insert_package(package)
        }
        fn update_package(&self, package: Package) -> anyhow::Result<()> {
            self.inner.update_package(package)
        }
        fn get_packages_by_platform(&self, platform_id: &str) -> anyhow::Result<Vec<Package>> {
            self.inner.get_packages_by_platform(platform_id)
        }
        fn remove_package(&self, platform_id: &str, id: &str) -> anyhow::Result<bool> {
            self.inner.remove_package(platform_id, id)
        }
    }

    impl PlatformStore for RejectingStore {
        fn get_all_platforms(&self) -> anyhow::Result<Vec<Platform>> {
            self.inner.get_all_platforms()
        }
        fn get_platform(&self, id: &str) -> anyhow::Result<Option<Platform>> {
            self.inner.get_platform(id)
        }
        fn insert_platform(&self, platform: Platform) -> anyhow::Result<Platform> {
            self.inner.insert_platform(platform)
        }
        fn update_platform(
            &self,
            id: &str,
            changes: UpdatePlatformRequest,
        ) -> anyhow::Result<Option<Platform>> {
            self.inner.update_platform(id, changes)
        }
        fn delete_platform(&self, id: &str) -> anyhow::Result<bool> {
            self.inner.delete_platform(id)
        }
    }

    fn seeded_db() -> Arc<Database> {
        let db = Database::in_memory().unwrap();
        db.seed_default_platforms().unwrap();
        Arc::new(db)
    }

    fn comparable(mut packages: Vec<Package>) -> Vec<Package> {
        let epoch = DateTime::<Utc>::default();
        packages.sort_by(|a, b| a.id.cmp(&b.id));
        for package in &mut packages {
            package.created_at = epoch;
            package.updated_at = epoch;
        }
        packages
    }

    #[test]
    fn test_popularity_score() {
        assert_eq!(popularity_score("curl"), 100);
        assert_eq!(popularity_score("git"), 90);
        assert_eq!(popularity_score("code"), 40);
        assert_eq!(popularity_score("obscure-lib"), DEFAULT_POPULARITY_SCORE);
    }

    #[test]
    fn test_record_requires_identifier() {
        let parsed = control::ParsedRecord {
            description: Some("orphan".to_string()),
            ..Default::default()
        };
        assert!(PackageRecord::from_parsed(parsed).is_none());
    }

    #[tokio::test]
    async fn test_sync_platform_upserts_in_order() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", FixtureSource::new(FIXTURE));

        let run = tracker.start();
        let report = fetcher.sync_platform("ubuntu", &run).await.unwrap();
        assert_eq!(report.added, 3);
        assert_eq!(report.updated, 0);
        assert_eq!(report.failed, 0);
        assert!(!report.skipped);

        let vlc = db.get_package("ubuntu", "vlc").unwrap().unwrap();
        assert_eq!(vlc.package_type, PackageType::Gui);
        assert_eq!(vlc.category.as_deref(), Some("video"));
        let htop = db.get_package("ubuntu", "htop").unwrap().unwrap();
        assert_eq!(htop.homepage_url.as_deref(), Some("https://htop.dev/"));
        // "viewer" is a GUI keyword
        assert_eq!(htop.package_type, PackageType::Gui);
        let foobar = db.get_package("ubuntu", "foobar").unwrap().unwrap();
        assert_eq!(foobar.package_type, PackageType::Cli);
        assert_eq!(foobar.description, None);
    }

    #[tokio::test]
    async fn test_sync_twice_is_idempotent() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", FixtureSource::new(FIXTURE));

        fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        let first = comparable(db.get_all_packages().unwrap());

        let report = fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.updated, 3);

        let second = comparable(db.get_all_packages().unwrap());
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_keeps_identity_and_created_at() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let source = FixtureSource::new("Package: vlc\nVersion: 3.0.20\n");
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", source.clone());

        fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        let before = db.get_package("ubuntu", "vlc").unwrap().unwrap();

        source.replace("Package: vlc\nVersion: 3.0.21\nDescription: media player\n");
        fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        let after = db.get_package("ubuntu", "vlc").unwrap().unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.platform_id, "ubuntu");
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.version.as_deref(), Some("3.0.21"));
        assert_eq!(after.description.as_deref(), Some("media player"));
    }

    #[tokio::test]
    async fn test_record_failure_does_not_abort_batch() {
        let inner = Database::in_memory().unwrap();
        inner.seed_default_platforms().unwrap();
        let store = Arc::new(RejectingStore {
            inner,
            reject: "htop",
        });
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(store.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", FixtureSource::new(FIXTURE));

        let report = fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(report.failed, 1);
        assert!(store.get_package("ubuntu", "foobar").unwrap().is_some());
        assert!(store.get_package("ubuntu", "htop").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_source_failure_is_fatal_for_platform() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", Arc::new(FailingSource));

        let err = fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap_err();
        assert!(err.is_source_failure());
        assert!(db.get_packages_by_platform("ubuntu").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_platform_and_manager() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain);

        let err = fetcher.sync_platform("plan9", &tracker.start()).await.unwrap_err();
        assert!(matches!(err, SyncError::PlatformNotFound(_)));

        let now = Utc::now();
        db.insert_platform(Platform {
            id: "gentoo".to_string(),
            name: "Gentoo".to_string(),
            package_manager: "emerge".to_string(),
            icon: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        let err = fetcher.sync_platform("gentoo", &tracker.start()).await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedPackageManager { .. }));

        let report = fetcher.sync_platform("fedora", &tracker.start()).await.unwrap();
        assert!(report.skipped);
    }

    #[tokio::test]
    async fn test_sync_all_continues_past_failures() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", Arc::new(FailingSource))
            .with_source("brew", FixtureSource::new(FIXTURE));

        let outcomes = fetcher.sync_all_platforms(&tracker.start()).await.unwrap();
        let ids: Vec<&str> = outcomes.iter().map(|o| o.platform_id.as_str()).collect();
        assert_eq!(ids, vec!["arch", "fedora", "ubuntu", "windows", "macos"]);

        let ubuntu = outcomes.iter().find(|o| o.platform_id == "ubuntu").unwrap();
        assert!(ubuntu.result.is_err());
        let macos = outcomes.iter().find(|o| o.platform_id == "macos").unwrap();
        assert_eq!(macos.result.as_ref().unwrap().added, 3);
        assert_eq!(db.get_packages_by_platform("macos").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_upsert() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", FixtureSource::new(FIXTURE));

        let run = tracker.start();
        tracker.cancel();
        let err = fetcher.sync_platform("ubuntu", &run).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert!(db.get_packages_by_platform("ubuntu").unwrap().is_empty());
        assert_eq!(tracker.status().progress.message, "Sync cancelled");
    }

    #[tokio::test]
    async fn test_stale_policy() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let source = FixtureSource::new(FIXTURE);

        let retaining = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", source.clone());
        retaining.sync_platform("ubuntu", &tracker.start()).await.unwrap();

        source.replace("Package: vlc\nVersion: 3.0.21\n");
        let report = retaining.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(db.get_packages_by_platform("ubuntu").unwrap().len(), 3);

        let removing = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Remove)
            .with_source("apt", source.clone());
        let report = removing.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        assert_eq!(report.removed, 2);
        let remaining = db.get_packages_by_platform("ubuntu").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "vlc");
    }

    #[tokio::test]
    async fn test_remove_policy_keeps_catalog_on_empty_fetch() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let source = FixtureSource::new(FIXTURE);
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Remove)
            .with_source("apt", source.clone());
        fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();

        source.replace("");
        let report = fetcher.sync_platform("ubuntu", &tracker.start()).await.unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(db.get_packages_by_platform("ubuntu").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_all_fails_when_cancelled_between_platforms() {
        let db = seeded_db();
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::new(db.clone(), tracker.clone(), StalePackagePolicy::Retain)
            .with_source("apt", FixtureSource::new(FIXTURE));

        let run = tracker.start();
        tracker.cancel();
        let err = fetcher.sync_all_platforms(&run).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert!(db.get_all_packages().unwrap().is_empty());
    }
}
