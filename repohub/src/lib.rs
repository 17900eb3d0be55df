pub mod config;
pub mod db;
pub mod error;
pub mod fetchers;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod script;
pub mod sync;

use std::sync::Arc;

use config::Config;
use db::Database;
use fetchers::MetadataFetcher;
use sync::SyncCoordinator;
use sync::status::SyncTracker;

// Application state for the API server
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tracker: Arc<SyncTracker>,
    pub coordinator: Arc<SyncCoordinator>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State wired to the real package-manager sources.
    pub fn new(db: Arc<Database>, config: Config) -> Self {
        let tracker = Arc::new(SyncTracker::new());
        let fetcher = MetadataFetcher::from_config(db.clone(), tracker.clone(), &config);
        Self::with_fetcher(db, config, tracker, fetcher)
    }

    /// `fetcher` must report into `tracker`.
    pub fn with_fetcher(
        db: Arc<Database>,
        config: Config,
        tracker: Arc<SyncTracker>,
        fetcher: MetadataFetcher,
    ) -> Self {
        let coordinator = Arc::new(SyncCoordinator::new(fetcher, tracker.clone()));
        Self {
            db,
            tracker,
            coordinator,
            config: Arc::new(config),
        }
    }
}
