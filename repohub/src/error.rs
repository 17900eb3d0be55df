use std::time::Duration;
use thiserror::Error;

/// Errors that abort a platform sync.
///
/// Per-record upsert failures never show up here; the fetcher counts and
/// logs them instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("platform {0} not found")]
    PlatformNotFound(String),

    #[error("unsupported package manager {package_manager} for platform {platform_id}")]
    UnsupportedPackageManager {
        platform_id: String,
        package_manager: String,
    },

    #[error("failed to execute {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{command} timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("sync cancelled")]
    Cancelled,

    #[error("a sync is already in progress")]
    AlreadyRunning,

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    /// True for failures caused by the external metadata source.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            SyncError::CommandSpawn { .. }
                | SyncError::CommandFailed { .. }
                | SyncError::CommandTimeout { .. }
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("no script template for package manager {0}")]
    UnsupportedPackageManager(String),
}
