use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::fetchers::helpers::run_command;
use crate::fetchers::{MetadataSource, PackageRecord, control};

/// Reads package metadata from the local apt cache.
pub struct AptSource {
    timeout: Duration,
    refresh_index: bool,
}

impl AptSource {
    pub fn new(timeout: Duration, refresh_index: bool) -> Self {
        Self {
            timeout,
            refresh_index,
        }
    }
}

/// Turns `apt-cache dumpavail` output into package records, in block order.
/// Blocks without an identifier are dropped.
pub fn parse_dumpavail(output: &str) -> Vec<PackageRecord> {
    control::parse_blocks(output)
        .into_iter()
        .filter_map(PackageRecord::from_parsed)
        .collect()
}

#[async_trait]
impl MetadataSource for AptSource {
    fn name(&self) -> &str {
        "apt"
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<PackageRecord>, SyncError> {
        if self.refresh_index {
            tracing::info!("Updating apt package lists...");
            run_command("apt-get", &["update"], self.timeout, cancel).await?;
        }

        tracing::info!("Getting package list...");
        let output = run_command("apt-cache", &["dumpavail"], self.timeout, cancel).await?;

        let packages = parse_dumpavail(&output);
        tracing::info!("Found {} packages", packages.len());
        Ok(packages)
    }
}
