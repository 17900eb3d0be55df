use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What a sync does with packages that disappeared upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePackagePolicy {
    /// Keep them in the catalog.
    #[default]
    Retain,
    /// Delete them after a complete, uncancelled sync of their platform.
    Remove,
}

impl FromStr for StalePackagePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "remove" => Ok(Self::Remove),
            other => Err(format!("unknown stale package policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub server_port: u16,
    /// Zero disables the scheduled sync.
    pub sync_interval_hours: u64,
    pub sync_command_timeout: Duration,
    pub apt_update: bool,
    pub stale_package_policy: StalePackagePolicy,
    pub seed_platforms: bool,
    pub cryptomus_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./repohub.db".to_string(),
            server_port: 3000,
            sync_interval_hours: 24,
            sync_command_timeout: Duration::from_secs(600),
            apt_update: true,
            stale_package_policy: StalePackagePolicy::Retain,
            seed_platforms: true,
            cryptomus_enabled: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let stale_package_policy = match env::var("STALE_PACKAGE_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to retain", e);
                StalePackagePolicy::Retain
            }),
            Err(_) => defaults.stale_package_policy,
        };

        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(defaults.server_port),
            sync_interval_hours: env::var("SYNC_INTERVAL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(defaults.sync_interval_hours),
            sync_command_timeout: env::var("SYNC_COMMAND_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_command_timeout),
            apt_update: flag("APT_UPDATE", defaults.apt_update),
            stale_package_policy,
            seed_platforms: flag("SEED_PLATFORMS", defaults.seed_platforms),
            // Only an explicit "false" turns the support widget off
            cryptomus_enabled: env::var("CRYPTOMUS_ENABLED").map_or(true, |v| v != "false"),
        }
    }
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_package_policy_parse() {
        assert_eq!("retain".parse(), Ok(StalePackagePolicy::Retain));
        assert_eq!(" Remove ".parse(), Ok(StalePackagePolicy::Remove));
        assert!("purge".parse::<StalePackagePolicy>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.stale_package_policy, StalePackagePolicy::Retain);
        assert!(config.cryptomus_enabled);
        assert!(config.apt_update);
    }
}
