use clap::Parser;
use repohub::db::{Database, PlatformStore};
use repohub::{AppState, config::Config, routes, sync::scheduler};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// RepoHub - browse OS package catalogs and generate install scripts
#[derive(Parser, Debug)]
#[command(name = "repohub")]
#[command(version, about, long_about = None)]
struct Args {
    /// Disable the background metadata sync loop
    #[arg(long, default_value_t = false)]
    no_scheduler: bool,

    /// Sync all platforms once right after startup
    #[arg(long, default_value_t = false)]
    sync_on_start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let db = Arc::new(Database::new(&config.database_path)?);

    if config.seed_platforms {
        let seeded = db.seed_default_platforms()?;
        if seeded > 0 {
            tracing::info!("Seeded {} default platforms", seeded);
        }
    }

    tracing::info!("Database statistics:");
    tracing::info!("  Platforms: {}", db.get_all_platforms()?.len());
    tracing::info!("  Packages: {}", db.get_all_packages()?.len());

    let port = config.server_port;
    let interval_hours = config.sync_interval_hours;
    let state = AppState::new(db, config);

    if args.sync_on_start {
        let coordinator = state.coordinator.clone();
        tokio::spawn(async move { scheduler::run_scheduled_sync(&coordinator).await });
    }

    if args.no_scheduler {
        tracing::info!("Sync scheduler disabled via --no-scheduler flag");
    } else if interval_hours == 0 {
        tracing::info!("Sync scheduler disabled, SYNC_INTERVAL_HOURS is 0");
    } else {
        let coordinator = state.coordinator.clone();
        tokio::spawn(async move { scheduler::run_sync_loop(coordinator, interval_hours).await });
    }

    let app = routes::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
