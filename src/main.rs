//! `fleetctl`: administrative CLI entry point and composition root.

use anyhow::{Context, Result};
use clap::Parser;

use fleet_core::cli::Cli;
use fleet_core::infrastructure::config::ConfigLoader;
use fleet_core::infrastructure::database::{all_embedded_migrations, create_pool, verify_connection, Migrator, PoolConfig};
use fleet_core::infrastructure::logging;
use fleet_core::service::FleetService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("failed to load configuration")?;
    logging::init(&config.logging).context("failed to initialize logging")?;

    let database_url = format!("sqlite://{}", config.db_path);
    let pool_config = PoolConfig { max_connections: config.db_max_connections, min_connections: config.db_min_connections, ..Default::default() };
    let pool = create_pool(&database_url, Some(pool_config)).await.context("failed to open database pool")?;

    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("failed to run database migrations")?;
    verify_connection(&pool).await.context("database self-test failed")?;

    let service = FleetService::new(pool, config);

    let exit_code = fleet_core::cli::run(cli, &service).await;
    std::process::exit(exit_code);
}
