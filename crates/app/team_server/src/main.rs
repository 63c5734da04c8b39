//! Team API server binary.
//!
//! `team serve` runs the HTTP API (the default), `team migrate` applies
//! migrations and seeds the permission catalogue, `team version` prints the
//! version.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use team_api::config::ApiConfig;
use team_core::cache::auth::REAP_INTERVAL;
use team_core::cache::entity::{ENTITY_TTL, SWEEP_INTERVAL};
use team_core::cache::{AuthCache, EntityCache};
use team_core::store::PgStore;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "team", about = "Team account and role service")]
struct Cli {
    /// Env file loaded before reading the configuration.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API.
    Serve {
        /// Address to listen on; overrides `BIND_ADDR`.
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,

        /// PostgreSQL connection URL; overrides `DATABASE_URL`.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Run database migrations and seed the permissions.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Print the version.
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.config {
        Some(path) => {
            dotenvy::from_filename(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,team_api=debug,team_core=debug".parse().unwrap()),
        )
        .init();

    match cli.command.unwrap_or(Command::Serve {
        bind: None,
        database_url: None,
    }) {
        Command::Version => {
            println!("team {}", team_core::version());
            Ok(())
        }
        Command::Migrate { database_url } => {
            let database_url = database_url
                .or_else(|| std::env::var("DATABASE_URL").ok())
                .unwrap_or_else(|| team_api::config::DEFAULT_DATABASE_URL.into());
            let pool = connect(&database_url, 1).await?;
            info!("running database migrations");
            team_api::migrate(&pool).await?;
            info!("migrations complete");
            Ok(())
        }
        Command::Serve { bind, database_url } => {
            let mut config = ApiConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(database_url) = database_url {
                config.pg_connection_url = database_url;
            }
            serve(config).await
        }
    }
}

async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
}

async fn serve(config: ApiConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        bind_addr = %config.bind_addr,
        identity_endpoint = %config.identity_endpoint,
        max_connections = config.db_max_connections,
        "starting team"
    );

    let pool = connect(&config.pg_connection_url, config.db_max_connections).await?;

    info!("running database migrations");
    team_api::migrate(&pool).await?;

    let (auth_cache, auth_reaper) = AuthCache::start(REAP_INTERVAL);
    let (entity_cache, entity_sweeper) = EntityCache::start(ENTITY_TTL, SWEEP_INTERVAL);

    let state = team_api::AppState::new(
        Arc::new(PgStore::new(pool.clone())),
        config.clone(),
        Arc::clone(&auth_cache),
        Arc::clone(&entity_cache),
    );
    let app = team_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let result = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await;

    auth_cache.shutdown();
    entity_cache.shutdown();
    let _ = tokio::join!(auth_reaper, entity_sweeper);
    pool.close().await;
    info!("team stopped");

    result?;
    Ok(())
}
