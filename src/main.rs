//! Task tracker server
//!
//! HTTP API for personal, owner-scoped task lists.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use task_tracker::auth;
use task_tracker::cli::{Cli, Command};
use task_tracker::config::{Config, ConfigLoader, StoreBackend};
use task_tracker::logging::{self, LogTarget};
use task_tracker::server::{self, AppState};
use task_tracker::service::TaskService;
use task_tracker::store::{Database, MemoryStore, TaskStore};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let loader = ConfigLoader::load(cli.config.as_deref())?;
    for source in loader.sources() {
        debug!(path = %source.display(), "Using config file");
    }
    let mut config = loader.into_config();
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command() {
        Command::PrintConfig => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Command::Serve => run_server(config).await,
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn TaskStore>> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            config.ensure_db_dir()?;
            let db = Database::open(&config.store.db_path)?;
            info!("Database: {:?}", config.store.db_path);
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; tasks are lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    info!("Starting task tracker v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config)?;
    let service = Arc::new(TaskService::new(store, config.query.clone()));
    let authenticator = auth::from_config(&config.auth)?;
    info!(mode = ?config.auth.mode, "Authentication configured");

    let router = server::build_router(
        AppState::new(service, authenticator),
        &config.server.cors_origins,
    );

    server::start_server(config.socket_addr()?, router, server::shutdown_signal()).await
}
