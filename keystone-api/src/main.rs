//! # Keystone
//!
//! Entry point of the `keystone` binary.
//!
//! ## Usage
//!
//! ```bash
//! keystone migrate up
//! keystone serve --host 0.0.0.0 --port 8000 --workers 2
//! ```

use anyhow::Context;
use clap::Parser;
use keystone_api::{
    app::{build_router, AppState},
    cli::{Cli, Command, MigrateCommand, ServeArgs},
    config::Config,
};
use keystone_shared::{
    accounts::bootstrap_superuser,
    cache::{client::sanitize_url, CacheManager},
    db::{
        migrations::{get_migration_status, revert_migrations, run_migrations},
        pool::{close_pool, create_pool},
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.debug);
    if config.has_weak_jwt_secret() {
        tracing::warn!("JWT_SECRET_KEY is shorter than 32 bytes; use a longer key in production");
    }

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = cli.workers() {
        runtime.worker_threads(workers);
    }
    let runtime = runtime.build().context("Failed to start Tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Command::Serve(args) => serve(config, args).await,
            Command::Migrate(command) => migrate(config, command).await,
        }
    })
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "keystone_api=debug,keystone_shared=debug,tower_http=debug"
    } else {
        "keystone_api=info,keystone_shared=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if debug {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

async fn serve(config: Config, args: ServeArgs) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Keystone starting"
    );

    let pool = create_pool(config.database_config())
        .await
        .context("Failed to connect to the database")?;

    bootstrap_superuser(&pool, config.superuser.as_ref()).await;

    let cache = match config.cache_config() {
        None => {
            tracing::info!("Cache disabled");
            None
        }
        Some(cache_config) => {
            let url = sanitize_url(&cache_config.url);
            match CacheManager::connect(cache_config).await {
                Ok(cache) => {
                    tracing::info!(url = %url, "Cache connected");
                    Some(cache)
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Cache unavailable, continuing without it");
                    None
                }
            }
        }
    };

    let host = args.host.unwrap_or_else(|| config.api.host.clone());
    let port = args.port.unwrap_or(config.api.port);

    let state = AppState::new(pool.clone(), cache, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    tracing::info!("Server listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn migrate(config: Config, command: MigrateCommand) -> anyhow::Result<()> {
    let pool = create_pool(config.database_config())
        .await
        .context("Failed to connect to the database")?;

    match command {
        MigrateCommand::Up => {
            run_migrations(&pool).await.context("Failed to apply migrations")?;
        }
        MigrateCommand::Down { target } => {
            revert_migrations(&pool, target)
                .await
                .context("Failed to revert migrations")?;
        }
        MigrateCommand::Status => {}
    }

    let status = get_migration_status(&pool)
        .await
        .context("Failed to read migration status")?;
    println!(
        "applied: {}, pending: {}, latest: {}",
        status.applied_migrations,
        status.pending_migrations,
        status
            .latest_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    close_pool(pool).await;
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
