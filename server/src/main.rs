use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

use edu_desk::config::Config;
use edu_desk::migration::{MigrationTarget, Migrator};
use edu_desk::persistence::{BackendSelector, Database};
use edu_desk::service::{self, AppState};
use edu_desk::storage::FilesystemObjectStorage;

#[derive(Debug, Parser)]
#[command(name = "edu-desk", about = "Edu-Desk server and migration tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run a migration step and print its report
    Migrate {
        /// full, academic, users, notes or interactions
        #[arg(default_value = "full")]
        step: String,
    },
    /// Print the migration status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _log_guard = init_tracing(&config)?;

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let selector = BackendSelector::initialize(config.document_store_dir.as_deref());
    let repository = selector.repository(db.pool());

    let object_storage = match &config.object_store {
        Some(object_store) => {
            let connected =
                FilesystemObjectStorage::connect(object_store.dir.clone(), &object_store.public_url)
                    .await;
            match connected {
                Ok(storage) => {
                    tracing::info!(dir = %object_store.dir.display(), "Object storage ready");
                    Some(storage)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Object storage unavailable, files stay local");
                    None
                }
            }
        }
        None => None,
    };

    let migrator = Migrator::new(
        db.pool().clone(),
        selector.document_store().ok().cloned(),
        object_storage,
        config.uploads_dir.clone(),
        config.unresolved_references,
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let backend = repository.kind();
            let state = Arc::new(AppState::new(migrator, repository, config.admin_token.clone()));
            if state.admin_token.is_none() {
                tracing::warn!("EDU_DESK_ADMIN_TOKEN not set, admin routes reject every request");
            }
            let listener = tokio::net::TcpListener::bind(config.bind_addr)
                .await
                .with_context(|| format!("binding {}", config.bind_addr))?;
            tracing::info!(addr = %config.bind_addr, ?backend, "Edu-Desk server listening");

            axum::serve(listener, service::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            tracing::info!("Server stopped");
        }
        Commands::Migrate { step } => {
            let target: MigrationTarget = step.parse().map_err(anyhow::Error::msg)?;
            let report = migrator.run_step(target).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => {
            let status = migrator.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

/// Stdout logging, plus a daily-rotated file when `EDU_DESK_LOG_FILE` is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(
    config: &Config,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .context("EDU_DESK_LOG_FILE has no file name")?;
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
