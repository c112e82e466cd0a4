//! Goo server
//!
//! Loads configuration, prepares the database, then serves HTTP and runs the
//! job runner side by side until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use goo_backend::config_helpers::{
    build_queue, database_config_from_config, emailer_config_from_config, parse_bind_address,
    runner_config_from_config,
};
use goo_backend::metrics::register_process_metrics;
use goo_backend::tracing_setup::install_tracing_from_config;
use goo_backend::{build_router, AppState};
use goo_db::Database;
use goo_email::Emailer;
use goo_job_queue::{HandlerRegistry, Runner};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "goo-server", version, about = "Goo newsletter server")]
struct Cli {
    /// Path to configuration file (toml, yaml or json)
    #[arg(short = 'c', long, env = "GOO_CONFIG_PATH")]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {e}");
        }
    }
    let cli = Cli::parse();

    let config = goo_config::load_config(cli.config_path.as_deref()).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    goo_config::validate_config(&config).context("invalid configuration")?;

    install_tracing_from_config(&config.logging);

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{e:#}"), "Error running server");
        return Err(e);
    }
    Ok(())
}

async fn run(config: goo_config::Config) -> anyhow::Result<()> {
    let db_cfg = database_config_from_config(&config);
    let pool = goo_db::create_pool(&db_cfg)
        .await
        .context("creating database pool")?;
    let db = Database::new(pool.clone());
    if config.database.auto_migrate {
        db.migrate_up().await.context("applying migrations")?;
        info!("Database migrations applied");
    }

    let registry = prometheus::Registry::new();
    register_process_metrics(&registry)?;
    let queue = build_queue(&config, pool);

    let emailer = Arc::new(Emailer::new(emailer_config_from_config(&config))?);
    let mut handlers = HandlerRegistry::new();
    goo_jobs::register_all(&mut handlers, emailer);
    let runner = Runner::new(
        queue.clone(),
        handlers,
        runner_config_from_config(&config),
        &registry,
    )?;

    let state = AppState::new(db, queue, registry)?
        .with_admin_password(config.admin.admin_password.clone())
        .with_metrics_password(config.admin.metrics_password.clone());
    let app = build_router(Arc::new(state));

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, base_url = %config.server.base_url(), "Listening");

    let server = async {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await;
        // Stop the runner too if the server exits on its own.
        shutdown.cancel();
        result
    };
    let (served, ()) = tokio::join!(server, runner.start(shutdown.clone()));
    served.context("serving http")?;

    info!("Stopped");
    Ok(())
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(%error, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }
    info!("Shutting down");
    shutdown.cancel();
}
