mod app;
mod config;
mod handlers;
mod state;
mod storage;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use listenfd::ListenFd;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tablestore_core::{storage::TableStore, TableConnector};

use crate::{
    app::create_app,
    config::{AzureTableSettings, Config},
    state::{AppState, DEFAULT_TABLE_NAME},
    storage::InMemoryStore,
};

/// Table storage backend to serve from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Azure Table Storage or a compatible emulator
    Azure,
    /// Process-local store; data is lost on exit
    Memory,
}

/// Tablestore - REST front end for Azure Table Storage entities
#[derive(Parser, Debug)]
#[command(name = "tablestore")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000", env = "PORT")]
    port: u16,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = Backend::Azure, env = "TABLESTORE_BACKEND")]
    backend: Backend,

    /// Storage account name
    #[arg(long, env = "AZURE_STORAGE_ACCOUNT")]
    storage_account: Option<String>,

    /// Storage account access key (base64)
    #[arg(long, env = "AZURE_STORAGE_KEY", hide_env_values = true)]
    storage_key: Option<String>,

    /// Table used when a request does not name one
    #[arg(long, default_value = DEFAULT_TABLE_NAME, env = "AZURE_TABLE_NAME")]
    table_name: String,

    /// Table service endpoint override, e.g. http://127.0.0.1:10002/devstoreaccount1
    #[arg(long, env = "AZURE_TABLE_ENDPOINT")]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tablestore=debug,tablestore_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let store = init_store(&cli, &config)?;

    let state = AppState::new(TableConnector::new(store, cli.table_name.clone()));

    // Build the application router
    let app = create_app(state);

    // Auto-reload support via listenfd
    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        // If we are given a tcp listener on listen fd 0, use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // Otherwise fall back to CLI-specified host:port
        None => {
            let addr = format!("{}:{}", cli.host, cli.port);
            TcpListener::bind(&addr).await?
        }
    };

    tracing::info!("listening on {}", listener.local_addr()?);

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Build the storage backend selected on the command line.
fn init_store(cli: &Cli, config: &Config) -> Result<Arc<dyn TableStore>> {
    match cli.backend {
        Backend::Memory => {
            tracing::info!(
                page_size = config.memory_page_size,
                table = %cli.table_name,
                "Using in-memory table store"
            );
            Ok(Arc::new(InMemoryStore::with_page_size(
                config.memory_page_size,
            )))
        }
        Backend::Azure => {
            let settings = AzureTableSettings::new(
                cli.storage_account.clone(),
                cli.storage_key.clone(),
                cli.table_name.clone(),
                cli.endpoint.clone(),
            )?;
            init_azure_store(&settings, config)
        }
    }
}

#[cfg(feature = "azure")]
fn init_azure_store(settings: &AzureTableSettings, config: &Config) -> Result<Arc<dyn TableStore>> {
    let store = storage::AzureTableStore::new(settings, config.http_timeout())?;

    tracing::info!(
        endpoint = store.endpoint(),
        account = %settings.storage_account,
        table = %settings.table_name,
        timeout_seconds = config.http_timeout_seconds,
        "Using Azure table store"
    );
    Ok(Arc::new(store))
}

#[cfg(not(feature = "azure"))]
fn init_azure_store(
    _settings: &AzureTableSettings,
    _config: &Config,
) -> Result<Arc<dyn TableStore>> {
    anyhow::bail!("built without the `azure` feature; use --backend memory")
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
