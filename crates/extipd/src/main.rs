//! extipd — the external-address controller daemon.
//!
//! Single binary that assembles the controller:
//! - State store (redb)
//! - Quota actor
//! - Tenant agent client
//! - Pool manager and address allocator
//! - REST API
//!
//! # Usage
//!
//! ```text
//! extipd serve --config /etc/extip/extip.toml --port 8889 --data-dir /var/lib/extip
//! extipd default-config > extip.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use extip_agent::HttpAgentClient;
use extip_alloc::{AddressAllocator, LinkBuilder, PoolManager};
use extip_api::ApiState;
use extip_core::ExtipConfig;
use extip_quota::{QuotaHandle, QuotaLimits};
use extip_state::StateStore;

#[derive(Parser)]
#[command(name = "extipd", about = "External address controller daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller and serve the REST API.
    Serve {
        /// Path to extip.toml. Built-in defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `controller.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `controller.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Base address for resource links (overrides `controller.api_url`).
        #[arg(long)]
        api_url: Option<String>,
    },

    /// Print the default configuration as TOML.
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,extipd=debug,extip=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
            api_url,
        } => {
            let mut config = match config {
                Some(path) => {
                    let loaded = ExtipConfig::from_file(&path)?;
                    info!(path = ?path, "configuration loaded");
                    loaded
                }
                None => ExtipConfig::default(),
            };
            if let Some(port) = port {
                config.controller.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.controller.data_dir = data_dir;
            }
            if let Some(api_url) = api_url {
                config.controller.api_url = api_url;
            }
            run_serve(config).await
        }
        Command::DefaultConfig => {
            print!("{}", ExtipConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

async fn run_serve(config: ExtipConfig) -> anyhow::Result<()> {
    info!("extip controller starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&config.controller.data_dir)?;
    let db_path = config.controller.data_dir.join("extip.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let limits = QuotaLimits::from_settings(&config.quota);
    info!(
        default_limit = ?limits.default_external_ips,
        overrides = limits.tenant_external_ips.len(),
        "quota actor starting"
    );
    let quota = QuotaHandle::spawn(limits);

    let agent = HttpAgentClient::new(config.agent.port, config.agent.timeout());
    info!(port = config.agent.port, timeout = ?config.agent.timeout(), "agent client initialized");

    let links = LinkBuilder::new(&config.controller.api_url);
    let state = ApiState {
        pools: PoolManager::new(Arc::new(store.clone()), links.clone()),
        allocator: AddressAllocator::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(quota),
            Arc::new(agent),
            links,
        ),
    };

    // ── Start API server ───────────────────────────────────────

    let router = extip_api::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.controller.port));

    info!(%addr, api_url = %config.controller.api_url, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("extip controller stopped");
    Ok(())
}
