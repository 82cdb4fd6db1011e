//! Master binary

use clap::{Parser, Subcommand};
use segkv::master::http::create_router;
use segkv::{MasterConfig, MasterService};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "segkv-master")]
#[command(about = "segkv master: segment and object coordination")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the master service
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "50051")]
        port: u16,

        /// Maximum worker threads (capped at hardware concurrency)
        #[arg(long, default_value = "4")]
        max_threads: usize,

        /// Enable the background garbage collector
        #[arg(long)]
        enable_gc: bool,

        /// Seconds before an unfinished put transaction is revoked
        #[arg(long)]
        put_timeout: Option<u64>,

        /// Seconds between garbage collection sweeps
        #[arg(long)]
        gc_interval: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            max_threads,
            enable_gc,
            put_timeout,
            gc_interval,
        } => {
            // File config first, CLI flags take priority.
            let mut config = MasterConfig::load();
            config.bind_addr.set_port(port);
            config.max_threads = max_threads;
            config.enable_gc = enable_gc;
            if let Some(secs) = put_timeout {
                config.put_timeout_secs = secs;
            }
            if let Some(secs) = gc_interval {
                config.gc_interval_secs = secs;
            }

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.worker_threads())
                .enable_all()
                .build()?;
            runtime.block_on(serve(config))
        }
    }
}

async fn serve(config: MasterConfig) -> anyhow::Result<()> {
    tracing::info!(
        addr = %config.bind_addr,
        enable_gc = config.enable_gc,
        max_threads = config.worker_threads(),
        "master service starting"
    );

    let service = Arc::new(MasterService::new(config.clone()));
    let gc = service.start_gc();

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let router = create_router(service);

    tracing::info!("master service ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    if let Some(gc) = gc {
        gc.shutdown().await;
    }
    Ok(())
}
