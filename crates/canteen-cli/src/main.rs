//! Canteen command-line launcher
//!
//! Starts the process-wide scheduler, binds the dispatcher and serves until
//! interrupted.

mod config;

use anyhow::{Context, Result};
use canteen_sched::{Scheduler, ShutdownMode};
use canteen_server::{Dispatcher, ShutdownHandle, StoreFile};
use clap::{Parser, Subcommand};
use config::{Overrides, ServerConfig};
use std::path::PathBuf;
use std::thread;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "canteen")]
#[command(about = "Store registration server backed by a fixed worker pool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept connections until interrupted
    Serve {
        /// Interface to listen on
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,
        /// Store file path
        #[arg(long)]
        store: Option<PathBuf>,
        /// Config file (defaults to $CANTEEN_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Drop queued tasks on shutdown instead of running them
        #[arg(long)]
        discard: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canteen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            port,
            workers,
            store,
            config,
            discard,
        } => {
            let config = ServerConfig::load(config.as_deref())?.apply(Overrides {
                bind,
                port,
                workers,
                store_path: store,
                discard,
            });
            serve(config)
        }
    }
}

fn serve(config: ServerConfig) -> Result<()> {
    if Scheduler::configure(config.scheduler.clone()).is_err() {
        tracing::warn!("scheduler already configured, ignoring config");
    }
    let scheduler = Scheduler::global().context("failed to start worker pool")?;

    let addr = config.listen_addr();
    let dispatcher = Dispatcher::bind(
        addr.as_str(),
        scheduler,
        StoreFile::new(&config.store_path),
    )?;
    spawn_interrupt_listener(dispatcher.shutdown_handle())?;

    let served = dispatcher.serve();

    let mode = ShutdownMode::from_graceful(config.drain_on_shutdown);
    tracing::info!(pending = scheduler.pending_count(), mode = ?mode, "shutting down scheduler");
    scheduler.shutdown(mode);
    tracing::info!(pending = scheduler.pending_count(), "scheduler shut down");

    let handled = served.context("dispatcher failed")?;
    tracing::info!(handled, "canteen stopped");
    Ok(())
}

/// Trigger `handle` on Ctrl-C from a dedicated thread
fn spawn_interrupt_listener(handle: ShutdownHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    thread::Builder::new()
        .name("canteen-signal".to_string())
        .spawn(move || match runtime.block_on(tokio::signal::ctrl_c()) {
            Ok(()) => {
                tracing::info!("interrupt received, stopping dispatcher");
                handle.trigger();
            }
            Err(e) => tracing::error!(error = %e, "cannot listen for interrupt"),
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}
