mod cli;
mod reclaim;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use iris_axum::{iris, IrisState};
use iris_blob::{MemoryStore, S3CompatibleStore, TransportRegistry, UrlSigner};
use iris_core::{IdGenerator, IrisConfig, Passthrough, Transformer};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use cli::CliArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    telemetry::init()?;

    let config = IrisConfig::load(args.config.as_deref()).context("loading configuration")?;
    let signer = UrlSigner::from_env().context("reading URL signing keys")?;
    if signer.is_none() {
        tracing::warn!("signing keys not set, public URLs will be unsigned");
    }
    let ids = IdGenerator::new().context("starting the id generator")?;
    let registry = build_registry(&config).await;
    let transformer: Arc<dyn Transformer> = Arc::new(Passthrough::new());

    let addr = args.listen_addr(&config);
    let free_mem_interval = config.server.free_mem_interval;
    let log_mem_stats = config.server.log_mem_stats;
    log_startup_info(&addr, &config, &registry);

    let state = IrisState::new(config, ids, registry, transformer, signer);
    let shutdown = CancellationToken::new();
    let reclaim = reclaim::spawn(
        state.pool.clone(),
        free_mem_interval,
        log_mem_stats,
        shutdown.clone(),
    );
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let served = iris(state).listen(addr, shutdown.clone()).await;
    shutdown.cancel();
    if let Some(handle) = reclaim {
        let _ = handle.await;
    }
    served
}

async fn build_registry(config: &IrisConfig) -> TransportRegistry {
    let mut builder = TransportRegistry::builder();
    if config.storage.s3.enabled {
        builder = builder.register(Arc::new(S3CompatibleStore::connect(&config.storage.s3).await));
    }
    if config.storage.memory.enabled {
        builder = builder.register(Arc::new(MemoryStore::new()));
    }
    builder.build()
}

fn log_startup_info(addr: &str, config: &IrisConfig, registry: &TransportRegistry) {
    if config.server.debug {
        tracing::info!(addr, ?config, "starting iris in debug mode");
    } else {
        tracing::info!(
            addr,
            storage = %config.server.storage,
            bucket = %config.storage.bucket,
            backends = ?registry.schemes(),
            max_conns = config.server.max_conns,
            max_file_size = config.server.max_file_size,
            "starting iris"
        );
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
    shutdown.cancel();
}
