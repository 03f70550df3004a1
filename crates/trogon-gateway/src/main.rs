use std::error::Error;

use async_nats::jetstream;
use tokio::net::TcpListener;
use trogon_gateway::config::StoreBackend;
use trogon_gateway::store::{CounterStore, MemoryCounterStore, NatsKvCounterStore, nats_kv};
use trogon_gateway::upstream::Upstreams;
use trogon_gateway::{Gateway, GatewayConfig, serve};
use trogon_std::env::SystemEnv;
use trogon_std::time::SystemClock;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env(&SystemEnv);
    tracing::info!(
        port = config.port,
        store = ?config.store,
        origins = ?config.cors.allowed_origins(),
        "Starting trogon-gateway"
    );

    let result = match config.store {
        StoreBackend::Nats => {
            tracing::info!(
                servers = ?config.nats.servers,
                auth = config.nats.auth.description(),
                "Connecting to NATS"
            );
            let nats = nats_kv::connect(&config.nats).await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to connect to NATS");
                std::process::exit(1);
            });
            let store = NatsKvCounterStore::new(jetstream::new(nats), config.bucket_prefix.clone());
            run(config, store).await
        }
        StoreBackend::Memory => {
            tracing::warn!(
                "Using in-process rate-limit counters; quotas are not shared between instances"
            );
            run(config, MemoryCounterStore::new()).await
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Gateway exited with error");
        std::process::exit(1);
    }
}

async fn run<S: CounterStore>(config: GatewayConfig, store: S) -> Result<(), Box<dyn Error>> {
    let upstreams = Upstreams::new(config.upstreams)?;
    let gateway = Gateway::new(store, SystemClock, upstreams, config.cors);
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    serve(listener, gateway).await?;
    Ok(())
}
