use anyhow::{anyhow, Result};
use dyncrab::dyndns::SystemClock;
use dyncrab::error::Error::DNSError;
use dyncrab::{Config, Engine, InMemoryBindingStore, Shared};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("dyncrab".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let store = Arc::new(InMemoryBindingStore::new());
    let mut registry = config.registry(store.clone(), Arc::new(SystemClock))?;
    let engine = Engine::new(registry.freeze(), config.upstream_configured());

    for addr in &config.dns_udp_bind_addrs {
        tracing::info!("DNS listening on UDP {addr}");
    }
    for addr in &config.dns_tcp_bind_addrs {
        tracing::info!("DNS listening on TCP {addr}");
    }
    let mut dns_servers = JoinSet::new();
    for dns_server in dyncrab::dns::new(config.clone(), engine).await? {
        dns_servers.spawn(dns_server.block_until_done());
    }

    let api_handle = config.api_bind_addr.map(|addr| {
        tracing::info!("API listening on {addr}");
        tokio::spawn(dyncrab::api::new(config.clone(), store.clone(), addr))
    });
    let api_done = async {
        match api_handle {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Some(Ok(dns_res)) = dns_servers.join_next() => {
            if let Err(err) = dns_res {
                return Err(DNSError(err).into())
            }
        }
        Ok(api_res) = api_done => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dyncrab=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<Shared> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            tracing::debug!("loaded config from {config_file}");
            let config = Config::try_from_file(&config_file)?;
            Ok(Arc::new(config))
        }
    }
}
