use std::path::PathBuf;

use tokio::net::lookup_host;
use tracing_subscriber::EnvFilter;

use gamewatch::Engine;
use gamewatch::config::{Config, load_config};

fn init_json_logging() {
    if let Err(error) = tracing_log::LogTracer::init() {
        eprintln!(
            "logging bridge initialization failed (continuing with existing logger): {}",
            error
        );
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .finish();

    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("global logger initialization failed: {}", error);
    }
}

const CONFIG_PATH: &str = "config.toml";

async fn log_dns_probe() {
    match lookup_host(("api.telegram.org", 443)).await {
        Ok(mut addresses) => {
            if let Some(address) = addresses.next() {
                log::info!("dns_probe_ok host=api.telegram.org address={}", address);
            } else {
                log::warn!("dns_probe_degraded host=api.telegram.org reason=no_records");
            }
        }
        Err(error) => {
            log::warn!(
                "dns_probe_degraded host=api.telegram.org reason=lookup_failed error={}",
                error
            );
        }
    }
}

#[tokio::main]
async fn main() {
    init_json_logging();

    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| CONFIG_PATH.to_string()),
    );

    let config: Config = match load_config(&config_path) {
        Ok(config) => config,
        Err(error) => {
            log::error!("Configuration error: {}", error);
            return;
        }
    };

    log::info!("gamewatch is starting...");
    if config.sinks.chat_channel {
        log_dns_probe().await;
    }

    let engine = match Engine::from_config(config, Some(config_path)) {
        Ok(engine) => engine,
        Err(error) => {
            log::error!("Engine initialization failed: {}", error);
            return;
        }
    };

    engine.start().await;

    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("shutdown signal listener failed: {}", error);
    }
    log::info!("shutdown_requested");

    engine.stop().await;
}
