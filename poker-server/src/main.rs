//! Planning poker server.
//!
//! Serves `poker-collab` rooms over WebSocket. Configured from the
//! environment:
//!
//! - `POKER_BIND_ADDR` (default `127.0.0.1:5000`)
//! - `POKER_BROADCAST_CAPACITY` (default 256)
//! - `POKER_OUTBOX_CAPACITY` (default 256)
//! - `RUST_LOG` (default `info`)

use log::{error, info, warn};
use poker_collab::{PokerServer, ServerConfig};

const BIND_ADDR_VAR: &str = "POKER_BIND_ADDR";
const BROADCAST_CAPACITY_VAR: &str = "POKER_BROADCAST_CAPACITY";
const OUTBOX_CAPACITY_VAR: &str = "POKER_OUTBOX_CAPACITY";

/// Build a config from `lookup`, keeping the default for anything unset
/// or unparsable.
fn config_from(lookup: impl Fn(&str) -> Option<String>) -> ServerConfig {
    let mut config = ServerConfig::default();

    if let Some(addr) = lookup(BIND_ADDR_VAR) {
        let addr = addr.trim();
        if addr.is_empty() {
            warn!("{BIND_ADDR_VAR} is empty, using {}", config.bind_addr);
        } else {
            config.bind_addr = addr.to_string();
        }
    }
    config.broadcast_capacity = capacity(&lookup, BROADCAST_CAPACITY_VAR, config.broadcast_capacity);
    config.outbox_capacity = capacity(&lookup, OUTBOX_CAPACITY_VAR, config.outbox_capacity);
    config
}

fn capacity(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: usize) -> usize {
    let Some(raw) = lookup(var) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            warn!("Invalid {var}={raw:?}, using {default}");
            default
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config_from(|var| std::env::var(var).ok());
    info!(
        "Starting poker server (broadcast capacity {}, outbox capacity {})",
        config.broadcast_capacity, config.outbox_capacity
    );

    let server = PokerServer::new(config);
    if let Err(e) = server.run().await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
