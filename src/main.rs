#![cfg(not(tarpaulin_include))]

use excelviz::app;
use excelviz::config::Config;
use std::env;
use std::net::SocketAddr;

/// Starts the ExcelViz web server.
///
/// Configuration comes from the environment (see `Config::from_env`). An
/// optional first argument overrides the listen address, e.g.
/// `excelviz 0.0.0.0:8080`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::from_env();

    let args: Vec<String> = env::args().collect();
    if let Some(addr) = args.get(1) {
        config.bind_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("invalid listen address {:?}: {}", addr, e))?;
    }

    app::run(config).await
}
