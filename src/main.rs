use std::sync::Arc;

use filedrop::config::{AppState, Config};
use filedrop::{logger, server};

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Worker threads follow `server.workers`, otherwise one per CPU core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let state = AppState::new(cfg);

    // The storage directory must exist before the first request
    state.store.ensure_directory().await?;

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals))?;

    let remaining =
        server::start_server_loop(listener, state, Arc::clone(&signals.shutdown)).await;
    if remaining > 0 {
        logger::log_warning(&format!("Exiting with {remaining} connection(s) cut off"));
    }
    Ok(())
}
