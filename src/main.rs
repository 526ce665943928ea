//! Chat Relay Server
//!
//! Entry point for the streaming chat backend.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;

use chat_relay::config::AppConfig;
use chat_relay::{server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (M-LOG-STRUCTURED)
    telemetry::init();

    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    server::start_server(config).await
}
