//! Multi-room Chat Server - Entry Point
//!
//! Parses the listen address, binds, and serves until Ctrl-C.

use clap::Parser;
use tracing::{error, info};

use room_chat::logger::setup_logger;
use room_chat::{ChatServer, ServerArgs};

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_chat=trace
    setup_logger(env!("CARGO_CRATE_NAME"), "info");

    let args = ServerArgs::parse();
    let addr = args.socket_addr();

    let server = match ChatServer::bind(addr).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = server.run_until(shutdown).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server stopped");
}
