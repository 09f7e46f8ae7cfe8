//! Terminal client for the chat server.
//!
//! Prints whatever the server sends and forwards stdin lines to it.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin room_chat_client
//! cargo run --bin room_chat_client -- --host 10.0.0.5 --port 5555
//! ```

use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, error};

use room_chat::logger::setup_logger;
use room_chat::message::QUIT_COMMAND;
use room_chat::ClientArgs;

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_CRATE_NAME"), "warn");

    let args = ClientArgs::parse();
    let target = args.target();

    println!("[CONNECTING] Connecting to {}...", target);
    let stream = match TcpStream::connect(&target).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Could not connect to {}: {}", target, e);
            eprintln!("Make sure the server is running!");
            std::process::exit(1);
        }
    };
    println!("[CONNECTED] Connected to server at {}", target);

    let (mut server_rx, mut server_tx) = stream.into_split();

    // Server -> stdout, unframed
    let mut receive_task = tokio::spawn(async move {
        let mut stdout = io::stdout();
        let mut buf = [0u8; 1024];
        loop {
            match server_rx.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if stdout.write_all(&buf[..n]).await.is_err() || stdout.flush().await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Read from server failed: {}", e);
                    break;
                }
            }
        }
        println!("\n[DISCONNECTED] Connection to server lost.");
    });

    // stdin -> server
    let send_task = async move {
        let mut lines = BufReader::new(io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if server_tx.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                break;
            }
            if line.trim().eq_ignore_ascii_case(QUIT_COMMAND) {
                println!("[INFO] Leaving chat room...");
                break;
            }
        }
        let _ = server_tx.shutdown().await;
    };

    tokio::select! {
        _ = &mut receive_task => {}
        _ = send_task => {
            // Let the server's last words arrive before exiting
            let _ = tokio::time::timeout(std::time::Duration::from_secs(1), receive_task).await;
        }
    }
}
