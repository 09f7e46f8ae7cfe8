//! Multi-room TCP Chat Server Library
//!
//! A line-based chat server: each client picks a username, lists, creates
//! or joins a room, then exchanges text lines with the other members.
//!
//! # Architecture
//! - `ChatServer` accepts connections and spawns one `handler` task each
//! - `RoomRegistry` maps room IDs to rooms behind a single lock
//! - Each `Room` guards its own member set and fans messages out
//! - Every client has a writer task fed by an `mpsc` channel; rooms hold
//!   clones of that channel's sender
//!
//! # Example
//! ```ignore
//! use room_chat::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), room_chat::AppError> {
//!     let server = ChatServer::bind("0.0.0.0:5555".parse().unwrap()).await?;
//!     server.run_until(tokio::signal::ctrl_c()).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod logger;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use config::{ClientArgs, ServerArgs, DEFAULT_PORT};
pub use error::{AppError, SendError};
pub use handler::{handle_connection, Session};
pub use message::{MenuChoice, ServerMessage};
pub use registry::{RoomRegistry, RoomSummary};
pub use room::{Member, Room};
pub use server::ChatServer;
pub use types::{ClientId, RoomId};
