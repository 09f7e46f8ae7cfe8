//! Error types for the chat server
//!
//! Defines session-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::RoomId;

/// Application-level errors
///
/// Covers both fatal errors (session or listener termination) and
/// menu errors (send a notice to the client and show the menu again).
#[derive(Debug, Error)]
pub enum AppError {
    /// Socket IO error (fatal for its scope)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client's writer channel is gone (fatal for the session)
    #[error(transparent)]
    Send(#[from] SendError),

    /// Peer sent more than the line limit without a newline
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Peer closed the connection while the server expected input
    #[error("Peer disconnected")]
    PeerDisconnected,

    /// A room with this ID is already registered
    #[error("Room already exists: {0}")]
    RoomAlreadyExists(RoomId),

    /// No room registered under this ID
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Menu input was not one of the offered choices
    #[error("Invalid choice: {0:?}")]
    InvalidChoice(String),
}

impl AppError {
    /// Whether the session can report this to the client and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::RoomAlreadyExists(_) | AppError::RoomNotFound(_) | AppError::InvalidChoice(_)
        )
    }
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
