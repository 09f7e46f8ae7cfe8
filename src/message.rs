//! Message protocol definitions
//!
//! Plain-text protocol: the server writes the `Display` rendering of a
//! `ServerMessage`, the client answers menu prompts with a `MenuChoice`
//! line and then sends free-form chat lines.

use std::fmt;

use crate::error::AppError;
use crate::registry::RoomSummary;

/// Chat command that ends the session (compared case-insensitively)
pub const QUIT_COMMAND: &str = "/quit";

const MENU: &str = "
========== CHAT ROOM MENU ==========
1. List all chat rooms
2. Create a new chat room
3. Join an existing chat room
4. Exit
====================================
Enter your choice (1-4): ";

/// Menu selection sent by the client during onboarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    ListRooms,
    CreateRoom,
    JoinRoom,
    Exit,
}

impl MenuChoice {
    /// Parse a menu answer ("1" to "4", surrounding whitespace ignored)
    pub fn parse(input: &str) -> Result<Self, AppError> {
        match input.trim() {
            "1" => Ok(Self::ListRooms),
            "2" => Ok(Self::CreateRoom),
            "3" => Ok(Self::JoinRoom),
            "4" => Ok(Self::Exit),
            other => Err(AppError::InvalidChoice(other.to_string())),
        }
    }
}

/// Server → Client message
///
/// Every byte a client receives is one of these, rendered via `Display`.
/// Prompts carry no trailing newline.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    AskUsername,
    Menu,
    /// Snapshot of the registry, ordered by room ID
    RoomList(Vec<RoomSummary>),
    AskNewRoomId,
    AskRoomName,
    RoomCreated { name: String },
    AskJoinRoomId,
    /// Private greeting for the member who just entered
    Welcome { room_name: String },
    UserJoined { username: String },
    UserLeft { username: String },
    Chat { from: String, content: String },
    Goodbye,
    Error { message: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::AskUsername => f.write_str("Enter your username: "),
            ServerMessage::Menu => f.write_str(MENU),
            ServerMessage::RoomList(rooms) if rooms.is_empty() => {
                f.write_str("\nNo chat rooms available. Create one!\n")
            }
            ServerMessage::RoomList(rooms) => {
                f.write_str("\n===== Available Chat Rooms =====\n")?;
                for room in rooms {
                    writeln!(
                        f,
                        "Room ID: {} | Name: {} | Users: {}",
                        room.id, room.name, room.member_count
                    )?;
                }
                f.write_str("================================\n")
            }
            ServerMessage::AskNewRoomId => f.write_str("Enter new room ID (e.g., 101): "),
            ServerMessage::AskRoomName => f.write_str("Enter room name: "),
            ServerMessage::RoomCreated { name } => {
                writeln!(f, "Room '{}' created successfully!", name)
            }
            ServerMessage::AskJoinRoomId => f.write_str("Enter room ID to join: "),
            ServerMessage::Welcome { room_name } => {
                writeln!(f, "[SYSTEM] Welcome to {}! Start chatting...", room_name)
            }
            ServerMessage::UserJoined { username } => {
                write!(f, "\n[SYSTEM] {} joined the room!\n", username)
            }
            ServerMessage::UserLeft { username } => {
                writeln!(f, "[SYSTEM] {} left the room.", username)
            }
            ServerMessage::Chat { from, content } => writeln!(f, "[{}]: {}", from, content),
            ServerMessage::Goodbye => f.write_str("Goodbye!\n"),
            ServerMessage::Error { message } => writeln!(f, "{}", message),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::RoomAlreadyExists(room_id) => {
                format!("Room {} already exists. Try joining it.", room_id)
            }
            AppError::RoomNotFound(room_id) => {
                format!("Room {} does not exist. Try creating it.", room_id)
            }
            AppError::InvalidChoice(_) => "Invalid choice. Try again.".to_string(),
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        };
        ServerMessage::Error { message }
    }
}
