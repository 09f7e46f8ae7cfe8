//! TCP connection handler
//!
//! Handles individual client connections: onboarding (username, menu,
//! room selection), the chat relay loop, and cleanup on exit.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::client::Client;
use crate::error::AppError;
use crate::message::{MenuChoice, ServerMessage, QUIT_COMMAND};
use crate::registry::RoomRegistry;
use crate::room::Room;
use crate::types::{ClientId, RoomId};

/// Buffer size for each client's outbound queue
pub const CLIENT_CHANNEL_CAPACITY: usize = 32;

/// Longest accepted input line in bytes, newline excluded
pub const MAX_LINE_BYTES: usize = 4096;

/// Handle a new TCP connection
///
/// Spawns the writer task, runs the session to completion, then removes
/// the client from its room and waits for queued output to be flushed.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<RoomRegistry>,
) -> Result<(), AppError> {
    let peer_addr = stream.peer_addr()?;
    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    let (read_half, write_half) = stream.into_split();

    // Create channel for server -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(CLIENT_CHANNEL_CAPACITY);
    let write_task = tokio::spawn(write_messages(client_id, write_half, msg_rx));

    let mut session = Session::new(
        Client::new(client_id, msg_tx),
        BufReader::new(read_half),
        registry,
        default_username(peer_addr),
    );

    let result = session.run().await;
    session.leave_room().await;
    drop(session);

    if let Err(e) = write_task.await {
        error!("Write task for {} failed: {}", client_id, e);
    }

    info!("Client {} ({}) disconnected", client_id, peer_addr);

    match result {
        Err(AppError::PeerDisconnected) => {
            debug!("Client {} closed the connection during onboarding", client_id);
            Ok(())
        }
        other => other,
    }
}

/// Username used when the client answers the prompt with a blank line
pub fn default_username(peer_addr: SocketAddr) -> String {
    format!("User_{}", peer_addr.port())
}

/// Drain the client's queue onto the socket
///
/// Ends when every sender is dropped or a write fails, then shuts the
/// write side down.
async fn write_messages<W>(client_id: ClientId, mut writer: W, mut msg_rx: mpsc::Receiver<ServerMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = msg_rx.recv().await {
        if let Err(e) = writer.write_all(msg.to_string().as_bytes()).await {
            debug!("Write to {} failed, ending write task: {}", client_id, e);
            break;
        }
    }

    let _ = writer.shutdown().await;
    debug!("Write task ended for {}", client_id);
}

/// Per-connection state
///
/// Owns the read side of the connection and, once a room is chosen, the
/// reference to it. Chat lines are only relayed while `room` is bound.
pub struct Session<R> {
    client: Client,
    reader: R,
    registry: Arc<RoomRegistry>,
    username: String,
    fallback_username: String,
    room: Option<Arc<Room>>,
}

impl<R> Session<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(
        client: Client,
        reader: R,
        registry: Arc<RoomRegistry>,
        fallback_username: String,
    ) -> Self {
        Self {
            client,
            reader,
            registry,
            username: String::new(),
            fallback_username,
            room: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room(&self) -> Option<&Arc<Room>> {
        self.room.as_ref()
    }

    /// Onboard the client and relay its chat lines until it quits
    ///
    /// Returns `Ok(())` on `/quit`, end of input while chatting, or when
    /// the client picks "Exit" from the menu. Cleanup is left to
    /// [`Session::leave_room`].
    pub async fn run(&mut self) -> Result<(), AppError> {
        self.ask_username().await?;

        let Some(room) = self.select_room().await? else {
            return Ok(());
        };

        self.enter_room(room.clone()).await?;
        self.chat(&room).await
    }

    /// Leave the bound room, if any, and tell the remaining members
    ///
    /// Unbinds the room first, so repeated calls announce nothing.
    pub async fn leave_room(&mut self) {
        let Some(room) = self.room.take() else {
            return;
        };

        room.remove_member(self.client.id).await;
        info!("{} left room {}", self.username, room.id());

        room.broadcast(
            ServerMessage::UserLeft {
                username: self.username.clone(),
            },
            None,
        )
        .await;
    }

    async fn ask_username(&mut self) -> Result<(), AppError> {
        self.send(ServerMessage::AskUsername).await?;
        let username = self.expect_line().await?;

        self.username = if username.is_empty() {
            self.fallback_username.clone()
        } else {
            username
        };

        info!("Client {} set username to '{}'", self.client.id, self.username);
        Ok(())
    }

    /// Menu loop. `None` means the client chose to exit.
    async fn select_room(&mut self) -> Result<Option<Arc<Room>>, AppError> {
        loop {
            self.send(ServerMessage::Menu).await?;
            let input = self.expect_line().await?;

            let outcome = match MenuChoice::parse(&input) {
                Ok(MenuChoice::ListRooms) => self.list_rooms().await.map(|()| None),
                Ok(MenuChoice::CreateRoom) => self.create_room().await.map(Some),
                Ok(MenuChoice::JoinRoom) => self.join_room().await.map(Some),
                Ok(MenuChoice::Exit) => {
                    self.send(ServerMessage::Goodbye).await?;
                    return Ok(None);
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(Some(room)) => return Ok(Some(room)),
                Ok(None) => {}
                Err(e) if e.is_recoverable() => {
                    debug!("Client {}: {}", self.client.id, e);
                    self.send(e.into()).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_rooms(&mut self) -> Result<(), AppError> {
        let rooms = self.registry.list().await;
        self.send(ServerMessage::RoomList(rooms)).await
    }

    async fn create_room(&mut self) -> Result<Arc<Room>, AppError> {
        self.send(ServerMessage::AskNewRoomId).await?;
        let room_id = RoomId::new(self.expect_line().await?);

        // Early rejection before asking for a name; `create` decides for real
        if self.registry.contains(&room_id).await {
            return Err(AppError::RoomAlreadyExists(room_id));
        }

        self.send(ServerMessage::AskRoomName).await?;
        let name = self.expect_line().await?;

        let room = self.registry.create(room_id, &name).await?;
        self.send(ServerMessage::RoomCreated {
            name: room.name().to_string(),
        })
        .await?;
        Ok(room)
    }

    async fn join_room(&mut self) -> Result<Arc<Room>, AppError> {
        self.send(ServerMessage::AskJoinRoomId).await?;
        let room_id = RoomId::new(self.expect_line().await?);

        let room = self.registry.get(&room_id).await;
        room.ok_or(AppError::RoomNotFound(room_id))
    }

    async fn enter_room(&mut self, room: Arc<Room>) -> Result<(), AppError> {
        room.add_member(self.client.clone(), self.username.clone()).await;
        self.room = Some(room.clone());

        info!("{} joined room {}", self.username, room.id());

        room.broadcast(
            ServerMessage::UserJoined {
                username: self.username.clone(),
            },
            Some(self.client.id),
        )
        .await;

        self.send(ServerMessage::Welcome {
            room_name: room.name().to_string(),
        })
        .await
    }

    async fn chat(&mut self, room: &Room) -> Result<(), AppError> {
        while let Some(line) = self.read_line().await? {
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case(QUIT_COMMAND) {
                debug!("Client {} sent {}", self.client.id, QUIT_COMMAND);
                break;
            }

            info!("[ROOM {}] [{}]: {}", room.id(), self.username, line);
            room.broadcast(
                ServerMessage::Chat {
                    from: self.username.clone(),
                    content: line,
                },
                Some(self.client.id),
            )
            .await;
        }
        Ok(())
    }

    async fn send(&self, msg: ServerMessage) -> Result<(), AppError> {
        Ok(self.client.send(msg).await?)
    }

    /// Next trimmed line, or `None` once the peer has closed
    ///
    /// Reads at most `MAX_LINE_BYTES` plus the newline; a longer line ends
    /// the session with `LineTooLong`.
    async fn read_line(&mut self) -> Result<Option<String>, AppError> {
        let mut line = String::new();
        let n = (&mut self.reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_LINE_BYTES && !line.ends_with('\n') {
            return Err(AppError::LineTooLong(MAX_LINE_BYTES));
        }
        Ok(Some(line.trim().to_string()))
    }

    async fn expect_line(&mut self) -> Result<String, AppError> {
        self.read_line().await?.ok_or(AppError::PeerDisconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(
        input: &[u8],
        registry: Arc<RoomRegistry>,
    ) -> (Session<&[u8]>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let client = Client::new(ClientId::new(), tx);
        (
            Session::new(client, input, registry, "User_4242".to_string()),
            rx,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn observer() -> (Client, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(64);
        (Client::new(ClientId::new(), tx), rx)
    }

    #[test]
    fn test_default_username_uses_port() {
        let addr: SocketAddr = "127.0.0.1:51234".parse().unwrap();
        assert_eq!(default_username(addr), "User_51234");
    }

    #[tokio::test]
    async fn test_exit_from_menu() {
        let registry = Arc::new(RoomRegistry::new());
        let (mut session, mut rx) = new_session(b"alice\n4\n", registry.clone());

        session.run().await.unwrap();

        let sent = drain(&mut rx);
        assert!(matches!(sent[0], ServerMessage::AskUsername));
        assert!(matches!(sent[1], ServerMessage::Menu));
        assert!(matches!(sent[2], ServerMessage::Goodbye));
        assert_eq!(sent.len(), 3);
        assert_eq!(session.username(), "alice");
        assert!(session.room().is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_username_falls_back() {
        let registry = Arc::new(RoomRegistry::new());
        let (mut session, _rx) = new_session(b"   \n4\n", registry);

        session.run().await.unwrap();

        assert_eq!(session.username(), "User_4242");
    }

    #[tokio::test]
    async fn test_invalid_choice_reshows_menu() {
        let registry = Arc::new(RoomRegistry::new());
        let (mut session, mut rx) = new_session(b"alice\n9\n4\n", registry);

        session.run().await.unwrap();

        let sent = drain(&mut rx);
        assert_eq!(sent[2].to_string(), "Invalid choice. Try again.\n");
        assert!(matches!(sent[3], ServerMessage::Menu));
        assert!(matches!(sent[4], ServerMessage::Goodbye));
    }

    #[tokio::test]
    async fn test_list_returns_to_menu() {
        let registry = Arc::new(RoomRegistry::new());
        registry.create(RoomId::new("101"), "Lobby").await.unwrap();
        let (mut session, mut rx) = new_session(b"alice\n1\n4\n", registry);

        session.run().await.unwrap();

        let sent = drain(&mut rx);
        match &sent[2] {
            ServerMessage::RoomList(rooms) => {
                assert_eq!(rooms.len(), 1);
                assert_eq!(rooms[0].name, "Lobby");
            }
            other => panic!("Wrong variant: {:?}", other),
        }
        assert!(matches!(sent[3], ServerMessage::Menu));
    }

    #[tokio::test]
    async fn test_create_room_and_quit() {
        let registry = Arc::new(RoomRegistry::new());
        let (mut session, mut rx) =
            new_session(b"alice\n2\n101\nLobby\nhello\n/QUIT\nafter quit\n", registry.clone());

        session.run().await.unwrap();

        let room = registry.get(&RoomId::new("101")).await.unwrap();
        assert_eq!(room.name(), "Lobby");
        assert_eq!(room.member_count().await, 1);

        let sent = drain(&mut rx);
        assert!(sent.iter().any(|m| matches!(m, ServerMessage::RoomCreated { name } if name == "Lobby")));
        assert!(matches!(sent.last(), Some(ServerMessage::Welcome { .. })));

        session.leave_room().await;
        assert_eq!(room.member_count().await, 0);
        assert!(registry.get(&RoomId::new("101")).await.is_some());
    }

    #[tokio::test]
    async fn test_create_existing_room_rejected() {
        let registry = Arc::new(RoomRegistry::new());
        registry.create(RoomId::new("101"), "Lobby").await.unwrap();
        let (mut session, mut rx) = new_session(b"carol\n2\n101\n4\n", registry.clone());

        session.run().await.unwrap();

        let sent = drain(&mut rx);
        assert_eq!(sent[3].to_string(), "Room 101 already exists. Try joining it.\n");
        assert!(matches!(sent[4], ServerMessage::Menu));
        assert!(session.room().is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_join_missing_room_rejected() {
        let registry = Arc::new(RoomRegistry::new());
        let (mut session, mut rx) = new_session(b"dave\n3\n999\n", registry);

        let result = session.run().await;

        assert!(matches!(result, Err(AppError::PeerDisconnected)));
        let sent = drain(&mut rx);
        assert_eq!(sent[3].to_string(), "Room 999 does not exist. Try creating it.\n");
        assert!(matches!(sent[4], ServerMessage::Menu));
        assert!(session.room().is_none());
    }

    #[tokio::test]
    async fn test_join_relays_chat_to_other_members() {
        let registry = Arc::new(RoomRegistry::new());
        let room = registry.create(RoomId::new("101"), "Lobby").await.unwrap();
        let (alice, mut alice_rx) = observer();
        room.add_member(alice, "A").await;

        let (mut session, mut rx) = new_session(b"B\n3\n101\n\nhi\n/quit\n", registry);
        session.run().await.unwrap();
        session.leave_room().await;

        let received = drain(&mut alice_rx);
        let texts: Vec<String> = received.iter().map(|m| m.to_string()).collect();
        assert_eq!(
            texts,
            vec![
                "\n[SYSTEM] B joined the room!\n".to_string(),
                "[B]: hi\n".to_string(),
                "[SYSTEM] B left the room.\n".to_string(),
            ]
        );

        let own = drain(&mut rx);
        assert!(own.iter().all(|m| !matches!(m, ServerMessage::Chat { .. })));
        assert!(matches!(own.last(), Some(ServerMessage::Welcome { room_name }) if room_name == "Lobby"));
    }

    #[tokio::test]
    async fn test_eof_mid_chat_leaves_once() {
        let registry = Arc::new(RoomRegistry::new());
        let room = registry.create(RoomId::new("5"), "").await.unwrap();
        let (alice, mut alice_rx) = observer();
        room.add_member(alice, "A").await;

        let (mut session, _rx) = new_session(b"B\n3\n5\nbye for now\n", registry);
        session.run().await.unwrap();
        assert_eq!(room.member_count().await, 2);

        session.leave_room().await;
        session.leave_room().await;

        assert_eq!(room.member_count().await, 1);
        let left: Vec<_> = drain(&mut alice_rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::UserLeft { .. }))
            .collect();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn test_over_length_line_ends_session() {
        let registry = Arc::new(RoomRegistry::new());
        let room = registry.create(RoomId::new("1"), "r").await.unwrap();
        let (alice, mut alice_rx) = observer();
        room.add_member(alice, "A").await;

        let mut input = b"B\n3\n1\n".to_vec();
        input.extend(std::iter::repeat(b'a').take(MAX_LINE_BYTES * 4));
        input.extend_from_slice(b"\n/quit\n");

        let (mut session, _rx) = new_session(&input, registry);
        let result = session.run().await;
        session.leave_room().await;

        assert!(matches!(result, Err(AppError::LineTooLong(MAX_LINE_BYTES))));
        let received = drain(&mut alice_rx);
        assert!(received.iter().all(|m| !matches!(m, ServerMessage::Chat { .. })));
        assert!(matches!(received.last(), Some(ServerMessage::UserLeft { .. })));
        assert_eq!(room.member_count().await, 1);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_relayed() {
        let registry = Arc::new(RoomRegistry::new());
        let room = registry.create(RoomId::new("1"), "r").await.unwrap();
        let (alice, mut alice_rx) = observer();
        room.add_member(alice, "A").await;

        let mut input = b"B\n3\n1\n".to_vec();
        input.extend(std::iter::repeat(b'a').take(MAX_LINE_BYTES));
        input.extend_from_slice(b"\nnext\n");

        let (mut session, _rx) = new_session(&input, registry);
        session.run().await.unwrap();

        let chats: Vec<usize> = drain(&mut alice_rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::Chat { content, .. } => Some(content.len()),
                _ => None,
            })
            .collect();
        assert_eq!(chats, vec![MAX_LINE_BYTES, 4]);
    }

    #[tokio::test]
    async fn test_writer_renders_messages() {
        let (tx, rx) = mpsc::channel(4);
        let mut out = Vec::new();
        tx.send(ServerMessage::AskUsername).await.unwrap();
        tx.send(ServerMessage::Goodbye).await.unwrap();
        drop(tx);

        write_messages(ClientId::new(), &mut out, rx).await;

        assert_eq!(String::from_utf8(out).unwrap(), "Enter your username: Goodbye!\n");
    }
}
