//! Room struct definition
//!
//! A named broadcast domain with its own lock over the member set.

use std::collections::HashMap;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::Client;
use crate::message::ServerMessage;
use crate::types::{ClientId, RoomId};

/// A connected member of a room
#[derive(Debug, Clone)]
pub struct Member {
    pub client: Client,
    /// Display only, not unique
    pub username: String,
}

/// Multi-member chat room
///
/// Rooms are never removed from the registry, so an empty room stays
/// listed and joinable.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    members: Mutex<HashMap<ClientId, Member>>,
}

impl Room {
    /// Create an empty room; a blank name falls back to `Room_<id>`
    pub fn new(id: RoomId, name: &str) -> Self {
        let name = match name.trim() {
            "" => id.default_room_name(),
            name => name.to_string(),
        };
        Self {
            id,
            name,
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a member. Announcing the arrival is the caller's job.
    pub async fn add_member(&self, client: Client, username: impl Into<String>) {
        let username = username.into();
        let mut members = self.members.lock().await;
        debug!("Room {}: adding {} ({})", self.id, username, client.id);
        members.insert(client.id, Member { client, username });
    }

    /// Remove a member by connection. Returns false if it was not present.
    pub async fn remove_member(&self, client_id: ClientId) -> bool {
        self.members.lock().await.remove(&client_id).is_some()
    }

    /// Send `msg` to every member except `exclude`
    ///
    /// Recipients are snapshotted under the lock and sent to after it is
    /// released. A failed send only affects that recipient. Returns the
    /// number of members the message was delivered to.
    pub async fn broadcast(&self, msg: ServerMessage, exclude: Option<ClientId>) -> usize {
        let recipients: Vec<Client> = {
            let members = self.members.lock().await;
            members
                .values()
                .filter(|m| Some(m.client.id) != exclude)
                .map(|m| m.client.clone())
                .collect()
        };

        let results = join_all(recipients.iter().map(|c| c.send(msg.clone()))).await;

        let mut delivered = 0;
        for (client, result) in recipients.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Room {}: send to {} failed: {}", self.id, client.id, e),
            }
        }
        delivered
    }

    /// Number of members right now
    pub async fn member_count(&self) -> usize {
        self.members.lock().await.len()
    }
}
