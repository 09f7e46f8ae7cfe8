//! Room registry
//!
//! Process-wide directory of rooms keyed by ID. One lock covers the map;
//! room-level locks are only taken after it has been released.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::AppError;
use crate::room::Room;
use crate::types::RoomId;

/// One line of a room listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub member_count: usize,
}

/// All rooms ever created, in ID order
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<BTreeMap<RoomId, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every room with its current member count
    pub async fn list(&self) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Room>> = self.rooms.lock().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(RoomSummary {
                id: room.id().clone(),
                name: room.name().to_string(),
                member_count: room.member_count().await,
            });
        }
        summaries
    }

    /// Register a new empty room
    ///
    /// The check and the insert happen under one lock, so of several
    /// concurrent creates for the same ID exactly one succeeds.
    pub async fn create(&self, id: RoomId, name: &str) -> Result<Arc<Room>, AppError> {
        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(&id) {
            return Err(AppError::RoomAlreadyExists(id));
        }

        let room = Arc::new(Room::new(id.clone(), name));
        rooms.insert(id, room.clone());

        info!("Room '{}' (ID: {}) created", room.name(), room.id());
        debug!("Total rooms: {}", rooms.len());
        Ok(room)
    }

    pub async fn get(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(id).cloned()
    }

    /// Whether `id` is taken. Only advisory: `create` re-checks.
    pub async fn contains(&self, id: &RoomId) -> bool {
        self.rooms.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}
