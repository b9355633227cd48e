//! In-memory session
//!
//! A `SyncSession` that keeps every room in a concurrent map for the
//! lifetime of the process. Used by the `replay` command and in tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use ruma::{OwnedRoomId, OwnedUserId, RoomId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use roomsync_core::{Result, Room, RoomsyncError, SharedRoom, SyncSession};

/// Session backed by a `DashMap` of rooms
#[derive(Debug)]
pub struct MemorySession {
    user_id: OwnedUserId,
    rooms: DashMap<OwnedRoomId, SharedRoom>,
    refused: DashSet<OwnedRoomId>,
    unloading: AtomicBool,
}

impl MemorySession {
    pub fn new(user_id: OwnedUserId) -> Self {
        Self {
            user_id,
            rooms: DashMap::new(),
            refused: DashSet::new(),
            unloading: AtomicBool::new(true),
        }
    }

    /// Make every later lookup of `room_id` fail
    pub fn refuse_room(&self, room_id: &RoomId) {
        self.refused.insert(room_id.to_owned());
    }

    /// A room that has already been created, without creating it
    pub fn room(&self, room_id: &RoomId) -> Option<SharedRoom> {
        self.rooms.get(room_id).map(|room| room.value().clone())
    }

    pub fn room_ids(&self) -> Vec<OwnedRoomId> {
        let mut ids: Vec<_> = self.rooms.iter().map(|room| room.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn unloading_enabled(&self) -> bool {
        self.unloading.load(Ordering::Acquire)
    }
}

#[async_trait]
impl SyncSession for MemorySession {
    async fn get_room(&self, room_id: &RoomId) -> Result<SharedRoom> {
        if self.refused.contains(room_id) {
            return Err(RoomsyncError::RoomLookup {
                room_id: room_id.to_owned(),
                reason: "room refused by session".to_owned(),
            });
        }

        let room = self
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| {
                trace!("🏠 Creating room {}", room_id);
                Arc::new(RwLock::new(Room::new(room_id.to_owned())))
            })
            .value()
            .clone();
        Ok(room)
    }

    fn user_id(&self) -> OwnedUserId {
        self.user_id.clone()
    }

    fn disable_unloading(&self) {
        debug!("🔒 Room unloading disabled");
        self.unloading.store(false, Ordering::Release);
    }

    fn enable_unloading(&self) {
        debug!("🔓 Room unloading enabled");
        self.unloading.store(true, Ordering::Release);
    }
}
