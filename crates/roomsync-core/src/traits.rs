//! Core traits for roomsync
//!
//! The seams between the sync engine and the rest of a client: the session
//! that owns rooms, and the handlers that observe delivered events.

use async_trait::async_trait;
use ruma::{OwnedUserId, RoomId};

use crate::event::Event;
use crate::room::SharedRoom;
use crate::types::EventSource;
use crate::Result;

/// Session capabilities the sync engine depends on.
///
/// Implementations own all synchronization of their room store. The engine
/// calls `get_room` from many room units at once and only assumes that
/// lookup-or-create is atomic.
#[async_trait]
pub trait SyncSession: Send + Sync {
    /// Look up a room, creating it if it is not known yet
    async fn get_room(&self, room_id: &RoomId) -> Result<SharedRoom>;

    /// The user this session syncs for
    fn user_id(&self) -> OwnedUserId;

    /// Stop evicting rooms from memory
    fn disable_unloading(&self);

    /// Allow rooms to be evicted from memory again
    fn enable_unloading(&self);
}

/// Observer invoked for every delivered event of the type it was registered for.
///
/// Handlers for different rooms run concurrently, so implementations must
/// tolerate being called from several room units at the same time.
pub trait EventHandler: Send + Sync {
    fn handle(&self, source: EventSource, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(EventSource, &Event) + Send + Sync,
{
    fn handle(&self, source: EventSource, event: &Event) {
        self(source, event)
    }
}
