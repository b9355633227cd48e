//! Sync response payload
//!
//! The body of a client-server `/sync` response, reduced to what the engine
//! consumes. Room buckets and event batches are ruma's v3 sync types, and
//! events stay raw until the classifier decodes them one by one.

use ruma::api::client::sync::sync_events::v3::{
    GlobalAccountData, InvitedRoom, JoinedRoom, LeftRoom, Presence, Response, Rooms,
};
use ruma::OwnedRoomId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use roomsync_core::EventSource;

/// Everything that changed since the previous sync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPayload {
    /// Resume token for the next request
    pub next_batch: String,
    #[serde(skip_serializing_if = "Presence::is_empty")]
    pub presence: Presence,
    #[serde(skip_serializing_if = "GlobalAccountData::is_empty")]
    pub account_data: GlobalAccountData,
    #[serde(skip_serializing_if = "Rooms::is_empty")]
    pub rooms: Rooms,
}

impl SyncPayload {
    /// Total number of rooms across the joined, invited and left buckets
    pub fn room_count(&self) -> usize {
        self.rooms.join.len() + self.rooms.invite.len() + self.rooms.leave.len()
    }
}

impl From<Response> for SyncPayload {
    fn from(response: Response) -> Self {
        Self {
            next_batch: response.next_batch,
            presence: response.presence,
            account_data: response.account_data,
            rooms: response.rooms,
        }
    }
}

/// One room's delta, tagged with the bucket it came from
#[derive(Debug, Clone)]
pub enum RoomUpdate {
    Joined(JoinedRoom),
    Invited(InvitedRoom),
    Left(LeftRoom),
}

impl RoomUpdate {
    pub fn bucket(&self) -> RoomBucket {
        match self {
            RoomUpdate::Joined(_) => RoomBucket::Join,
            RoomUpdate::Invited(_) => RoomBucket::Invite,
            RoomUpdate::Left(_) => RoomBucket::Leave,
        }
    }

    /// Timeline pagination token. Invites carry no timeline.
    pub fn prev_batch(&self) -> Option<&str> {
        match self {
            RoomUpdate::Joined(room) => room.timeline.prev_batch.as_deref(),
            RoomUpdate::Left(room) => room.timeline.prev_batch.as_deref(),
            RoomUpdate::Invited(_) => None,
        }
    }
}

/// Flatten the joined, invited and left buckets into per-room updates.
///
/// Knocked rooms have no counterpart in the engine and are skipped.
pub fn room_updates(rooms: Rooms) -> Vec<(OwnedRoomId, RoomUpdate)> {
    if !rooms.knock.is_empty() {
        debug!("⏭️ Skipping {} knocked room(s)", rooms.knock.len());
    }

    let mut updates = Vec::with_capacity(rooms.join.len() + rooms.invite.len() + rooms.leave.len());
    updates.extend(rooms.join.into_iter().map(|(id, room)| (id, RoomUpdate::Joined(room))));
    updates.extend(rooms.invite.into_iter().map(|(id, room)| (id, RoomUpdate::Invited(room))));
    updates.extend(rooms.leave.into_iter().map(|(id, room)| (id, RoomUpdate::Left(room))));
    updates
}

/// Which room bucket a room update came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomBucket {
    Join,
    Invite,
    Leave,
}

impl RoomBucket {
    /// The membership bit every batch of this bucket is tagged with
    pub fn source(self) -> EventSource {
        match self {
            RoomBucket::Join => EventSource::JOIN,
            RoomBucket::Invite => EventSource::INVITE,
            RoomBucket::Leave => EventSource::LEAVE,
        }
    }
}

impl fmt::Display for RoomBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoomBucket::Join => "joined",
            RoomBucket::Invite => "invited",
            RoomBucket::Leave => "left",
        })
    }
}
