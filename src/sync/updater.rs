//! Room updater
//!
//! Folds one room's slice of a sync response into the session's `Room`.
//! Callers hold the room's write lock for the duration of each call.

use tracing::{debug, trace};

use roomsync_core::{Event, Room, RoomSummary};

/// Mark a room as left. Never reset by later syncs.
pub fn mark_left(room: &mut Room) {
    if !room.has_left {
        debug!("🚪 Marking {} as left", room.id);
    }
    room.has_left = true;
}

/// Merge the lazy-loading summary. Fields absent from this sync keep their
/// previous value.
pub fn apply_summary(room: &mut Room, summary: &RoomSummary) {
    if summary.is_empty() {
        return;
    }
    if !summary.heroes.is_empty() {
        room.summary.heroes = summary.heroes.clone();
    }
    if let Some(count) = summary.joined_member_count {
        room.summary.joined_member_count = Some(count);
    }
    if let Some(count) = summary.invited_member_count {
        room.summary.invited_member_count = Some(count);
    }
}

/// Record a state event. Returns `false` for anything that is not one.
pub fn apply_state(room: &mut Room, event: &Event) -> bool {
    if !event.event_type.is_state() {
        return false;
    }
    let applied = room.set_state(event.clone());
    if applied {
        trace!(
            "🏠 {} state {} [{}]",
            room.id,
            event.event_type,
            event.state_key.as_deref().unwrap_or_default()
        );
    }
    applied
}

/// Track the timeline pagination token.
///
/// `prev_batch` keeps the first non-empty token ever seen, `last_prev_batch`
/// always follows the most recent one. Missing or empty tokens change nothing.
pub fn apply_pagination(room: &mut Room, token: Option<&str>) {
    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return;
    };
    if room.prev_batch.is_empty() {
        room.prev_batch = token.to_owned();
    }
    room.last_prev_batch = token.to_owned();
}
