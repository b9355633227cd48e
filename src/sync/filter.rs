//! Sync filter
//!
//! The filter a client uploads once per session to narrow what the server
//! sends back: a bounded timeline, lazy-loaded members, allow-lists of the
//! event types the engine has schemas for, and no presence at all.

use ruma::api::client::filter::{
    Filter, FilterDefinition, LazyLoadOptions, RoomEventFilter, RoomFilter,
};
use ruma::{UInt, UserId};
use tracing::debug;

use roomsync_core::event_types::*;
use roomsync_core::EventType;

/// Number of timeline events requested per room
pub const TIMELINE_LIMIT: u32 = 50;

/// State types requested both in room state and in the timeline
const STATE_TYPES: [EventType; 6] = [
    STATE_MEMBER,
    STATE_ROOM_NAME,
    STATE_TOPIC,
    STATE_CANONICAL_ALIAS,
    STATE_POWER_LEVELS,
    STATE_TOMBSTONE,
];

const TIMELINE_EVENT_TYPES: [EventType; 5] = [
    EVENT_MESSAGE,
    EVENT_REDACTION,
    EVENT_ENCRYPTED,
    EVENT_STICKER,
    EVENT_REACTION,
];

fn type_names<'a>(types: impl IntoIterator<Item = &'a EventType>) -> Option<Vec<String>> {
    Some(types.into_iter().map(|t| t.name().to_owned()).collect())
}

fn room_events<'a>(types: impl IntoIterator<Item = &'a EventType>) -> RoomEventFilter {
    let mut filter = RoomEventFilter::empty();
    filter.types = type_names(types);
    filter
}

fn lazy_members() -> LazyLoadOptions {
    LazyLoadOptions::Enabled {
        include_redundant_members: false,
    }
}

/// Build the sync filter for a user. The result does not depend on the user.
pub fn build_filter(user_id: &UserId) -> FilterDefinition {
    debug!("🔧 Building sync filter for {}", user_id);

    let mut state = room_events(&STATE_TYPES);
    state.lazy_load_options = lazy_members();

    let mut timeline = room_events(TIMELINE_EVENT_TYPES.iter().chain(&STATE_TYPES));
    timeline.lazy_load_options = lazy_members();
    timeline.limit = Some(UInt::from(TIMELINE_LIMIT));

    let mut room = RoomFilter::empty();
    room.include_leave = false;
    room.state = state;
    room.timeline = timeline;
    room.ephemeral = room_events(&[EPHEMERAL_TYPING, EPHEMERAL_RECEIPT]);
    room.account_data = room_events(&[ACCOUNT_DATA_ROOM_TAGS]);

    let mut account_data = Filter::empty();
    account_data.types = type_names(&[
        ACCOUNT_DATA_PUSH_RULES,
        ACCOUNT_DATA_DIRECT_CHATS,
        ACCOUNT_DATA_PREFERENCES,
    ]);

    let mut presence = Filter::empty();
    presence.not_types = vec!["*".to_owned()];

    let mut definition = FilterDefinition::empty();
    definition.room = room;
    definition.account_data = account_data;
    definition.presence = presence;
    definition
}
