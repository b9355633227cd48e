//! Room aggregate
//!
//! The mutable per-room view a client keeps between syncs. Rooms are owned
//! by a session (see [`crate::traits::SyncSession`]) and shared with the
//! sync engine behind an async `RwLock`.

use ruma::OwnedRoomId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::event::Event;
use crate::types::{event_types, EventType};

/// A room handle shared between the session and concurrent room units
pub type SharedRoom = Arc<RwLock<Room>>;

/// Lazy-loading room summary as sent by the server
pub use ruma::api::client::sync::sync_events::v3::RoomSummary;

/// Client-side room state
#[derive(Debug, Clone)]
pub struct Room {
    pub id: OwnedRoomId,

    /// First pagination token ever seen for this room
    pub prev_batch: String,

    /// Pagination token of the most recent sync that carried one
    pub last_prev_batch: String,

    /// Set once the room shows up in the leave bucket
    pub has_left: bool,

    pub summary: RoomSummary,

    state: HashMap<EventType, BTreeMap<String, Event>>,
}

impl Room {
    pub fn new(id: OwnedRoomId) -> Self {
        Self {
            id,
            prev_batch: String::new(),
            last_prev_batch: String::new(),
            has_left: false,
            summary: RoomSummary::default(),
            state: HashMap::new(),
        }
    }

    /// Store a state event under (type, state key), replacing any previous one.
    ///
    /// Returns `false` and leaves the room untouched for events that are not
    /// state events.
    pub fn set_state(&mut self, event: Event) -> bool {
        if !event.event_type.is_state() {
            return false;
        }
        let Some(state_key) = event.state_key.clone() else {
            return false;
        };
        self.state
            .entry(event.event_type.clone())
            .or_default()
            .insert(state_key, event);
        true
    }

    pub fn state_event(&self, event_type: &EventType, state_key: &str) -> Option<&Event> {
        self.state.get(event_type).and_then(|events| events.get(state_key))
    }

    /// Every state event of one type, ordered by state key
    pub fn state_events(&self, event_type: &EventType) -> impl Iterator<Item = &Event> {
        self.state.get(event_type).into_iter().flat_map(|events| events.values())
    }

    /// Number of (type, state key) entries
    pub fn state_count(&self) -> usize {
        self.state.values().map(BTreeMap::len).sum()
    }

    pub fn name(&self) -> Option<&str> {
        self.state_event(&event_types::STATE_ROOM_NAME, "")
            .and_then(|event| event.content_str("name"))
            .filter(|name| !name.is_empty())
    }

    pub fn topic(&self) -> Option<&str> {
        self.state_event(&event_types::STATE_TOPIC, "")
            .and_then(|event| event.content_str("topic"))
    }

    pub fn canonical_alias(&self) -> Option<&str> {
        self.state_event(&event_types::STATE_CANONICAL_ALIAS, "")
            .and_then(|event| event.content_str("alias"))
    }

    /// Membership of a user as last seen in room state
    pub fn membership(&self, user_id: &str) -> Option<&str> {
        self.state_event(&event_types::STATE_MEMBER, user_id)
            .and_then(|event| event.content_str("membership"))
    }

    /// User ids whose last known membership is `join`
    pub fn joined_members(&self) -> Vec<&str> {
        self.state_events(&event_types::STATE_MEMBER)
            .filter(|event| event.content_str("membership") == Some("join"))
            .filter_map(|event| event.state_key.as_deref())
            .collect()
    }

    pub fn is_tombstoned(&self) -> bool {
        self.state_event(&event_types::STATE_TOMBSTONE, "").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use crate::types::event_types::*;
    use serde_json::json;
    use test_log::test;

    fn state(event_type: EventType, state_key: &str, content: serde_json::Value) -> Event {
        let raw = RawEvent {
            event_type: event_type.name().to_owned(),
            state_key: Some(state_key.to_owned()),
            content,
            ..Default::default()
        };
        Event::from_raw(&raw, event_type, None).unwrap()
    }

    #[test]
    fn test_state_is_keyed_by_type_and_state_key() {
        let mut room = Room::new(ruma::room_id!("!r:example.org").to_owned());
        assert!(room.set_state(state(STATE_MEMBER, "@a:example.org", json!({"membership": "join"}))));
        assert!(room.set_state(state(STATE_MEMBER, "@b:example.org", json!({"membership": "invite"}))));
        assert!(room.set_state(state(STATE_ROOM_NAME, "", json!({"name": "Lobby"}))));
        assert_eq!(room.state_count(), 3);

        assert!(room.set_state(state(STATE_MEMBER, "@b:example.org", json!({"membership": "join"}))));
        assert_eq!(room.state_count(), 3);
        assert_eq!(room.membership("@b:example.org"), Some("join"));
        assert_eq!(room.joined_members(), vec!["@a:example.org", "@b:example.org"]);
        assert_eq!(room.name(), Some("Lobby"));
    }

    #[test]
    fn test_non_state_events_are_refused() {
        let mut room = Room::new(ruma::room_id!("!r:example.org").to_owned());
        let raw = RawEvent {
            event_type: "m.room.message".to_owned(),
            content: json!({"msgtype": "m.text", "body": "hi"}),
            ..Default::default()
        };
        let message = Event::from_raw(&raw, EVENT_MESSAGE, None).unwrap();
        assert!(!room.set_state(message));
        assert_eq!(room.state_count(), 0);
    }

    #[test]
    fn test_summary_wire_names() {
        let summary: RoomSummary = serde_json::from_value(json!({
            "m.heroes": ["@a:example.org"],
            "m.joined_member_count": 2
        }))
        .unwrap();
        assert_eq!(summary.heroes, vec![ruma::owned_user_id!("@a:example.org")]);
        assert_eq!(summary.joined_member_count, Some(ruma::uint!(2)));
        assert_eq!(summary.invited_member_count, None);
        assert!(!summary.is_empty());
        assert!(Room::new(ruma::room_id!("!r:example.org").to_owned()).summary.is_empty());
    }
}
