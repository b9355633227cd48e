//! Event classification
//!
//! Decides which sub-protocol a raw event belongs to from the event itself
//! and the bitmask of the batch it arrived in, then parses its content with
//! the schema registered for the resulting class-qualified type.

use ruma::serde::Raw;
use ruma::RoomId;

use roomsync_core::{Event, EventClass, EventSource, EventType, RawEvent, Result, RoomsyncError};

/// Decode one event of a batch into its wire form.
///
/// Batches keep their events raw, so a malformed event fails here on its
/// own instead of failing the whole sync response.
pub fn decode<T>(raw: &Raw<T>) -> Result<RawEvent> {
    raw.deserialize_as::<RawEvent>()
        .map_err(|e| RoomsyncError::ContentParse {
            event_type: raw.get_field::<String>("type").ok().flatten().unwrap_or_default(),
            reason: e.to_string(),
        })
}

/// Resolve the class of a raw event.
///
/// First match wins:
/// 1. a state key, even an empty one, makes it a state event
/// 2. the presence batch or any ephemeral batch gives an ephemeral event
/// 3. any account-data batch gives an account-data event
/// 4. the to-device batch gives a to-device event
/// 5. anything else is a message event
pub fn classify(raw: &RawEvent, source: EventSource) -> EventClass {
    if raw.state_key.is_some() {
        EventClass::State
    } else if source == EventSource::PRESENCE || source.intersects(EventSource::EPHEMERAL) {
        EventClass::Ephemeral
    } else if source.intersects(EventSource::ACCOUNT_DATA) {
        EventClass::AccountData
    } else if source == EventSource::TO_DEVICE {
        EventClass::ToDevice
    } else {
        EventClass::Message
    }
}

/// The class-qualified type of a raw event
pub fn resolve_type(raw: &RawEvent, source: EventSource) -> EventType {
    EventType::new(raw.event_type.as_str(), classify(raw, source))
}

/// Classify a raw event and parse its content.
///
/// Errors are event-local: malformed content and types without a schema
/// for their class both fail here, and the caller drops the event.
pub fn resolve(raw: &RawEvent, source: EventSource, room_id: Option<&RoomId>) -> Result<Event> {
    let event_type = resolve_type(raw, source);
    Event::from_raw(raw, event_type, room_id)
}

/// Decode, classify and parse one raw batch entry
pub fn resolve_raw<T>(
    raw: &Raw<T>,
    source: EventSource,
    room_id: Option<&RoomId>,
) -> Result<Event> {
    resolve(&decode(raw)?, source, room_id)
}
