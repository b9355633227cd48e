//! Sync events
//!
//! `RawEvent` is what arrives on the wire. `Event` is what the rest of the
//! engine works with: its type carries a resolved class and its content has
//! been parsed with the schema of that class.

use ruma::events::{
    direct::DirectEventContent,
    presence::PresenceEventContent,
    push_rules::PushRulesEventContent,
    reaction::ReactionEventContent,
    receipt::ReceiptEventContent,
    room::{
        avatar::RoomAvatarEventContent, canonical_alias::RoomCanonicalAliasEventContent,
        create::RoomCreateEventContent, encrypted::RoomEncryptedEventContent,
        encryption::RoomEncryptionEventContent,
        history_visibility::RoomHistoryVisibilityEventContent,
        join_rules::RoomJoinRulesEventContent, member::RoomMemberEventContent,
        message::RoomMessageEventContent, name::RoomNameEventContent,
        power_levels::RoomPowerLevelsEventContent, redaction::RoomRedactionEventContent,
        tombstone::RoomTombstoneEventContent, topic::RoomTopicEventContent,
    },
    sticker::StickerEventContent,
    tag::TagEventContent,
    typing::TypingEventContent,
};
use ruma::{OwnedRoomId, RoomId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{EventClass, EventType};
use crate::{Result, RoomsyncError};

/// An event as delivered in a sync batch, before classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Absent and empty-string state keys are different things
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_ts: Option<u64>,

    #[serde(default)]
    pub content: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<Value>,
}

/// Parsed content, one variant per known schema
#[derive(Debug, Clone)]
pub enum EventContent {
    Member(RoomMemberEventContent),
    RoomName(RoomNameEventContent),
    Topic(RoomTopicEventContent),
    CanonicalAlias(RoomCanonicalAliasEventContent),
    PowerLevels(RoomPowerLevelsEventContent),
    Tombstone(RoomTombstoneEventContent),
    Create(RoomCreateEventContent),
    JoinRules(RoomJoinRulesEventContent),
    RoomAvatar(RoomAvatarEventContent),
    Encryption(RoomEncryptionEventContent),
    HistoryVisibility(RoomHistoryVisibilityEventContent),

    Message(RoomMessageEventContent),
    Redaction(RoomRedactionEventContent),
    Encrypted(RoomEncryptedEventContent),
    Sticker(StickerEventContent),
    Reaction(ReactionEventContent),

    Typing(TypingEventContent),
    Receipt(ReceiptEventContent),
    Presence(PresenceEventContent),

    RoomTags(TagEventContent),
    PushRules(PushRulesEventContent),
    DirectChats(DirectEventContent),
    Preferences(Map<String, Value>),
}

impl EventContent {
    /// Parse raw content with the schema registered for `event_type`.
    ///
    /// The lookup uses both the name and the class, so an `m.room.message`
    /// that was resolved as a state event has no schema.
    pub fn parse(event_type: &EventType, raw: &Value) -> Result<Self> {
        use EventClass::*;

        let content = match (event_type.class(), event_type.name()) {
            (State, "m.room.member") => Self::Member(from_raw(event_type, raw)?),
            (State, "m.room.name") => Self::RoomName(from_raw(event_type, raw)?),
            (State, "m.room.topic") => Self::Topic(from_raw(event_type, raw)?),
            (State, "m.room.canonical_alias") => Self::CanonicalAlias(from_raw(event_type, raw)?),
            (State, "m.room.power_levels") => Self::PowerLevels(from_raw(event_type, raw)?),
            (State, "m.room.tombstone") => Self::Tombstone(from_raw(event_type, raw)?),
            (State, "m.room.create") => Self::Create(from_raw(event_type, raw)?),
            (State, "m.room.join_rules") => Self::JoinRules(from_raw(event_type, raw)?),
            (State, "m.room.avatar") => Self::RoomAvatar(from_raw(event_type, raw)?),
            (State, "m.room.encryption") => Self::Encryption(from_raw(event_type, raw)?),
            (State, "m.room.history_visibility") => {
                Self::HistoryVisibility(from_raw(event_type, raw)?)
            }

            (Message, "m.room.message") => Self::Message(from_raw(event_type, raw)?),
            (Message, "m.room.redaction") => Self::Redaction(from_raw(event_type, raw)?),
            (Message, "m.room.encrypted") => Self::Encrypted(from_raw(event_type, raw)?),
            (Message, "m.sticker") => Self::Sticker(from_raw(event_type, raw)?),
            (Message, "m.reaction") => Self::Reaction(from_raw(event_type, raw)?),

            (Ephemeral, "m.typing") => Self::Typing(from_raw(event_type, raw)?),
            (Ephemeral, "m.receipt") => Self::Receipt(from_raw(event_type, raw)?),
            (Ephemeral, "m.presence") => Self::Presence(from_raw(event_type, raw)?),

            (AccountData, "m.tag") => Self::RoomTags(from_raw(event_type, raw)?),
            (AccountData, "m.push_rules") => Self::PushRules(from_raw(event_type, raw)?),
            (AccountData, "m.direct") => Self::DirectChats(from_raw(event_type, raw)?),
            (AccountData, "net.roomsync.preferences") => {
                Self::Preferences(from_raw(event_type, raw)?)
            }

            _ => return Err(RoomsyncError::UnsupportedContent(event_type.repr())),
        };

        Ok(content)
    }
}

fn from_raw<T: DeserializeOwned>(event_type: &EventType, raw: &Value) -> Result<T> {
    serde_json::from_value(raw.clone()).map_err(|e| RoomsyncError::ContentParse {
        event_type: event_type.name().to_owned(),
        reason: e.to_string(),
    })
}

/// Event content in both raw and parsed form
#[derive(Debug, Clone)]
pub struct Content {
    pub raw: Value,
    pub parsed: EventContent,
}

/// A classified event with parsed content
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub event_id: Option<String>,
    pub room_id: Option<OwnedRoomId>,
    pub sender: Option<String>,
    pub state_key: Option<String>,
    pub origin_server_ts: Option<u64>,
    pub content: Content,
}

impl Event {
    /// Build an event from its raw form once the class is known.
    ///
    /// Fails when the content does not fit the schema of `event_type`.
    pub fn from_raw(raw: &RawEvent, event_type: EventType, room_id: Option<&RoomId>) -> Result<Self> {
        let parsed = EventContent::parse(&event_type, &raw.content)?;

        Ok(Self {
            event_type,
            event_id: raw.event_id.clone(),
            room_id: room_id.map(ToOwned::to_owned),
            sender: raw.sender.clone(),
            state_key: raw.state_key.clone(),
            origin_server_ts: raw.origin_server_ts,
            content: Content {
                raw: raw.content.clone(),
                parsed,
            },
        })
    }

    /// Read a top-level string field of the raw content
    pub fn content_str(&self, field: &str) -> Option<&str> {
        self.content.raw.get(field).and_then(Value::as_str)
    }
}
