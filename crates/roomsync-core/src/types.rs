//! Core types for roomsync
//!
//! The vocabulary shared by the classifier, the room updater and the
//! listener registry: where a batch of events came from (`EventSource`),
//! which sub-protocol an event belongs to (`EventClass`), and the
//! class-qualified `EventType` that listeners are keyed by.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Bitmask describing the origin of a batch of sync events.
///
/// Bits combine, so a joined room's state batch is `JOIN | STATE`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventSource(u16);

impl EventSource {
    pub const PRESENCE: EventSource = EventSource(1 << 0);
    pub const JOIN: EventSource = EventSource(1 << 1);
    pub const INVITE: EventSource = EventSource(1 << 2);
    pub const LEAVE: EventSource = EventSource(1 << 3);
    pub const ACCOUNT_DATA: EventSource = EventSource(1 << 4);
    pub const TIMELINE: EventSource = EventSource(1 << 5);
    pub const STATE: EventSource = EventSource(1 << 6);
    pub const EPHEMERAL: EventSource = EventSource(1 << 7);
    pub const TO_DEVICE: EventSource = EventSource(1 << 8);

    /// Raw bit representation
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every bit of `other` is also set here
    pub const fn contains(self, other: EventSource) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one bit of `other` is also set here
    pub const fn intersects(self, other: EventSource) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `self` with the bits of `other` cleared
    pub const fn without(self, other: EventSource) -> EventSource {
        EventSource(self.0 & !other.0)
    }
}

impl BitOr for EventSource {
    type Output = EventSource;

    fn bitor(self, rhs: EventSource) -> EventSource {
        EventSource(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventSource {
    fn bitor_assign(&mut self, rhs: EventSource) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = *self;
        // Unknown membership combinations report the bits left after the membership bit
        let label = if s == EventSource::PRESENCE {
            Ok("presence")
        } else if s == EventSource::ACCOUNT_DATA {
            Ok("user account data")
        } else if s.intersects(EventSource::JOIN) {
            match s.without(EventSource::JOIN) {
                EventSource::STATE => Ok("joined state"),
                EventSource::TIMELINE => Ok("joined timeline"),
                EventSource::EPHEMERAL => Ok("room ephemeral (joined)"),
                EventSource::ACCOUNT_DATA => Ok("room account data (joined)"),
                rest => Err(rest),
            }
        } else if s.intersects(EventSource::INVITE) {
            match s.without(EventSource::INVITE) {
                EventSource::STATE => Ok("invited state"),
                rest => Err(rest),
            }
        } else if s.intersects(EventSource::LEAVE) {
            match s.without(EventSource::LEAVE) {
                EventSource::STATE => Ok("left state"),
                EventSource::TIMELINE => Ok("left timeline"),
                rest => Err(rest),
            }
        } else {
            Err(s)
        };

        match label {
            Ok(label) => f.write_str(label),
            Err(rest) => write!(f, "unknown ({})", rest.0),
        }
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventSource({:#011b}: {})", self.0, self)
    }
}

/// Sub-protocol an event belongs to. Decides which content schema applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    /// Not yet resolved
    #[default]
    Unknown,
    State,
    Message,
    Ephemeral,
    AccountData,
    ToDevice,
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventClass::Unknown => "unknown",
            EventClass::State => "state",
            EventClass::Message => "message",
            EventClass::Ephemeral => "ephemeral",
            EventClass::AccountData => "account data",
            EventClass::ToDevice => "to-device",
        };
        f.write_str(name)
    }
}

/// An event type name qualified by its class.
///
/// Two types with the same name but different classes are different keys,
/// so a listener registered for the state `m.room.member` never sees an
/// event of that name that was resolved to any other class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventType {
    name: Cow<'static, str>,
    class: EventClass,
}

impl EventType {
    /// Build a type from a static name, usable in constants
    pub const fn from_static(name: &'static str, class: EventClass) -> Self {
        Self {
            name: Cow::Borrowed(name),
            class,
        }
    }

    /// Build a type from an owned name
    pub fn new<T: Into<String>>(name: T, class: EventClass) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            class,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> EventClass {
        self.class
    }

    pub fn is_state(&self) -> bool {
        self.class == EventClass::State
    }

    /// Same name, different class
    pub fn with_class(&self, class: EventClass) -> Self {
        Self {
            name: self.name.clone(),
            class,
        }
    }

    /// Human-readable form including the class, for log lines
    pub fn repr(&self) -> String {
        format!("{} ({})", self.name, self.class)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Well-known event types
pub mod event_types {
    use super::{EventClass, EventType};

    // State events
    pub const STATE_MEMBER: EventType = EventType::from_static("m.room.member", EventClass::State);
    pub const STATE_ROOM_NAME: EventType = EventType::from_static("m.room.name", EventClass::State);
    pub const STATE_TOPIC: EventType = EventType::from_static("m.room.topic", EventClass::State);
    pub const STATE_CANONICAL_ALIAS: EventType =
        EventType::from_static("m.room.canonical_alias", EventClass::State);
    pub const STATE_POWER_LEVELS: EventType =
        EventType::from_static("m.room.power_levels", EventClass::State);
    pub const STATE_TOMBSTONE: EventType =
        EventType::from_static("m.room.tombstone", EventClass::State);
    pub const STATE_CREATE: EventType = EventType::from_static("m.room.create", EventClass::State);
    pub const STATE_JOIN_RULES: EventType =
        EventType::from_static("m.room.join_rules", EventClass::State);
    pub const STATE_ROOM_AVATAR: EventType =
        EventType::from_static("m.room.avatar", EventClass::State);
    pub const STATE_ENCRYPTION: EventType =
        EventType::from_static("m.room.encryption", EventClass::State);
    pub const STATE_HISTORY_VISIBILITY: EventType =
        EventType::from_static("m.room.history_visibility", EventClass::State);

    // Message (timeline) events
    pub const EVENT_MESSAGE: EventType = EventType::from_static("m.room.message", EventClass::Message);
    pub const EVENT_REDACTION: EventType =
        EventType::from_static("m.room.redaction", EventClass::Message);
    pub const EVENT_ENCRYPTED: EventType =
        EventType::from_static("m.room.encrypted", EventClass::Message);
    pub const EVENT_STICKER: EventType = EventType::from_static("m.sticker", EventClass::Message);
    pub const EVENT_REACTION: EventType = EventType::from_static("m.reaction", EventClass::Message);

    // Ephemeral events
    pub const EPHEMERAL_TYPING: EventType = EventType::from_static("m.typing", EventClass::Ephemeral);
    pub const EPHEMERAL_RECEIPT: EventType =
        EventType::from_static("m.receipt", EventClass::Ephemeral);
    pub const EPHEMERAL_PRESENCE: EventType =
        EventType::from_static("m.presence", EventClass::Ephemeral);

    // Account data events
    pub const ACCOUNT_DATA_ROOM_TAGS: EventType =
        EventType::from_static("m.tag", EventClass::AccountData);
    pub const ACCOUNT_DATA_PUSH_RULES: EventType =
        EventType::from_static("m.push_rules", EventClass::AccountData);
    pub const ACCOUNT_DATA_DIRECT_CHATS: EventType =
        EventType::from_static("m.direct", EventClass::AccountData);
    pub const ACCOUNT_DATA_PREFERENCES: EventType =
        EventType::from_static("net.roomsync.preferences", EventClass::AccountData);
}

/// A duration for retries after a failed sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAfter(pub Duration);

impl RetryAfter {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Get the duration as seconds
    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}
