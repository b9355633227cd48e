//! Roomsync Core Library
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.3.0
//! Date: 2025-02-03
//!
//! Fundamental types and traits shared by the roomsync sync engine and the
//! clients embedding it.
//!
//! # Features
//! - `EventSource`, `EventClass` and class-qualified `EventType`
//! - Raw and classified events with schema-dispatched content parsing
//! - The `Room` aggregate and its lazy-loading summary
//! - `SyncSession` and `EventHandler` capability traits
//! - Layered client configuration
//!
//! # Examples
//! ```rust
//! use roomsync_core::{event_types, EventClass, EventSource};
//!
//! let source = EventSource::JOIN | EventSource::STATE;
//! assert!(source.contains(EventSource::STATE));
//! assert_eq!(event_types::STATE_MEMBER.class(), EventClass::State);
//! ```

pub mod config;
pub mod event;
pub mod room;
pub mod traits;
pub mod types;

pub use roomsync_common::{Result, RoomsyncError};

pub use config::{ClientConfig, LoggingConfig};
pub use event::{Content, Event, EventContent, RawEvent};
pub use room::{Room, RoomSummary, SharedRoom};
pub use traits::{EventHandler, SyncSession};
pub use types::{event_types, EventClass, EventSource, EventType, RetryAfter};
