// =============================================================================
// Roomsync - Library Crate
// =============================================================================
//
// Project: Roomsync - Matrix client sync-response engine
// Author: arkSong (arksong2018@gmail.com)
// Date: 2025-02-03
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Turns decoded Matrix `/sync` responses into classified events, room
//   state updates and listener notifications. Polling, storage and
//   encryption stay with the embedding client.
//
// =============================================================================

pub mod replay;
pub mod session;
pub mod sync;

// Re-export common types
pub use ruma;
pub use tokio;
pub use tracing;

// Re-export workspace crates
pub use roomsync_common as common;
pub use roomsync_core as core;

pub use roomsync_core::{
    event_types, ClientConfig, Event, EventClass, EventHandler, EventSource, EventType, RawEvent,
    Result, Room, RoomsyncError, SharedRoom, SyncSession,
};
pub use session::MemorySession;
pub use sync::{ListenerRegistry, SyncPayload, SyncSummary, Syncer};
