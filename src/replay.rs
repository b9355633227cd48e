//! Replay of recorded sync responses
//!
//! Feeds a `/sync` body from disk through a `Syncer` backed by a
//! `MemorySession` and reports the resulting room state.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use roomsync_core::event_types::{EVENT_MESSAGE, STATE_MEMBER};
use roomsync_core::{Event, EventSource, Result, RoomsyncError};

use crate::session::MemorySession;
use crate::sync::{SyncPayload, SyncSummary, Syncer};

/// Outcome of one replayed response
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub next_batch: String,
    pub summary: SyncSummary,
    pub rooms: Vec<RoomReport>,
}

/// Room state after the replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomReport {
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub state_events: usize,
    pub joined_members: usize,
    pub has_left: bool,
    pub prev_batch: String,
}

/// Read and decode a sync response body
#[instrument(level = "debug")]
pub fn load_payload(path: &Path) -> Result<SyncPayload> {
    let body = std::fs::read_to_string(path)?;
    let payload: SyncPayload = serde_json::from_str(&body).map_err(|e| {
        RoomsyncError::Serialization(format!("Invalid sync response {}: {}", path.display(), e))
    })?;
    debug!(
        "📥 Loaded sync response with {} rooms from {}",
        payload.room_count(),
        path.display()
    );
    Ok(payload)
}

/// Log messages and membership changes as they are dispatched
pub fn register_log_listeners(syncer: &Syncer) {
    syncer.on_event_type(EVENT_MESSAGE, |source: EventSource, event: &Event| {
        info!(
            "💬 [{}] {}: {}",
            room_label(event),
            event.sender.as_deref().unwrap_or("?"),
            event.content_str("body").unwrap_or_default()
        );
        debug!("💬 from {}", source);
    });
    syncer.on_event_type(STATE_MEMBER, |source: EventSource, event: &Event| {
        info!(
            "👤 [{}] {} is now {} ({})",
            room_label(event),
            event.state_key.as_deref().unwrap_or("?"),
            event.content_str("membership").unwrap_or("unknown"),
            source
        );
    });
}

fn room_label(event: &Event) -> &str {
    event.room_id.as_ref().map_or("-", |room_id| room_id.as_str())
}

/// Run one response through a fresh syncer and collect per-room results
pub async fn replay(
    session: Arc<MemorySession>,
    payload: SyncPayload,
    since: &str,
) -> Result<ReplayReport> {
    let start = Instant::now();
    let syncer = Syncer::new(session.clone());
    register_log_listeners(&syncer);

    let next_batch = payload.next_batch.clone();
    let summary = syncer.process_response(payload, since).await?;

    let mut rooms = Vec::new();
    for room_id in session.room_ids() {
        let Some(room) = session.room(&room_id) else {
            continue;
        };
        let room = room.read().await;
        rooms.push(RoomReport {
            room_id: room.id.to_string(),
            name: room.name().map(str::to_owned),
            state_events: room.state_count(),
            joined_members: room.joined_members().len(),
            has_left: room.has_left,
            prev_batch: room.prev_batch.clone(),
        });
    }

    info!("✅ Replay finished in {:?}", start.elapsed());
    Ok(ReplayReport {
        next_batch,
        summary,
        rooms,
    })
}
