// =============================================================================
// Roomsync - Concurrent Room Dispatcher
// =============================================================================
//
// Project: Roomsync - Matrix client sync-response engine
// Author: arkSong (arksong2018@gmail.com)
// Date: 2025-02-03
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Runs one unit of work per room of a sync response on the tokio runtime
//   and blocks the caller on a completion barrier until every unit is done.
//   Within a room, batches and events are processed strictly in order.
//   Across rooms there is no ordering at all.
//
// =============================================================================

use futures::FutureExt;
use ruma::api::client::sync::sync_events::v3::Rooms;
use ruma::serde::Raw;
use ruma::{OwnedRoomId, RoomId};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, error, instrument, warn};

use roomsync_core::{Event, EventSource, Result, RoomsyncError, SharedRoom, SyncSession};

use super::classifier;
use super::listeners::ListenerRegistry;
use super::payload::{self, RoomBucket, RoomUpdate};
use super::updater;

/// Outcome counters of one processed sync response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Room units that ran to completion
    pub rooms_processed: usize,
    /// Room units aborted by a lookup failure or a fault
    pub rooms_failed: usize,
    /// Events handed to the listener registry
    pub events_dispatched: usize,
    /// Events dropped by the classifier
    pub events_dropped: usize,
    /// Global events whose listeners panicked
    pub events_faulted: usize,
}

#[derive(Debug, Default)]
pub(crate) struct SyncStats {
    rooms_processed: AtomicUsize,
    rooms_failed: AtomicUsize,
    events_dispatched: AtomicUsize,
    events_dropped: AtomicUsize,
    events_faulted: AtomicUsize,
}

impl SyncStats {
    pub(crate) fn summary(&self) -> SyncSummary {
        SyncSummary {
            rooms_processed: self.rooms_processed.load(Ordering::Acquire),
            rooms_failed: self.rooms_failed.load(Ordering::Acquire),
            events_dispatched: self.events_dispatched.load(Ordering::Acquire),
            events_dropped: self.events_dropped.load(Ordering::Acquire),
            events_faulted: self.events_faulted.load(Ordering::Acquire),
        }
    }
}

/// Counts outstanding room units and wakes the waiter once all are done.
///
/// Sized up front, before the first unit is spawned, so a unit finishing
/// early can never release the waiter while others are still being started.
#[derive(Clone)]
pub struct CompletionBarrier {
    inner: Arc<BarrierState>,
}

struct BarrierState {
    remaining: AtomicUsize,
    notify: Notify,
}

/// Marks one unit as done when dropped, including during a panic unwind
pub struct CompletionGuard {
    inner: Arc<BarrierState>,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            inner: Arc::new(BarrierState {
                remaining: AtomicUsize::new(expected),
                notify: Notify::new(),
            }),
        }
    }

    /// Hand out the completion guard for one expected unit
    pub fn guard(&self) -> CompletionGuard {
        CompletionGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Wait until every expected unit has signalled
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a signal in between is not lost
            notified.as_mut().enable();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or_else(|n| n);
        if previous <= 1 {
            self.inner.notify.notify_waiters();
        }
    }
}

/// Shared context of the units working on one sync response
#[derive(Clone)]
pub(crate) struct Dispatcher {
    session: Arc<dyn SyncSession>,
    listeners: Arc<ListenerRegistry>,
    stats: Arc<SyncStats>,
}

impl Dispatcher {
    pub(crate) fn new(session: Arc<dyn SyncSession>, listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            session,
            listeners,
            stats: Arc::new(SyncStats::default()),
        }
    }

    pub(crate) fn summary(&self) -> SyncSummary {
        self.stats.summary()
    }

    /// Classify, apply and dispatch a batch of events in order.
    ///
    /// State events are written to `room` before their listeners run. Events
    /// that fail decoding or classification are logged and skipped. Without a
    /// room there is no unit to abort, so a panicking listener only costs the
    /// event it was called for.
    pub(crate) async fn process_events<T>(
        &self,
        room: Option<(&RoomId, &SharedRoom)>,
        events: &[Raw<T>],
        source: EventSource,
    ) {
        let room_id = room.map(|(room_id, _)| room_id);

        for raw in events {
            let event = match classifier::resolve_raw(raw, source, room_id) {
                Ok(event) => event,
                Err(e) => {
                    let content: Option<serde_json::Value> = raw.get_field("content").ok().flatten();
                    warn!(
                        event_id = ?raw_field(raw, "event_id"),
                        sender = ?raw_field(raw, "sender"),
                        room_id = ?room_id,
                        content = ?content,
                        "⚠️ Dropping {} event from {}: {}",
                        raw_field(raw, "type").unwrap_or_default(),
                        source,
                        e
                    );
                    self.stats.events_dropped.fetch_add(1, Ordering::AcqRel);
                    continue;
                }
            };

            match room {
                Some((_, room)) => {
                    if event.event_type.is_state() {
                        updater::apply_state(&mut *room.write().await, &event);
                    }
                    self.listeners.notify(source, &event);
                }
                None => {
                    if !self.notify_contained(source, &event) {
                        continue;
                    }
                }
            }
            self.stats.events_dispatched.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Notify listeners of a global event, catching a listener panic
    fn notify_contained(&self, source: EventSource, event: &Event) -> bool {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.listeners.notify(source, event)));
        match outcome {
            Ok(_) => true,
            Err(panic) => {
                self.stats.events_faulted.fetch_add(1, Ordering::AcqRel);
                let fault = RoomsyncError::WorkerFault(format!(
                    "{} listener for {}: {}",
                    source,
                    event.event_type,
                    panic_message(&*panic)
                ));
                error!("❌ {}", fault);
                false
            }
        }
    }

    /// Apply one room's delta: membership flag, summary, the event batches
    /// in state, timeline, ephemeral, account data order, then the
    /// pagination token.
    #[instrument(level = "debug", skip(self, update), fields(bucket = %update.bucket()))]
    pub(crate) async fn process_room(&self, room_id: &RoomId, update: &RoomUpdate) -> Result<()> {
        let room = self
            .session
            .get_room(room_id)
            .await
            .map_err(|e| match e {
                RoomsyncError::RoomLookup { .. } => e,
                other => RoomsyncError::RoomLookup {
                    room_id: room_id.to_owned(),
                    reason: other.to_string(),
                },
            })?;

        let bucket = update.bucket();
        {
            let mut room = room.write().await;
            if bucket == RoomBucket::Leave {
                updater::mark_left(&mut room);
            }
            if let RoomUpdate::Joined(joined) = update {
                updater::apply_summary(&mut room, &joined.summary);
            }
        }

        let base = bucket.source();
        let target = Some((room_id, &room));
        match update {
            RoomUpdate::Joined(joined) => {
                self.process_events(target, &joined.state.events, base | EventSource::STATE)
                    .await;
                self.process_events(target, &joined.timeline.events, base | EventSource::TIMELINE)
                    .await;
                self.process_events(target, &joined.ephemeral.events, base | EventSource::EPHEMERAL)
                    .await;
                self.process_events(
                    target,
                    &joined.account_data.events,
                    base | EventSource::ACCOUNT_DATA,
                )
                .await;
            }
            RoomUpdate::Invited(invited) => {
                self.process_events(target, &invited.invite_state.events, base | EventSource::STATE)
                    .await;
            }
            RoomUpdate::Left(left) => {
                self.process_events(target, &left.state.events, base | EventSource::STATE)
                    .await;
                self.process_events(target, &left.timeline.events, base | EventSource::TIMELINE)
                    .await;
                self.process_events(
                    target,
                    &left.account_data.events,
                    base | EventSource::ACCOUNT_DATA,
                )
                .await;
            }
        }

        updater::apply_pagination(&mut *room.write().await, update.prev_batch());
        Ok(())
    }

    /// Spawn one unit per room across all buckets and wait for all of them
    pub(crate) async fn dispatch_rooms(&self, rooms: Rooms) {
        let updates = payload::room_updates(rooms);
        let expected = updates.len();
        if expected == 0 {
            return;
        }

        let start = Instant::now();
        let barrier = CompletionBarrier::new(expected);
        for (room_id, update) in updates {
            let guard = barrier.guard();
            let unit = self.clone();
            tokio::spawn(async move {
                let _guard = guard;
                unit.run_room_unit(room_id, update).await;
            });
        }

        barrier.wait().await;
        debug!("✅ {} room units completed in {:?}", expected, start.elapsed());
    }

    async fn run_room_unit(&self, room_id: OwnedRoomId, update: RoomUpdate) {
        let start = Instant::now();
        let bucket = update.bucket();
        let outcome = AssertUnwindSafe(self.process_room(&room_id, &update))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.stats.rooms_processed.fetch_add(1, Ordering::AcqRel);
                debug!("🏠 Processed {} room {} in {:?}", bucket, room_id, start.elapsed());
            }
            Ok(Err(e)) => {
                self.stats.rooms_failed.fetch_add(1, Ordering::AcqRel);
                warn!("⚠️ Skipping {} room {}: {}", bucket, room_id, e);
            }
            Err(panic) => {
                self.stats.rooms_failed.fetch_add(1, Ordering::AcqRel);
                let fault = RoomsyncError::WorkerFault(format!(
                    "{} room {}: {}",
                    bucket,
                    room_id,
                    panic_message(&*panic)
                ));
                error!("❌ {}", fault);
            }
        }
    }
}

fn raw_field<T>(raw: &Raw<T>, name: &str) -> Option<String> {
    raw.get_field::<String>(name).ok().flatten()
}

pub(super) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
