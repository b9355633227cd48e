// =============================================================================
// Roomsync - Sync Response Processing
// =============================================================================
//
// Project: Roomsync - Matrix client sync-response engine
// Author: arkSong (arksong2018@gmail.com)
// Date: 2025-02-03
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Entry point of the engine. A `Syncer` takes one decoded sync response,
//   dispatches global presence and account data, fans the rooms out to
//   concurrent room units and returns once every unit has finished.
//
// Processing order:
//   • Global presence, then global account data, on the calling task,
//     each listener call behind its own panic boundary
//   • One unit per joined, invited and left room, all in parallel
//   • Completion barrier
//   • First-sync bookkeeping and the init-done callback
//
// =============================================================================

pub mod classifier;
pub mod dispatcher;
pub mod failure;
pub mod filter;
pub mod listeners;
pub mod payload;
pub mod updater;

use ruma::api::client::filter::FilterDefinition;
use ruma::UserId;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use roomsync_core::{
    EventHandler, EventSource, EventType, Result, RetryAfter, RoomsyncError, SyncSession,
};

pub use dispatcher::{CompletionBarrier, CompletionGuard, SyncSummary};
pub use failure::FAILED_SYNC_BACKOFF;
pub use filter::TIMELINE_LIMIT;
pub use listeners::ListenerRegistry;
pub use payload::{RoomBucket, RoomUpdate, SyncPayload};

use dispatcher::Dispatcher;

type InitDoneCallback = Box<dyn FnOnce() + Send>;

enum InitDone {
    Unset,
    Pending(InitDoneCallback),
    Fired,
}

/// Processes sync responses for one session
pub struct Syncer {
    session: Arc<dyn SyncSession>,
    listeners: Arc<ListenerRegistry>,
    first_sync_done: AtomicBool,
    init_done: Mutex<InitDone>,
}

impl Syncer {
    pub fn new(session: Arc<dyn SyncSession>) -> Self {
        Self {
            session,
            listeners: Arc::new(ListenerRegistry::new()),
            first_sync_done: AtomicBool::new(false),
            init_done: Mutex::new(InitDone::Unset),
        }
    }

    pub fn session(&self) -> &Arc<dyn SyncSession> {
        &self.session
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Register a handler for one class-qualified event type
    pub fn on_event_type<H>(&self, event_type: EventType, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.listeners.register(event_type, handler);
    }

    /// Set the callback fired once the first initial sync has been processed.
    ///
    /// Can only be set once.
    pub fn set_init_done_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.init_done.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            InitDone::Unset => {
                *slot = InitDone::Pending(Box::new(callback));
                Ok(())
            }
            InitDone::Pending(_) | InitDone::Fired => Err(RoomsyncError::InvalidState(
                "init done callback already set".to_owned(),
            )),
        }
    }

    /// True once any sync response has been fully processed
    pub fn first_sync_done(&self) -> bool {
        self.first_sync_done.load(Ordering::Acquire)
    }

    /// Process one sync response.
    ///
    /// `since` is the token the response was requested with; an empty token
    /// marks an initial sync. Returns after every room unit has finished.
    #[instrument(level = "debug", skip(self, payload), fields(rooms = payload.room_count()))]
    pub async fn process_response(&self, payload: SyncPayload, since: &str) -> Result<SyncSummary> {
        let start = Instant::now();
        let initial = since.is_empty();
        if initial {
            debug!("🔧 Initial sync, pausing room unloading");
            self.session.disable_unloading();
        }

        let dispatcher = Dispatcher::new(self.session.clone(), self.listeners.clone());
        dispatcher
            .process_events(None, &payload.presence.events, EventSource::PRESENCE)
            .await;
        dispatcher
            .process_events(None, &payload.account_data.events, EventSource::ACCOUNT_DATA)
            .await;
        dispatcher.dispatch_rooms(payload.rooms).await;

        self.first_sync_done.store(true, Ordering::Release);
        if initial {
            if let Some(callback) = self.take_init_done_callback() {
                debug!("🎉 Running init done callback");
                if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                    let fault = RoomsyncError::WorkerFault(format!(
                        "init done callback: {}",
                        dispatcher::panic_message(&*panic)
                    ));
                    error!("❌ {}", fault);
                }
            }
            self.session.enable_unloading();
        }

        let summary = dispatcher.summary();
        info!(
            "✅ Processed sync {} in {:?}: {} rooms ({} failed), {} events ({} dropped, {} faulted)",
            if initial { "(initial)" } else { since },
            start.elapsed(),
            summary.rooms_processed,
            summary.rooms_failed,
            summary.events_dispatched,
            summary.events_dropped,
            summary.events_faulted
        );
        Ok(summary)
    }

    /// Backoff after a failed sync request
    pub fn on_failed_sync(
        &self,
        payload: Option<&SyncPayload>,
        error: Option<&RoomsyncError>,
    ) -> Result<RetryAfter> {
        failure::on_failed_sync(payload, error)
    }

    /// Filter to upload at session start
    pub fn get_filter(&self, user_id: &UserId) -> FilterDefinition {
        filter::build_filter(user_id)
    }

    fn take_init_done_callback(&self) -> Option<InitDoneCallback> {
        let mut slot = self.init_done.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, InitDone::Fired) {
            InitDone::Pending(callback) => Some(callback),
            other => {
                *slot = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use async_trait::async_trait;
    use mockall::{mock, Sequence};
    use roomsync_core::event_types::*;
    use roomsync_core::{Event, Room, SharedRoom};
    use ruma::api::client::sync::sync_events::v3::JoinedRoom;
    use ruma::serde::Raw;
    use ruma::{OwnedRoomId, OwnedUserId, RoomId};
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::RwLock;

    mock! {
        Session {}
        #[async_trait]
        impl SyncSession for Session {
            async fn get_room(&self, room_id: &RoomId) -> Result<SharedRoom>;
            fn user_id(&self) -> OwnedUserId;
            fn disable_unloading(&self);
            fn enable_unloading(&self);
        }
    }

    fn raw<T>(value: Value) -> Raw<T> {
        Raw::new(&value).unwrap().cast()
    }

    fn message<T>(body: &str) -> Raw<T> {
        raw(json!({
            "type": "m.room.message",
            "sender": "@bob:example.org",
            "content": {"msgtype": "m.text", "body": body}
        }))
    }

    fn joined(rooms: &[&str]) -> SyncPayload {
        let mut payload = SyncPayload::default();
        for room_id in rooms {
            let mut room = JoinedRoom::new();
            room.timeline.events.push(message("hello"));
            room.timeline.prev_batch = Some(format!("p_{}", room_id.trim_start_matches('!')));
            let room_id = OwnedRoomId::try_from(*room_id).unwrap();
            payload.rooms.join.insert(room_id, room);
        }
        payload
    }

    fn mock_with_rooms() -> MockSession {
        let mut mock = MockSession::new();
        mock.expect_get_room()
            .returning(|room_id| Ok(Arc::new(RwLock::new(Room::new(room_id.to_owned())))));
        mock
    }

    #[test_log::test(tokio::test)]
    async fn test_initial_sync_toggles_unloading() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut seq = Sequence::new();
        let mut mock = mock_with_rooms();
        mock.expect_disable_unloading()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let seen = fired.clone();
        mock.expect_enable_unloading()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || assert!(seen.load(Ordering::SeqCst), "callback runs first"));

        let syncer = Syncer::new(Arc::new(mock));
        let flag = fired.clone();
        syncer
            .set_init_done_callback(move || flag.store(true, Ordering::SeqCst))
            .unwrap();

        syncer
            .process_response(joined(&["!a:example.org"]), "")
            .await
            .unwrap();
        assert!(fired.load(Ordering::SeqCst));
        assert!(syncer.first_sync_done());
    }

    #[test_log::test(tokio::test)]
    async fn test_initial_sync_without_callback_reenables_unloading() {
        let mut mock = mock_with_rooms();
        mock.expect_disable_unloading().times(1).return_const(());
        mock.expect_enable_unloading().times(1).return_const(());

        let syncer = Syncer::new(Arc::new(mock));
        syncer.process_response(SyncPayload::default(), "").await.unwrap();
        assert!(syncer.first_sync_done());
    }

    #[test_log::test(tokio::test)]
    async fn test_incremental_sync_leaves_unloading_alone() {
        let mut mock = mock_with_rooms();
        mock.expect_disable_unloading().never();
        mock.expect_enable_unloading().never();

        let syncer = Syncer::new(Arc::new(mock));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        syncer
            .set_init_done_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(!syncer.first_sync_done());
        syncer
            .process_response(joined(&["!a:example.org"]), "s1_2_3")
            .await
            .unwrap();
        assert!(syncer.first_sync_done());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_init_done_callback_fires_once() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        syncer
            .set_init_done_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        syncer.process_response(SyncPayload::default(), "").await.unwrap();
        syncer.process_response(SyncPayload::default(), "").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.unloading_enabled());

        let err = syncer.set_init_done_callback(|| {}).unwrap_err();
        assert!(matches!(err, RoomsyncError::InvalidState(_)));
    }

    #[test_log::test]
    fn test_init_done_callback_settable_once() {
        let syncer = Syncer::new(Arc::new(MockSession::new()));
        syncer.set_init_done_callback(|| {}).unwrap();
        assert!(syncer.set_init_done_callback(|| {}).is_err());
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_faulting_room_does_not_stall_the_sync() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session.clone());
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        syncer.on_event_type(EVENT_MESSAGE, move |_: EventSource, event: &Event| {
            if event.room_id.as_deref() == Some(ruma::room_id!("!bad:example.org")) {
                panic!("listener failure");
            }
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let payload = joined(&["!a:example.org", "!bad:example.org", "!c:example.org"]);
        let summary = syncer.process_response(payload, "s1").await.unwrap();

        assert_eq!(summary.rooms_processed, 2);
        assert_eq!(summary.rooms_failed, 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        assert!(syncer.first_sync_done());
    }

    #[test_log::test(tokio::test)]
    async fn test_lookup_failure_skips_only_that_room() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        session.refuse_room(ruma::room_id!("!refused:example.org"));
        let syncer = Syncer::new(session.clone());

        let payload = joined(&["!ok:example.org", "!refused:example.org"]);
        let summary = syncer.process_response(payload, "").await.unwrap();

        assert_eq!(summary.rooms_processed, 1);
        assert_eq!(summary.rooms_failed, 1);
        assert_eq!(summary.events_dispatched, 1);
        assert!(session.room(ruma::room_id!("!refused:example.org")).is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_global_batches_have_no_room() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session.clone());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        for event_type in [EPHEMERAL_PRESENCE, ACCOUNT_DATA_DIRECT_CHATS] {
            let seen = seen.clone();
            syncer.on_event_type(event_type, move |source: EventSource, event: &Event| {
                assert!(event.room_id.is_none());
                seen.lock().unwrap().push(source);
            });
        }

        let mut payload = SyncPayload::default();
        payload.account_data.events.push(raw(json!({
            "type": "m.direct",
            "content": {"@bob:example.org": ["!dm:example.org"]}
        })));
        payload.presence.events.push(raw(json!({
            "type": "m.presence",
            "sender": "@bob:example.org",
            "content": {"presence": "online"}
        })));

        syncer.process_response(payload, "s1").await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventSource::PRESENCE, EventSource::ACCOUNT_DATA]
        );
        assert_eq!(session.room_count(), 0);
    }

    #[test_log::test]
    fn test_failed_sync_and_filter() {
        let syncer = Syncer::new(Arc::new(MockSession::new()));
        let err = RoomsyncError::Transport("timeout".to_owned());
        assert_eq!(
            syncer.on_failed_sync(None, Some(&err)).unwrap().0,
            FAILED_SYNC_BACKOFF
        );

        let filter = syncer.get_filter(ruma::user_id!("@me:example.org"));
        assert_eq!(filter.room.timeline.limit, Some(ruma::UInt::from(TIMELINE_LIMIT)));
    }

    #[test_log::test(tokio::test)]
    async fn test_panicking_presence_listener_does_not_block_rooms() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session.clone());
        syncer.on_event_type(EPHEMERAL_PRESENCE, |_: EventSource, _: &Event| {
            panic!("presence listener failure");
        });
        let messages = Arc::new(AtomicUsize::new(0));
        let counter = messages.clone();
        syncer.on_event_type(EVENT_MESSAGE, move |_: EventSource, _: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut payload = joined(&["!a:example.org"]);
        payload.presence.events.push(raw(json!({
            "type": "m.presence",
            "sender": "@bob:example.org",
            "content": {"presence": "online"}
        })));

        let summary = syncer.process_response(payload, "").await.unwrap();
        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(summary.rooms_processed, 1);
        assert_eq!(summary.events_faulted, 1);
        assert!(session.unloading_enabled());
        assert!(syncer.first_sync_done());
    }

    #[test_log::test(tokio::test)]
    async fn test_panicking_init_done_callback_still_reenables_unloading() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session.clone());
        syncer
            .set_init_done_callback(|| panic!("init done failure"))
            .unwrap();

        syncer
            .process_response(joined(&["!a:example.org"]), "")
            .await
            .unwrap();
        assert!(session.unloading_enabled());
        assert!(syncer.first_sync_done());
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_init_done_callback_runs_after_every_room() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session.clone());
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        syncer.on_event_type(EVENT_MESSAGE, move |_: EventSource, _: &Event| {
            std::thread::sleep(Duration::from_millis(5));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let room_ids: Vec<String> = (0..12).map(|i| format!("!room{i}:example.org")).collect();
        let observed = Arc::new(Mutex::new(None));
        let (count, lookup, slot) = (delivered.clone(), session.clone(), observed.clone());
        syncer
            .set_init_done_callback(move || {
                let tokens: Vec<String> = lookup
                    .room_ids()
                    .iter()
                    .filter_map(|room_id| lookup.room(room_id))
                    .map(|room| {
                        room.try_read()
                            .map(|room| room.prev_batch.clone())
                            .unwrap_or_default()
                    })
                    .collect();
                *slot.lock().unwrap() = Some((count.load(Ordering::SeqCst), tokens));
            })
            .unwrap();

        let names: Vec<&str> = room_ids.iter().map(String::as_str).collect();
        syncer.process_response(joined(&names), "").await.unwrap();

        let (count, tokens) = observed.lock().unwrap().take().expect("callback fired");
        assert_eq!(count, room_ids.len());
        assert_eq!(tokens.len(), room_ids.len());
        assert!(tokens.iter().all(|token| token.starts_with("p_room")));
    }

    #[test_log::test(tokio::test)]
    async fn test_unset_callback_stays_settable_after_initial_sync() {
        let session = Arc::new(MemorySession::new(ruma::user_id!("@me:example.org").to_owned()));
        let syncer = Syncer::new(session);
        syncer.process_response(SyncPayload::default(), "").await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        syncer
            .set_init_done_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        syncer.process_response(SyncPayload::default(), "").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
