//! Failed sync policy

use std::time::Duration;
use tracing::warn;

use roomsync_core::{Result, RetryAfter, RoomsyncError};

use super::payload::SyncPayload;

/// Pause before polling again after a failed sync
pub const FAILED_SYNC_BACKOFF: Duration = Duration::from_secs(10);

/// Decide how long the polling loop backs off after a failed request.
///
/// Always a fixed delay and never an error, so the loop keeps retrying.
pub fn on_failed_sync(
    payload: Option<&SyncPayload>,
    error: Option<&RoomsyncError>,
) -> Result<RetryAfter> {
    match error {
        Some(error) => warn!(
            "🔄 Sync failed ({}), retrying in {:?}",
            error, FAILED_SYNC_BACKOFF
        ),
        None => warn!(
            "🔄 Sync failed with{} payload, retrying in {:?}",
            if payload.is_some() { "" } else { "out" },
            FAILED_SYNC_BACKOFF
        ),
    }
    Ok(RetryAfter::new(FAILED_SYNC_BACKOFF))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_fixed_backoff() {
        let transport = RoomsyncError::Transport("connection reset".to_owned());
        let payload = SyncPayload::default();

        for (payload, error) in [
            (None, None),
            (Some(&payload), None),
            (None, Some(&transport)),
            (Some(&payload), Some(&transport)),
        ] {
            let retry = on_failed_sync(payload, error).unwrap();
            assert_eq!(retry.0, FAILED_SYNC_BACKOFF);
            assert_eq!(retry.as_secs(), 10);
        }
    }
}
