//! Error types for roomsync
//!
//! Nothing raised while processing a sync response is globally fatal. The
//! variants below let each layer say how far a failure reaches: a single
//! event (`ContentParse`, `UnsupportedContent`), a single room
//! (`RoomLookup`, `WorkerFault`), or a single sync attempt (`Transport`).

use ruma::OwnedRoomId;
use std::io;
use thiserror::Error;

/// Roomsync error types
#[derive(Debug, Error)]
pub enum RoomsyncError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event content did not match the schema of its resolved type
    #[error("Malformed {event_type} content: {reason}")]
    ContentParse { event_type: String, reason: String },

    /// No content schema is known for the resolved event type
    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    /// The room provider could not resolve a room
    #[error("Room lookup failed for {room_id}: {reason}")]
    RoomLookup { room_id: OwnedRoomId, reason: String },

    /// A room unit failed unexpectedly
    #[error("Worker fault: {0}")]
    WorkerFault(String),

    /// The transport failed to deliver a sync response
    #[error("Sync transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for roomsync operations
pub type Result<T> = std::result::Result<T, RoomsyncError>;

impl RoomsyncError {
    /// True for failures that only cost a single event.
    pub fn is_event_local(&self) -> bool {
        matches!(
            self,
            RoomsyncError::ContentParse { .. } | RoomsyncError::UnsupportedContent(_)
        )
    }
}

impl From<serde_json::Error> for RoomsyncError {
    fn from(err: serde_json::Error) -> Self {
        RoomsyncError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_error_display() {
        let err = RoomsyncError::Config("test".to_string());
        assert_eq!(err.to_string(), "Configuration error: test");

        let err = RoomsyncError::ContentParse {
            event_type: "m.room.member".to_string(),
            reason: "missing field `membership`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed m.room.member content: missing field `membership`"
        );

        let err = RoomsyncError::UnsupportedContent("com.example.custom".to_string());
        assert_eq!(err.to_string(), "Unsupported content type: com.example.custom");

        let err = RoomsyncError::RoomLookup {
            room_id: ruma::room_id!("!abc:example.org").to_owned(),
            reason: "gone".to_string(),
        };
        assert_eq!(err.to_string(), "Room lookup failed for !abc:example.org: gone");

        let err = RoomsyncError::WorkerFault("test".to_string());
        assert_eq!(err.to_string(), "Worker fault: test");

        let err = RoomsyncError::Transport("test".to_string());
        assert_eq!(err.to_string(), "Sync transport error: test");

        let err = RoomsyncError::InvalidState("test".to_string());
        assert_eq!(err.to_string(), "Invalid state: test");
    }

    #[test]
    fn test_event_local_errors() {
        assert!(RoomsyncError::UnsupportedContent("x".into()).is_event_local());
        assert!(RoomsyncError::ContentParse {
            event_type: "m.typing".into(),
            reason: "bad".into()
        }
        .is_event_local());
        assert!(!RoomsyncError::WorkerFault("x".into()).is_event_local());
        assert!(!RoomsyncError::Transport("x".into()).is_event_local());
    }

    #[test]
    fn test_error_conversion_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let err: RoomsyncError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_conversion_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: RoomsyncError = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
