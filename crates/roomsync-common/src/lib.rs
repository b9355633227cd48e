// =============================================================================
// Roomsync - Common Library
// =============================================================================
//
// Project: Roomsync - Matrix client sync-response engine
// Author: arkSong (arksong2018@gmail.com)
// Date: 2025-02-03
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Error taxonomy shared by every roomsync crate.
//
// =============================================================================

pub mod error;

pub use error::{Result, RoomsyncError};
