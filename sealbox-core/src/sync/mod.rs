//! Delta-based last-write-wins sync between the local cache and the remote store.
//!
//! - [`protocol`]: request/response bodies of one exchange
//! - [`merge`]: the remote half, run under the caller's resolved identity
//! - [`coordinator`]: the client half and the manual force overrides

pub mod coordinator;
pub mod merge;
pub mod protocol;

pub use coordinator::{pending_changes, SyncCoordinator};
pub use merge::{full_snapshot, merge_incoming};
pub use protocol::{SyncError, SyncReport, SyncRequest, SyncResponse};
