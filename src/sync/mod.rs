//! Reconciliation with the remote copy

mod coordinator;
mod merge;
mod remote;
mod sqlite_remote;

pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use merge::{merge, merge_progress};
pub use remote::{
    BadgeRow, MemoryRemote, ProgressPayload, ProgressRow, RemoteStore, badges_from_rows,
    snapshot_from_remote,
};
pub use sqlite_remote::SqliteRemote;
