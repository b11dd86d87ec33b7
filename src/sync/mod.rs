use std::time::Duration;

use thiserror::Error;

use crate::remote::RemoteError;

pub mod pull;
pub mod push;

pub use pull::pull;
pub use push::push;

/// Remote batch commits are bounded at 400 pending merge-writes, the
/// backend's multi-document write limit.
pub const BATCH_LIMIT: usize = 400;

/// How long the push loop yields after each committed batch so the caller's
/// event loop is never starved.
pub const BATCH_YIELD: Duration = Duration::from_millis(10);

/// Pull reports fractional progress (0.0–1.0); push reports integer percent
/// (0–100). The two scales are intentionally different and kept apart by
/// the callback types.
pub type PullProgress<'a> = &'a mut dyn FnMut(f64);
pub type PushProgress<'a> = &'a mut dyn FnMut(u8);

#[derive(Debug, Error)]
pub enum SyncError {
    /// Raised synchronously before any I/O; the caller should prompt
    /// re-authentication.
    #[error("user is not signed in")]
    NotSignedIn,
    /// A remote read or a batch commit failed. For pull this happens
    /// strictly before the local transaction opens, so the local store is
    /// untouched; for push, batches committed before the failure stand and
    /// a retry from scratch is safe.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Local store failure. Pull's surrounding transaction rolls back.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Local store surface failure while enumerating rows for push.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}
