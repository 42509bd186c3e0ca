//! Sync coordinator: one CRUD and subscribe surface over both stores.
//!
//! # Rules
//!
//! - Writes land locally first; a local failure fails the operation.
//! - Reads hit the local store first and fall through to the remote on a miss,
//!   caching what they find.
//! - Full scans merge local and remote by key, the remote copy winning, and
//!   write every remote record back locally.
//! - Remote failures are logged at `warn` and otherwise ignored.
//!
//! # Remote write modes
//!
//! `sync.remote_writes = "detached"` (default) queues remote writes on a
//! background FIFO so callers return as soon as the local write commits. Call
//! [`SyncCoordinator::flush`] to wait for them, e.g. before process exit.
//! `"awaited"` performs each remote write inline.

mod coordinator;
mod error;
mod replicator;
mod subscription;

pub use coordinator::{SyncCoordinator, fields};
pub(crate) use coordinator::decode_all;
pub use error::*;
pub use subscription::{SnapshotCallback, Subscription, SubscriptionMode};
