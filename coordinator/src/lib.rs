//! In-memory commit coordination for log-structured tables.
//!
//! Tables whose commits are *coordinated* do not rely on storage-level
//! put-if-absent to pick a winner among concurrent writers. Instead, writers
//! stage their commit file and ask a coordinator to **ratify** it at the next
//! version. The coordinator assigns contiguous, monotonically increasing
//! versions, holds a bounded window of commits that an external backfill
//! pipeline has not yet materialized in the table's log, and serves readers
//! that window plus the last ratified version so they know where log-file
//! discovery stops being enough.
//!
//! The entry points are:
//!
//! - [`CommitCoordinator`]: the client trait, [`commit`] and [`get_commits`]
//!   over the value types in [`models`].
//! - [`InMemoryCommitCoordinator`]: the reference implementation. State is
//!   held in process memory only; it backs tests and serves as the template
//!   for network-backed coordinators.
//! - [`registry`]: name-keyed and catalog-keyed builder registries through
//!   which engines resolve a coordinator client from table configuration.
//!
//! [`commit`]: CommitCoordinator::commit
//! [`get_commits`]: CommitCoordinator::get_commits
//!
//! # Example
//!
//! ```
//! use commit_coordinator::{
//!     Commit, CommitCoordinator, CommitRequest, CommitsRequest, InMemoryCommitCoordinator,
//! };
//!
//! # fn main() -> commit_coordinator::CoordinatorResult<()> {
//! let coordinator = InMemoryCommitCoordinator::new();
//! let table_id = "2f9e3c46-6dd9-4b77-9b29-0ed845765132";
//! let table_uri = "s3://bucket/table";
//!
//! // ratify the table's first commit
//! let staged = Commit::new(
//!     0,
//!     1_724_265_600_000,
//!     "00000000000000000000.3a0d65cd-4a56-49a8-937b-95f9e3ee90e5.json",
//!     42,
//!     1_724_265_600_000,
//! );
//! coordinator.commit(CommitRequest::new(table_id, table_uri, staged))?;
//!
//! // readers get the unbackfilled window plus the last ratified version
//! let window = coordinator.get_commits(CommitsRequest::new(table_id, table_uri))?;
//! assert_eq!(window.latest_table_version, 0);
//! assert_eq!(window.commits.len(), 1);
//!
//! // once the backfill pipeline reports progress, the window trims
//! coordinator.commit(CommitRequest::backfill_only(table_id, table_uri, 0))?;
//! let window = coordinator.get_commits(CommitsRequest::new(table_id, table_uri))?;
//! assert!(window.commits.is_empty());
//! assert_eq!(window.latest_table_version, 0);
//! # Ok(())
//! # }
//! ```

use std::any::Any;

use serde::{Deserialize, Serialize};
use url::Url;

pub mod coordinator;
pub mod error;
pub mod models;
pub(crate) mod path;
pub mod registry;
pub(crate) mod utils;

pub use crate::coordinator::{
    clients_equal, CommitCoordinator, InMemoryCommitCoordinator, MAX_UNBACKFILLED_COMMITS,
};
pub use crate::error::{CoordinatorResult, Error};
pub use crate::models::{Commit, CommitFile, CommitRequest, CommitsRequest, CommitsResponse};

/// The version of a commit within a table's ledger. Ratified versions are
/// non-negative; `-1` in a response means "never committed through this
/// coordinator".
pub type Version = i64;

/// The size of a commit file, in bytes.
pub type FileSize = u64;

/// The metadata of a commit file: where it lives (or will live once
/// backfilled), how big it is, and when it was last modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMeta {
    /// The fully qualified location of the file.
    pub location: Url,
    /// The last modified time as milliseconds since unix epoch.
    pub last_modified: i64,
    /// The size of the file in bytes.
    pub size: FileSize,
}

/// Extension trait that makes it easier to work with traits objects that implement [`Any`],
/// implemented automatically for any type that satisfies `Any`, `Send`, and `Sync`. In
/// particular, given some `trait T: AsAny`, it allows upcasting `T` to `dyn Any + Send + Sync`,
/// which supports downcasting to a concrete type.
pub trait AsAny: Any + Send + Sync {
    /// Obtains a `dyn Any` reference to the object.
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
