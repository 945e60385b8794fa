//! The `coordinator` module provides a [`CommitCoordinator`] trait which allows different
//! implementations to define how commits to a table are ratified, held, and served back to
//! readers. A commit coordinator mediates concurrent writers: it assigns contiguous,
//! monotonically increasing versions, keeps a bounded window of commits that an external
//! backfill pipeline has not yet materialized in the table's log, and answers readers with
//! that window plus the last ratified version so they know where log-file discovery stops
//! being enough.
//!
//! The [`InMemoryCommitCoordinator`] is the reference implementation: all state is held in
//! process memory and vanishes with the process. It is used for testing and as a template for
//! network-backed coordinators, which implement the same trait over a catalog or service
//! and plug in through the builder registries in [`crate::registry`].
//!
//! [`InMemoryCommitCoordinator`]: crate::coordinator::InMemoryCommitCoordinator

mod in_memory;
mod ledger;

pub use in_memory::{InMemoryCommitCoordinator, MAX_UNBACKFILLED_COMMITS};

use std::sync::Arc;

use crate::models::{CommitRequest, CommitsRequest, CommitsResponse};
use crate::{AsAny, CoordinatorResult};

/// A `CommitCoordinator` is the system by which commits to a coordinated table are ratified.
/// Writers hand it a [`CommitRequest`] naming the staged file and the version they want; the
/// coordinator either ratifies the commit or reports why it cannot (a version conflict, a
/// full unbackfilled window, a table it does not coordinate). Readers ask for the current
/// window with [`get_commits`].
///
/// [`get_commits`]: CommitCoordinator::get_commits
//
// Note: we keep the Send + Sync bounds so usage can be Arc<dyn CommitCoordinator> shared
// across writer and reader threads without further qualification.
pub trait CommitCoordinator: Send + Sync + AsAny + std::fmt::Debug {
    /// Ratify a new commit for a table and/or record backfill progress.
    ///
    /// The request must carry a commit payload, a
    /// `last_known_backfilled_version`, or both. A payload-carrying request
    /// for an unknown table registers the table first.
    fn commit(&self, request: CommitRequest) -> CoordinatorResult<()>;

    /// The table's current unbackfilled window and last ratified version.
    ///
    /// An unknown table yields an empty window with `latest_table_version`
    /// of `-1`; it is not an error.
    fn get_commits(&self, request: CommitsRequest) -> CoordinatorResult<CommitsResponse>;

    /// Whether `other` coordinates commits through the same underlying state
    /// or service. Callers use this to decide whether an existing client can
    /// be reused when table configuration changes hands them a new one.
    fn is_same_coordinator(&self, other: &dyn CommitCoordinator) -> bool;
}

/// Semantic equality over optional coordinator clients: equal when both are
/// absent, or when both are present and declare themselves equivalent via
/// [`CommitCoordinator::is_same_coordinator`].
pub fn clients_equal(
    a: Option<&Arc<dyn CommitCoordinator>>,
    b: Option<&Arc<dyn CommitCoordinator>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_same_coordinator(b.as_ref()),
        _ => false,
    }
}
