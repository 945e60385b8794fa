//! Error types for the commit coordinator.

use crate::Version;

/// A [`std::result::Result`] that has the coordinator [`Error`] as the error variant.
pub type CoordinatorResult<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while coordinating commits.
///
/// Validation failures never mutate a ledger. The one exception is an
/// [`IoFailure`] surfaced after a commit was appended: the commit stays
/// ratified even though the caller only sees the error (see
/// [`InMemoryCommitCoordinator::inject_failure_after_commit`]).
///
/// [`IoFailure`]: Error::IoFailure
/// [`InMemoryCommitCoordinator::inject_failure_after_commit`]:
///     crate::coordinator::InMemoryCommitCoordinator::inject_failure_after_commit
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The request was missing required fields or internally inconsistent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request's table URI does not match the URI the table was
    /// registered with, or the request targets a table this coordinator does
    /// not coordinate.
    #[error("Invalid target table: {0}")]
    InvalidTargetTable(String),

    /// The table's ledger ends in a disown record; ownership has been handed
    /// to another coordinator (or back to log-file discovery) and no further
    /// commits are accepted here.
    #[error("Table '{0}' has been disowned by this coordinator")]
    TableDisowned(String),

    /// The table's unbackfilled window is full. Retryable once the backfill
    /// pipeline reports progress.
    #[error(
        "Table '{table_id}' already has {limit} unbackfilled commits; \
         backfill must catch up before new commits are ratified"
    )]
    CommitLimitReached {
        /// Table whose window is exhausted.
        table_id: String,
        /// The window bound in effect.
        limit: usize,
    },

    /// The commit's version does not extend the ledger. `retryable` (and
    /// `conflict`) hold exactly when the attempted version was behind the
    /// expected one, i.e. the writer lost a race and can rebase and retry.
    #[error("Commit version {attempted} conflicts with expected version {expected}")]
    CommitConflict {
        /// Version the writer asked to ratify.
        attempted: Version,
        /// The only version the ledger would have accepted.
        expected: Version,
        /// Whether another writer won the attempted version.
        conflict: bool,
        /// Whether rebasing onto the current version can succeed.
        retryable: bool,
    },

    /// An I/O failure on the commit path. If it was raised after the append
    /// (see the fault-injection toggles), the commit may have been ratified
    /// even though the caller never got an acknowledgement.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// A builder under the same name already exists in the registry.
    #[error("Commit coordinator builder '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No builder is registered under the requested name.
    #[error("Unknown commit coordinator: {0}")]
    UnknownCoordinator(String),

    /// The table URI could not be interpreted as a base location for commit
    /// files.
    #[error("Invalid table location: {0}")]
    InvalidTableLocation(String),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl ToString) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub(crate) fn invalid_target_table(msg: impl ToString) -> Self {
        Self::InvalidTargetTable(msg.to_string())
    }

    pub(crate) fn io_failure(msg: impl ToString) -> Self {
        Self::IoFailure(msg.to_string())
    }

    pub(crate) fn invalid_table_location(location: impl ToString) -> Self {
        Self::InvalidTableLocation(location.to_string())
    }

    pub(crate) fn commit_conflict(attempted: Version, expected: Version) -> Self {
        let behind = attempted < expected;
        Self::CommitConflict {
            attempted,
            expected,
            conflict: behind,
            retryable: behind,
        }
    }

    /// Whether the caller may retry the failed operation as-is (possibly
    /// after making progress elsewhere, e.g. backfilling).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::CommitLimitReached { .. } => true,
            Error::CommitConflict { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
