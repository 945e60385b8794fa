//! Per-table commit ledgers.
//!
//! A [`TableLedger`] is the ordered in-memory sequence of commits the
//! coordinator has ratified for one table. It keeps every ordering rule the
//! coordinator relies on: versions strictly increase, the sequence is
//! contiguous past its first entry, a disown record is always last, and a
//! backfill that catches up with the ledger leaves exactly one record behind
//! as a sentinel so `last_ratified_version` survives the trim.

use crate::models::CommitFile;
use crate::{FileMeta, Version};

/// A single ratified commit. Immutable once appended; the only state change
/// a record ever sees is the sentinel promotion in
/// [`TableLedger::record_backfilled`].
#[derive(Debug, Clone)]
pub(crate) struct CommitRecord {
    version: Version,
    file: FileMeta,
    timestamp: i64,
    is_disown: bool,
    is_backfilled: bool,
}

impl CommitRecord {
    pub(crate) fn new(version: Version, file: FileMeta, timestamp: i64, is_disown: bool) -> Self {
        Self {
            version,
            file,
            timestamp,
            is_disown,
            is_backfilled: false,
        }
    }

    pub(crate) fn version(&self) -> Version {
        self.version
    }

    /// The reader-facing view of this record. The disown and backfilled
    /// flags are coordinator state and stay internal.
    fn to_commit_file(&self) -> CommitFile {
        CommitFile {
            version: self.version,
            file: self.file.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Ordered sequence of [`CommitRecord`]s for one table, plus the URI the
/// table was registered under. One ledger exists per coordinated table; the
/// coordinator wraps it in a reader/writer lock.
#[derive(Debug)]
pub(crate) struct TableLedger {
    table_uri: String,
    commits: Vec<CommitRecord>,
}

impl TableLedger {
    pub(crate) fn new(table_uri: impl Into<String>) -> Self {
        Self {
            table_uri: table_uri.into(),
            commits: Vec::new(),
        }
    }

    /// The URI the table was registered under. Immutable for the life of the
    /// ledger.
    pub(crate) fn table_uri(&self) -> &str {
        &self.table_uri
    }

    /// Version of the most recently ratified commit, or `-1` if nothing has
    /// ever been ratified.
    pub(crate) fn last_ratified_version(&self) -> Version {
        self.commits.last().map_or(-1, CommitRecord::version)
    }

    /// An active ledger accepts new commits: it has ratified at least one
    /// and has not been disowned.
    pub(crate) fn is_active(&self) -> bool {
        self.commits.last().is_some_and(|c| !c.is_disown)
    }

    pub(crate) fn is_disowned(&self) -> bool {
        self.commits.last().is_some_and(|c| c.is_disown)
    }

    /// Number of retained commits not yet reported as backfilled. The
    /// sentinel left behind by a full trim does not count against the
    /// window.
    pub(crate) fn unbackfilled_len(&self) -> usize {
        self.commits.iter().filter(|c| !c.is_backfilled).count()
    }

    /// Append a ratified record. The coordinator has already validated the
    /// version under the write lock; a non-extending version here is a bug.
    pub(crate) fn append(&mut self, record: CommitRecord) {
        assert!(
            self.commits
                .last()
                .is_none_or(|last| record.version > last.version),
            "ledger for '{}' would lose version monotonicity",
            self.table_uri,
        );
        self.commits.push(record);
    }

    /// Record that every commit up to `backfilled_version` is materialized
    /// in the table's log, and trim the window accordingly.
    ///
    /// A backfill that has caught up with the ledger keeps the final record
    /// and marks it backfilled instead of dropping it: readers must still be
    /// able to learn `last_ratified_version` from an otherwise fully trimmed
    /// ledger.
    pub(crate) fn record_backfilled(&mut self, backfilled_version: Version) {
        if backfilled_version == self.last_ratified_version() {
            if self.commits.len() > 1 {
                self.commits.drain(..self.commits.len() - 1);
            }
            if let Some(last) = self.commits.last_mut() {
                last.is_backfilled = true;
            }
        } else {
            self.commits.retain(|c| c.version > backfilled_version);
        }
    }

    /// Unbackfilled commits with versions in `[start, end]`, ascending.
    pub(crate) fn commits_in_range(&self, start: Version, end: Version) -> Vec<CommitFile> {
        self.commits
            .iter()
            .filter(|c| !c.is_backfilled && c.version >= start && c.version <= end)
            .map(CommitRecord::to_commit_file)
            .collect()
    }
}
