//! Reference in-memory implementation of [`CommitCoordinator`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use super::ledger::{CommitRecord, TableLedger};
use super::CommitCoordinator;
use crate::models::{Commit, CommitRequest, CommitsRequest, CommitsResponse};
use crate::path::LogRoot;
use crate::utils::require;
use crate::{CoordinatorResult, Error, FileMeta};

/// Default bound on a table's unbackfilled window. Once this many ratified
/// commits await backfill, further commits are refused until the backfill
/// pipeline reports progress.
pub const MAX_UNBACKFILLED_COMMITS: usize = 10;

type LedgerMap = HashMap<String, Arc<RwLock<TableLedger>>>;

/// An in-memory commit coordinator.
///
/// All state lives in process memory; nothing survives the process. This is
/// the reference implementation used in tests and as a template for
/// network-backed coordinators. Tables register implicitly on their first
/// payload-carrying commit and their ledgers live until the process exits:
/// a disowned ledger is kept so later readers still observe the disown.
///
/// The coordinator is safe to share across threads behind an `Arc`: the
/// table map takes its own reader/writer lock, and each ledger takes another
/// held for the full validation + mutation of a commit, so readers observe
/// either the full pre-state or the full post-state of any writer.
#[derive(Debug)]
pub struct InMemoryCommitCoordinator {
    ledgers: RwLock<LedgerMap>,
    max_unbackfilled_commits: usize,
    fail_before_commit: AtomicBool,
    fail_after_commit: AtomicBool,
}

impl InMemoryCommitCoordinator {
    /// A coordinator with the default window bound of
    /// [`MAX_UNBACKFILLED_COMMITS`].
    pub fn new() -> Self {
        Self::with_max_unbackfilled_commits(MAX_UNBACKFILLED_COMMITS)
    }

    /// A coordinator bounding every table's unbackfilled window at `limit`
    /// commits.
    pub fn with_max_unbackfilled_commits(limit: usize) -> Self {
        Self {
            ledgers: RwLock::new(HashMap::new()),
            max_unbackfilled_commits: limit,
            fail_before_commit: AtomicBool::new(false),
            fail_after_commit: AtomicBool::new(false),
        }
    }

    /// Arrange for the next commit attempt to fail with an I/O error before
    /// any ledger mutation. One-shot: observing the failure clears it.
    pub fn inject_failure_before_commit(&self) {
        self.fail_before_commit.store(true, Ordering::SeqCst);
    }

    /// Arrange for the next commit call to fail with an I/O error after the
    /// commit (if any) was appended but before backfill progress is
    /// recorded. One-shot. This models a coordinator that ratified a commit
    /// but failed to acknowledge it to the caller.
    pub fn inject_failure_after_commit(&self) {
        self.fail_after_commit.store(true, Ordering::SeqCst);
    }

    // Lock poisoning is not propagated: every mutation below is a single
    // push/retain/drain on a ledger's commit vector, so a panicking peer
    // cannot leave a ledger half-updated.
    fn ledgers_read(&self) -> RwLockReadGuard<'_, LedgerMap> {
        self.ledgers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledgers_write(&self) -> RwLockWriteGuard<'_, LedgerMap> {
        self.ledgers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledger(&self, table_id: &str) -> Option<Arc<RwLock<TableLedger>>> {
        self.ledgers_read().get(table_id).cloned()
    }

    /// Insert-if-absent registration. When two writers race to register the
    /// same table, the loser keeps the winner's ledger.
    fn register_table(&self, table_id: &str, table_uri: &str) -> Arc<RwLock<TableLedger>> {
        self.ledgers_write()
            .entry(table_id.to_string())
            .or_insert_with(|| {
                info!(table_id, table_uri, "registering table");
                Arc::new(RwLock::new(TableLedger::new(table_uri)))
            })
            .clone()
    }

    fn validate_and_append(
        &self,
        ledger: &mut TableLedger,
        request: &CommitRequest,
        commit: &Commit,
    ) -> CoordinatorResult<()> {
        require!(
            request.table_uri == ledger.table_uri(),
            Error::invalid_target_table(format!(
                "table '{}' is registered at '{}', not '{}'",
                request.table_id,
                ledger.table_uri(),
                request.table_uri,
            ))
        );

        if ledger.unbackfilled_len() == self.max_unbackfilled_commits {
            return Err(Error::CommitLimitReached {
                table_id: request.table_id.clone(),
                limit: self.max_unbackfilled_commits,
            });
        }

        if self.fail_before_commit.swap(false, Ordering::SeqCst) {
            return Err(Error::io_failure("injected failure before commit"));
        }

        if ledger.is_disowned() {
            return Err(Error::TableDisowned(request.table_id.clone()));
        }
        if ledger.is_active() {
            let expected = ledger.last_ratified_version() + 1;
            if commit.version != expected {
                warn!(
                    table_id = %request.table_id,
                    attempted = commit.version,
                    expected,
                    "commit conflict"
                );
                return Err(Error::commit_conflict(commit.version, expected));
            }
        }
        // An empty ledger accepts whatever version the writer supplies:
        // tables may move to this coordinator mid-history.

        let location =
            LogRoot::try_new(&request.table_uri)?.commit_file_location(&commit.file_name)?;
        let file = FileMeta {
            location,
            last_modified: commit.file_modification_timestamp,
            size: commit.file_size,
        };
        ledger.append(CommitRecord::new(
            commit.version,
            file,
            commit.timestamp,
            request.is_disown,
        ));
        debug!(
            table_id = %request.table_id,
            version = commit.version,
            is_disown = request.is_disown,
            "ratified commit"
        );
        Ok(())
    }
}

impl Default for InMemoryCommitCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitCoordinator for InMemoryCommitCoordinator {
    fn commit(&self, request: CommitRequest) -> CoordinatorResult<()> {
        require!(
            request.commit_info.is_some() || request.last_known_backfilled_version.is_some(),
            Error::invalid_argument(
                "commit requires a commit payload, a last known backfilled version, or both"
            )
        );
        if let Some(commit) = &request.commit_info {
            require!(
                commit.version >= 0,
                Error::invalid_argument(format!("commit version {} is negative", commit.version))
            );
        }

        let ledger = match (&request.commit_info, self.ledger(&request.table_id)) {
            (_, Some(ledger)) => ledger,
            (Some(_), None) => self.register_table(&request.table_id, &request.table_uri),
            (None, None) => {
                return Err(Error::invalid_target_table(format!(
                    "table '{}' is not coordinated here; no backfill progress to record",
                    request.table_id,
                )))
            }
        };
        let mut ledger = ledger.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(backfilled) = request.last_known_backfilled_version {
            let ratified_horizon = ledger
                .last_ratified_version()
                .max(request.commit_info.as_ref().map_or(0, |c| c.version));
            require!(
                backfilled <= ratified_horizon,
                Error::invalid_argument(format!(
                    "last known backfilled version {backfilled} is ahead of ratified version \
                     {ratified_horizon} for table '{}'",
                    request.table_id,
                ))
            );
        }

        if let Some(commit) = &request.commit_info {
            self.validate_and_append(&mut ledger, &request, commit)?;
        }

        if self.fail_after_commit.swap(false, Ordering::SeqCst) {
            // The appended commit (if any) stays ratified; only the
            // acknowledgement is lost.
            return Err(Error::io_failure("injected failure after commit"));
        }

        if let Some(backfilled) = request.last_known_backfilled_version {
            debug!(
                table_id = %request.table_id,
                backfilled,
                "recording backfill progress"
            );
            ledger.record_backfilled(backfilled);
        }
        Ok(())
    }

    fn get_commits(&self, request: CommitsRequest) -> CoordinatorResult<CommitsResponse> {
        let Some(ledger) = self.ledger(&request.table_id) else {
            // An unknown table has no commits; URI identity is only enforced
            // once a ledger exists.
            return Ok(CommitsResponse {
                commits: Vec::new(),
                latest_table_version: -1,
            });
        };
        let ledger = ledger.read().unwrap_or_else(PoisonError::into_inner);
        require!(
            request.table_uri == ledger.table_uri(),
            Error::invalid_target_table(format!(
                "table '{}' is registered at '{}', not '{}'",
                request.table_id,
                ledger.table_uri(),
                request.table_uri,
            ))
        );

        let latest_table_version = ledger.last_ratified_version();
        if latest_table_version < 0 {
            return Ok(CommitsResponse {
                commits: Vec::new(),
                latest_table_version: -1,
            });
        }
        let start = request.start_version.unwrap_or(0);
        let end = request.end_version.unwrap_or(latest_table_version);
        Ok(CommitsResponse {
            commits: ledger.commits_in_range(start, end),
            latest_table_version,
        })
    }

    fn is_same_coordinator(&self, other: &dyn CommitCoordinator) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| std::ptr::eq(self, other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_ID: &str = "bb34082c-6631-4b63-b16c-45dd7fbbf371";
    const TABLE_URI: &str = "memory:///table";

    fn payload(version: i64) -> Commit {
        Commit::new(
            version,
            1_000 + version,
            format!("{version:020}.json"),
            100,
            version,
        )
    }

    #[test]
    fn test_request_must_carry_payload_or_backfill() {
        let coordinator = InMemoryCommitCoordinator::new();
        let request = CommitRequest {
            table_id: TABLE_ID.into(),
            table_uri: TABLE_URI.into(),
            commit_info: None,
            last_known_backfilled_version: None,
            is_disown: false,
            metadata: None,
            protocol: None,
        };
        let err = coordinator.commit(request).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        // nothing was registered along the way
        let response = coordinator
            .get_commits(CommitsRequest::new(TABLE_ID, TABLE_URI))
            .unwrap();
        assert_eq!(response.latest_table_version, -1);
    }

    #[test]
    fn test_negative_version_is_rejected_before_registration() {
        let coordinator = InMemoryCommitCoordinator::new();
        let err = coordinator
            .commit(CommitRequest::new(TABLE_ID, TABLE_URI, payload(-1)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(coordinator.ledger(TABLE_ID).is_none());
    }

    #[test]
    fn test_backfill_only_for_unknown_table() {
        let coordinator = InMemoryCommitCoordinator::new();
        let err = coordinator
            .commit(CommitRequest::backfill_only(TABLE_ID, TABLE_URI, 0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTargetTable(_)));
    }

    #[test]
    fn test_fault_toggles_are_one_shot() {
        let coordinator = InMemoryCommitCoordinator::new();
        coordinator.inject_failure_before_commit();
        let err = coordinator
            .commit(CommitRequest::new(TABLE_ID, TABLE_URI, payload(0)))
            .unwrap_err();
        assert!(matches!(err, Error::IoFailure(_)));
        // the toggle cleared with the observation; the retry lands
        coordinator
            .commit(CommitRequest::new(TABLE_ID, TABLE_URI, payload(0)))
            .unwrap();
    }

    #[test]
    fn test_registration_survives_failed_first_commit() {
        let coordinator = InMemoryCommitCoordinator::new();
        coordinator.inject_failure_before_commit();
        coordinator
            .commit(CommitRequest::new(TABLE_ID, TABLE_URI, payload(0)))
            .unwrap_err();
        // the ledger exists but is empty, and reads treat it as never committed
        assert!(coordinator.ledger(TABLE_ID).is_some());
        let response = coordinator
            .get_commits(CommitsRequest::new(TABLE_ID, TABLE_URI))
            .unwrap();
        assert!(response.commits.is_empty());
        assert_eq!(response.latest_table_version, -1);
    }

    #[test]
    fn test_same_coordinator_is_pointer_identity() {
        let a: Arc<dyn CommitCoordinator> = Arc::new(InMemoryCommitCoordinator::new());
        let b: Arc<dyn CommitCoordinator> = Arc::new(InMemoryCommitCoordinator::new());
        assert!(a.is_same_coordinator(a.as_ref()));
        assert!(!a.is_same_coordinator(b.as_ref()));
    }
}
