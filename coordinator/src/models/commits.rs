//! Request and response types for the commit and get-commits operations.

use serde::{Deserialize, Serialize};

use crate::{FileMeta, FileSize, Version};

/// Request for the recent-commit window of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitsRequest {
    /// Opaque identifier of the table within the coordinator.
    pub table_id: String,
    /// Root location of the table, as registered.
    pub table_uri: String,
    /// Lowest version to return. Defaults to the start of the window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_version: Option<Version>,
    /// Highest version to return. Defaults to the last ratified version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_version: Option<Version>,
}

impl CommitsRequest {
    /// Request the full unbackfilled window of the table.
    pub fn new(table_id: impl Into<String>, table_uri: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            table_uri: table_uri.into(),
            start_version: None,
            end_version: None,
        }
    }

    pub fn with_start_version(mut self, version: Version) -> Self {
        self.start_version = Some(version);
        self
    }

    pub fn with_end_version(mut self, version: Version) -> Self {
        self.end_version = Some(version);
        self
    }
}

/// The unbackfilled window of a table plus the last ratified version.
///
/// `latest_table_version == -1` means the table has never ratified a commit
/// through this coordinator; readers should fall back to log-file discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitsResponse {
    /// Unbackfilled commits in ascending version order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<CommitFile>,
    /// Version of the last commit the coordinator ratified, backfilled or
    /// not; `-1` if there is none.
    pub latest_table_version: Version,
}

impl CommitsResponse {
    /// True when the returned window is ascending and free of version gaps.
    pub fn is_contiguous(&self) -> bool {
        self.commits
            .windows(2)
            .all(|w| w[1].version == w[0].version + 1)
    }
}

/// A ratified commit as observed by readers.
///
/// The file location was resolved against the table root when the commit was
/// ratified, so it is absolute and ready to read once backfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitFile {
    /// The version this commit was ratified at.
    pub version: Version,
    /// Absolute location, size and modification time of the commit file.
    pub file: FileMeta,
    /// Logical timestamp supplied by the writer, in milliseconds.
    pub timestamp: i64,
}

/// The payload of a commit: the staged file to ratify at `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Version the writer wants ratified. On an active table this must be
    /// exactly one past the last ratified version.
    pub version: Version,
    /// Logical commit timestamp in milliseconds.
    pub timestamp: i64,
    /// File name of the staged commit, relative to the commits directory of
    /// the table's log. Must be a well-formed commit file name,
    /// `{version}.json` or `{version}.{uuid}.json`.
    pub file_name: String,
    /// Size of the staged file in bytes.
    pub file_size: FileSize,
    /// Modification time of the staged file, in milliseconds.
    pub file_modification_timestamp: i64,
}

impl Commit {
    /// Create a new commit payload for the given version and timestamp.
    pub fn new(
        version: Version,
        timestamp: i64,
        file_name: impl Into<String>,
        file_size: FileSize,
        file_modification_timestamp: i64,
    ) -> Self {
        Self {
            version,
            timestamp,
            file_name: file_name.into(),
            file_size,
            file_modification_timestamp,
        }
    }

    pub fn timestamp_as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn file_modification_as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.file_modification_timestamp)
    }
}

/// Request to commit a new version to a table and/or report backfill
/// progress. It must include a `commit_info` payload, a
/// `last_known_backfilled_version`, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Opaque identifier of the table within the coordinator.
    pub table_id: String,
    /// Root location of the table. Must match the registered URI once the
    /// table is known.
    pub table_uri: String,
    /// The commit to ratify, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_info: Option<Commit>,
    /// Highest version known to be materialized in the table's log. The
    /// coordinator trims its window up to this version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_backfilled_version: Option<Version>,
    /// Marks this commit as the final one before ownership of the table
    /// moves away from this coordinator.
    #[serde(default)]
    pub is_disown: bool,
    /// Opaque table metadata carried through to the coordinator, never
    /// interpreted here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Opaque table protocol carried through to the coordinator, never
    /// interpreted here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<serde_json::Value>,
}

impl CommitRequest {
    /// Request ratification of `commit_info`.
    pub fn new(
        table_id: impl Into<String>,
        table_uri: impl Into<String>,
        commit_info: Commit,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            table_uri: table_uri.into(),
            commit_info: Some(commit_info),
            last_known_backfilled_version: None,
            is_disown: false,
            metadata: None,
            protocol: None,
        }
    }

    /// Report backfill progress without ratifying anything new.
    pub fn backfill_only(
        table_id: impl Into<String>,
        table_uri: impl Into<String>,
        last_known_backfilled_version: Version,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            table_uri: table_uri.into(),
            commit_info: None,
            last_known_backfilled_version: Some(last_known_backfilled_version),
            is_disown: false,
            metadata: None,
            protocol: None,
        }
    }

    pub fn with_last_known_backfilled_version(mut self, version: Version) -> Self {
        self.last_known_backfilled_version = Some(version);
        self
    }

    /// Mark this commit as the table's last under this coordinator.
    pub fn with_disown(mut self) -> Self {
        self.is_disown = true;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_protocol(mut self, protocol: serde_json::Value) -> Self {
        self.protocol = Some(protocol);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_request_roundtrip() {
        let request = CommitRequest::new(
            "8cae7cd8-ffbe-4c38-a31e-6ad54e6e4066",
            "s3://bucket/table",
            Commit::new(4, 1_700_000_000_000, "f.json", 128, 1_700_000_000_100),
        )
        .with_last_known_backfilled_version(3)
        .with_metadata(serde_json::json!({"name": "events"}));

        let json = serde_json::to_string(&request).unwrap();
        let parsed: CommitRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);

        // absent options stay off the wire
        assert!(!json.contains("protocol"));
    }

    #[test]
    fn test_contiguity() {
        let file = |version: Version| CommitFile {
            version,
            file: FileMeta {
                location: url::Url::parse(&format!("s3://bucket/table/{version}.json")).unwrap(),
                last_modified: 0,
                size: 1,
            },
            timestamp: version,
        };
        let mut response = CommitsResponse {
            commits: vec![file(3), file(4), file(5)],
            latest_table_version: 5,
        };
        assert!(response.is_contiguous());
        response.commits.remove(1);
        assert!(!response.is_contiguous());
    }

    #[test]
    fn test_datetime_helpers() {
        let commit = Commit::new(0, 1_700_000_000_000, "f.json", 1, -9_999_999_999_999_999);
        assert!(commit.timestamp_as_datetime().is_some());
        assert!(commit.file_modification_as_datetime().is_none());
    }
}
