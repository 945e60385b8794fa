//! Resolution of commit file locations beneath a table root.

use std::str::FromStr;

use url::Url;

use crate::utils::require;
use crate::{CoordinatorResult, Error};

/// How many characters a version tag has
const VERSION_LEN: usize = 20;

/// The number of characters in the uuid part of a staged commit file name
const UUID_PART_LEN: usize = 36;

/// The subdirectory of the table root where the log resides.
const LOG_DIR: &str = "_delta_log/";

/// The subdirectory of the log where coordinator-ratified commit files are
/// materialized by the backfill pipeline.
const COMMITS_DIR: &str = "_commits/";

/// A `LogRoot` wraps a table root URI and resolves the absolute locations of
/// ratified commit files beneath it. Locations are resolved once, at commit
/// time, so readers never pay a join per returned commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogRoot {
    table_root: Url,
}

impl LogRoot {
    /// Parse a table URI into a log root. A missing trailing `/` is supplied
    /// so that joins resolve inside the table directory rather than beside it.
    pub(crate) fn try_new(table_uri: &str) -> CoordinatorResult<Self> {
        let mut table_root =
            Url::parse(table_uri).map_err(|_| Error::invalid_table_location(table_uri))?;
        if !table_root.path().ends_with('/') {
            table_root.set_path(&format!("{}/", table_root.path()));
        }
        Ok(Self { table_root })
    }

    /// Absolute location of a ratified commit file, e.g.
    /// `s3://bucket/table/_delta_log/_commits/00000000000000000005.{uuid}.json`.
    ///
    /// The file name must be a well-formed commit file name,
    /// `{version}.json` or `{version}.{uuid}.json`. Validating the shape up
    /// front is what keeps every resolved location inside the commits
    /// directory: handed a looser name, the URL join would accept upward
    /// traversal or re-parse a `scheme:`-prefixed name as an absolute URL and
    /// discard the base entirely.
    pub(crate) fn commit_file_location(&self, file_name: &str) -> CoordinatorResult<Url> {
        require!(
            is_commit_file_name(file_name),
            Error::invalid_argument(format!("invalid commit file name '{file_name}'"))
        );
        self.table_root
            .join(LOG_DIR)
            .and_then(|url| url.join(COMMITS_DIR))
            .and_then(|url| url.join(file_name))
            .map_err(|_| Error::invalid_table_location(self.table_root.as_str()))
    }
}

// Internal helper used by is_commit_file_name below. It parses a fixed-length
// string into the numeric type expected by the caller. A wrong length produces
// None, even if the parse succeeded.
fn parse_path_part<T: FromStr>(value: &str, expect_len: usize) -> Option<T> {
    match value.parse() {
        Ok(result) if value.len() == expect_len => Some(result),
        _ => None,
    }
}

// A commit file name is `{version}.json` or `{version}.{uuid}.json`: a
// fixed-length zero-padded version, an optional hyphenated uuid, and the json
// extension. The leading digits mean nothing of this shape can carry a URL
// scheme, a path separator, or a `..` segment through the URL join.
fn is_commit_file_name(file_name: &str) -> bool {
    let parts: Vec<_> = file_name.split('.').collect();
    match parts.as_slice() {
        [version, "json"] => parse_path_part::<u64>(version, VERSION_LEN).is_some(),
        [version, uuid, "json"] => {
            parse_path_part::<u64>(version, VERSION_LEN).is_some()
                && uuid.len() == UUID_PART_LEN
                && uuid.bytes().all(|b| b.is_ascii_hexdigit() || b == b'-')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_file_location() {
        let log_root = LogRoot::try_new("s3://my-bucket/path/to/table").unwrap();
        let location = log_root
            .commit_file_location("00000000000000000010.3a0d65cd-4a56-49a8-937b-95f9e3ee90e5.json")
            .unwrap();
        assert_eq!(
            location.as_str(),
            "s3://my-bucket/path/to/table/_delta_log/_commits/00000000000000000010.3a0d65cd-4a56-49a8-937b-95f9e3ee90e5.json"
        );

        // published-style names without a uuid part resolve too
        let location = log_root
            .commit_file_location("00000000000000000010.json")
            .unwrap();
        assert_eq!(
            location.as_str(),
            "s3://my-bucket/path/to/table/_delta_log/_commits/00000000000000000010.json"
        );

        // a trailing slash on the table root resolves identically
        let slashed = LogRoot::try_new("s3://my-bucket/path/to/table/").unwrap();
        assert_eq!(log_root, slashed);
    }

    #[test]
    fn test_rejects_non_uri_table_location() {
        let err = LogRoot::try_new("/not/a/uri").unwrap_err();
        assert!(matches!(err, Error::InvalidTableLocation(_)));
    }

    #[test]
    fn test_rejects_escaping_file_names() {
        let log_root = LogRoot::try_new("s3://my-bucket/table").unwrap();
        for name in [
            "",
            ".",
            "..",
            "a/b.json",
            "a\\b.json",
            "a?x=1",
            "a#frag",
            // an absolute URL would replace the base entirely on join
            "data:x",
            "mailto:x",
            "s3://elsewhere/file.json",
            // malformed version / uuid / extension parts
            "not-a-version.json",
            "0000000000000000001.json",
            "00000000000000000010",
            "00000000000000000010.parquet",
            "00000000000000000010.not-a-uuid.json",
            "00000000000000000010.3a0d65cd-4a56-49a8-937b-95f9e3ee90e5.json.tmp",
        ] {
            let err = log_root.commit_file_location(name).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "accepted {name:?}");
        }
    }
}
