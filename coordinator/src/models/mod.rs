//! Value types exchanged between coordinator clients and implementations.

pub mod commits;

pub use commits::{Commit, CommitFile, CommitRequest, CommitsRequest, CommitsResponse};
