//! Fixture datasets for instadoc.
//!
//! A fixture is a directory of `<collection>.json` files, each holding a JSON
//! array of documents. This crate parses fixture directories (`FixtureSet`),
//! gives every fixture document without one a deterministic `_id`
//! (`fixture_document_id`), and drives a private store connection through
//! connect, unload, load and disconnect (`load_fixture`, `unload_fixture`).
//!
//! Every successful load leaves a `LoadRecord` in the store's reserved
//! database listing the ids each collection received. Unload deletes exactly
//! those ids, so it never touches documents the fixture did not insert.

pub mod fixture;
pub mod identity;
pub mod loader;
pub mod record;

pub use fixture::{fixture_name, FixtureCollection, FixtureSet};
pub use identity::fixture_document_id;
pub use loader::{
    load_fixture, unload_fixture, CollectionCount, FixtureSession, LoadReport, UnloadReport,
};
pub use record::{LoadRecord, RecordBook, RecordKey, RecordedCollection};
pub use instadoc_store::RESERVED_DATABASE;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture directory not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("fixture path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid fixture file {}: {reason}", .path.display())]
    InvalidFile { path: PathBuf, reason: String },
    #[error("invalid fixture load record: {0}")]
    Record(#[source] serde_json::Error),
    #[error("store error: {0}")]
    Client(#[from] instadoc_client::ClientError),
}
