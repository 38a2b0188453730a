//! Client side of the instadoc store wire protocol.
//!
//! `StoreClient` is one connection to a running ephemeral store, addressed by
//! its endpoint URI. It hands out `Database` views for collection-level calls:
//! listing, creating and dropping collections, and reading, inserting and
//! deleting documents.

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::{Database, StoreClient};
pub use instadoc_store::CollectionInfo;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to store at {uri}: {reason}")]
    Connect { uri: String, reason: String },
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("request rejected by store: {0}")]
    Rejected(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("client config error: {0}")]
    Config(String),
}
