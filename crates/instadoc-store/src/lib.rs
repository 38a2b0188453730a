//! Memory-resident document store for instadoc.
//!
//! This crate provides the ephemeral database: a `DocumentStore` holding
//! databases of named collections of JSON documents, the HTTP wire protocol
//! used to reach it (`wire`), and `EphemeralStore`, a handle that serves one
//! store instance on a local port for the lifetime of the process.
//!
//! Nothing is persisted. Dropping the handle discards every database.

pub mod document;
pub mod engine;
pub mod ephemeral;
pub mod wire;

pub use document::{id_key, IdGenerator, ID_FIELD};
pub use engine::{CollectionInfo, DocumentStore, RESERVED_DATABASE};
pub use ephemeral::{handle_request, EphemeralStore};
pub use wire::{parse_route, StoreRoute, PROTOCOL_HEADER};

/// Wire protocol version sent as `X-Instadoc-Protocol` on every client request.
pub const PROTOCOL_VERSION: u32 = 1;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to bind store server on {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("collection not found: {database}.{collection}")]
    CollectionNotFound {
        database: String,
        collection: String,
    },
    #[error("duplicate key in collection '{collection}': _id {id}")]
    DuplicateKey { collection: String, id: String },
    #[error("invalid document #{index} for collection '{collection}': {reason}")]
    InvalidDocument {
        collection: String,
        index: usize,
        reason: String,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_collection_not_found() {
        let e = StoreError::CollectionNotFound {
            database: "testdb".to_owned(),
            collection: "widgets".to_owned(),
        };
        assert_eq!(e.to_string(), "collection not found: testdb.widgets");
    }

    #[test]
    fn store_error_display_duplicate_key() {
        let e = StoreError::DuplicateKey {
            collection: "widgets".to_owned(),
            id: "\"abc\"".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("widgets"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn store_error_display_bind() {
        let e = StoreError::Bind {
            addr: "127.0.0.1:5001".to_owned(),
            reason: "address in use".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("5001"));
        assert!(msg.contains("address in use"));
    }

    #[test]
    fn store_error_display_invalid_document() {
        let e = StoreError::InvalidDocument {
            collection: "widgets".to_owned(),
            index: 3,
            reason: "document must be a JSON object".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("#3"));
        assert!(msg.contains("JSON object"));
    }

    #[test]
    fn protocol_version_is_1() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }
}
