//! HTTP wire protocol between store clients and the ephemeral store.
//!
//! Database and collection names travel as percent-encoded path segments:
//!
//! - `GET    /health`
//! - `GET    /databases`
//! - `GET    /databases/{db}/collections`
//! - `PUT    /databases/{db}/collections/{col}`                   create if absent
//! - `DELETE /databases/{db}/collections/{col}`                   drop (404 if absent)
//! - `GET    /databases/{db}/collections/{col}/documents`         read all
//! - `POST   /databases/{db}/collections/{col}/documents`         insert batch
//! - `POST   /databases/{db}/collections/{col}/documents/delete`  delete by `_id`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

pub const PROTOCOL_HEADER: &str = "X-Instadoc-Protocol";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRoute {
    Health,
    Databases,
    Collections {
        database: String,
    },
    Collection {
        database: String,
        collection: String,
    },
    Documents {
        database: String,
        collection: String,
    },
    DeleteDocuments {
        database: String,
        collection: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateResponse {
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropResponse {
    pub dropped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsertResponse {
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteRequest {
    pub ids: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResponse {
    pub deleted: usize,
}

/// Percent-encode a name for use as a single path segment.
pub fn encode_segment(name: &str) -> Cow<'_, str> {
    urlencoding::encode(name)
}

pub fn collections_path(database: &str) -> String {
    format!("/databases/{}/collections", encode_segment(database))
}

pub fn collection_path(database: &str, collection: &str) -> String {
    format!(
        "{}/{}",
        collections_path(database),
        encode_segment(collection)
    )
}

pub fn documents_path(database: &str, collection: &str) -> String {
    format!("{}/documents", collection_path(database, collection))
}

pub fn delete_documents_path(database: &str, collection: &str) -> String {
    format!("{}/delete", documents_path(database, collection))
}

/// Parse a request URL (query string ignored) into a store route.
///
/// Returns `None` for unknown paths, empty names, or segments that are not
/// valid percent-encoded UTF-8.
pub fn parse_route(url: &str) -> Option<StoreRoute> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    let raw: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match raw.as_slice() {
        ["health"] => Some(StoreRoute::Health),
        ["databases"] => Some(StoreRoute::Databases),
        ["databases", db, "collections"] => Some(StoreRoute::Collections {
            database: decode_segment(db)?,
        }),
        ["databases", db, "collections", col] => Some(StoreRoute::Collection {
            database: decode_segment(db)?,
            collection: decode_segment(col)?,
        }),
        ["databases", db, "collections", col, "documents"] => Some(StoreRoute::Documents {
            database: decode_segment(db)?,
            collection: decode_segment(col)?,
        }),
        ["databases", db, "collections", col, "documents", "delete"] => {
            Some(StoreRoute::DeleteDocuments {
                database: decode_segment(db)?,
                collection: decode_segment(col)?,
            })
        }
        _ => None,
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    let decoded = urlencoding::decode(segment).ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_health_and_databases() {
        assert_eq!(parse_route("/health"), Some(StoreRoute::Health));
        assert_eq!(parse_route("/databases"), Some(StoreRoute::Databases));
    }

    #[test]
    fn parse_collection_routes() {
        assert_eq!(
            parse_route("/databases/testdb/collections"),
            Some(StoreRoute::Collections {
                database: "testdb".to_owned()
            })
        );
        assert_eq!(
            parse_route("/databases/testdb/collections/widgets/documents"),
            Some(StoreRoute::Documents {
                database: "testdb".to_owned(),
                collection: "widgets".to_owned()
            })
        );
        assert_eq!(
            parse_route("/databases/testdb/collections/widgets/documents/delete"),
            Some(StoreRoute::DeleteDocuments {
                database: "testdb".to_owned(),
                collection: "widgets".to_owned()
            })
        );
    }

    #[test]
    fn collection_named_like_a_keyword() {
        assert_eq!(
            parse_route("/databases/db/collections/documents"),
            Some(StoreRoute::Collection {
                database: "db".to_owned(),
                collection: "documents".to_owned()
            })
        );
    }

    #[test]
    fn encoded_names_roundtrip_through_paths() {
        let path = documents_path("my db", "a/b?c");
        assert_eq!(
            parse_route(&path),
            Some(StoreRoute::Documents {
                database: "my db".to_owned(),
                collection: "a/b?c".to_owned()
            })
        );
    }

    #[test]
    fn query_string_is_ignored() {
        assert_eq!(parse_route("/health?x=1"), Some(StoreRoute::Health));
    }

    #[test]
    fn unknown_and_empty_segments_rejected() {
        assert!(parse_route("/").is_none());
        assert!(parse_route("/other").is_none());
        assert!(parse_route("/databases//collections").is_none());
        assert!(parse_route("/databases/db/collections/col/extra").is_none());
    }
}
