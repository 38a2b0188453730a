use crate::engine::DocumentStore;
use crate::wire::{
    parse_route, CreateResponse, DeleteRequest, DeleteResponse, DropResponse, HealthResponse,
    InsertResponse, StoreRoute,
};
use crate::StoreError;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use std::thread::JoinHandle;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

/// Handle owning one running ephemeral store.
///
/// The store is served over the wire protocol on `127.0.0.1:{port}` by a pool
/// of worker threads. Dropping the handle stops the workers and discards all
/// data.
pub struct EphemeralStore {
    uri: String,
    port: u16,
    store: Arc<DocumentStore>,
    server: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
}

impl EphemeralStore {
    /// Start a fresh store. Port `0` picks a free port.
    pub fn start(port: u16, workers: usize) -> Result<Self, StoreError> {
        let addr = format!("127.0.0.1:{port}");
        let server = Server::http(&addr).map_err(|e| StoreError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
        let server = Arc::new(server);
        let port = server
            .server_addr()
            .to_ip()
            .map_or(port, |addr| addr.port());
        let uri = format!("http://127.0.0.1:{port}");

        let store = Arc::new(DocumentStore::new());
        let workers = (0..workers.max(1))
            .map(|_| {
                let srv = Arc::clone(&server);
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for request in srv.incoming_requests() {
                        handle_request(&store, request);
                    }
                })
            })
            .collect();

        info!("ephemeral store listening at {uri}");
        Ok(Self {
            uri,
            port,
            store,
            server,
            workers,
        })
    }

    /// Connection endpoint for store clients.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Direct access to the engine, bypassing the wire protocol.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }
}

impl Drop for EphemeralStore {
    fn drop(&mut self) {
        for _ in &self.workers {
            self.server.unblock();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("ephemeral store at {} stopped", self.uri);
    }
}

fn respond_err(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
}

fn respond_json(req: tiny_http::Request, value: &impl Serialize) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let header =
                Header::from_bytes("Content-Type", "application/json").expect("valid header");
            let _ = req.respond(Response::from_data(body).with_header(header));
        }
        Err(e) => {
            error!("failed to encode response: {e}");
            respond_err(req, 500, "encode error");
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(req: &mut tiny_http::Request) -> Result<T, String> {
    let mut body = Vec::new();
    req.as_reader()
        .read_to_end(&mut body)
        .map_err(|e| format!("read error: {e}"))?;
    serde_json::from_slice(&body).map_err(|e| format!("invalid JSON body: {e}"))
}

fn store_error_status(err: &StoreError) -> u16 {
    match err {
        StoreError::CollectionNotFound { .. } => 404,
        StoreError::DuplicateKey { .. } => 409,
        StoreError::InvalidDocument { .. } | StoreError::Serialization(_) => 400,
        StoreError::Io(_) | StoreError::Bind { .. } => 500,
    }
}

fn handle_documents(
    store: &DocumentStore,
    mut req: tiny_http::Request,
    method: &Method,
    database: &str,
    collection: &str,
) {
    match *method {
        Method::Get => respond_json(req, &store.find_all(database, collection)),
        Method::Post => {
            let docs: Vec<Value> = match read_json(&mut req) {
                Ok(docs) => docs,
                Err(msg) => {
                    respond_err(req, 400, &msg);
                    return;
                }
            };
            match store.insert_many(database, collection, docs) {
                Ok(inserted) => respond_json(req, &InsertResponse { inserted }),
                Err(e) => {
                    warn!("insert into {database}.{collection} rejected: {e}");
                    respond_err(req, store_error_status(&e), &e.to_string());
                }
            }
        }
        _ => respond_err(req, 405, "method not allowed"),
    }
}

/// Handle a single wire-protocol request against `store`.
pub fn handle_request(store: &DocumentStore, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let Some(route) = parse_route(&url) else {
        respond_err(req, 404, "not found");
        return;
    };

    match (route, &method) {
        (StoreRoute::Health, Method::Get) => respond_json(req, &HealthResponse { ok: true }),
        (StoreRoute::Databases, Method::Get) => respond_json(req, &store.list_databases()),
        (StoreRoute::Collections { database }, Method::Get) => {
            respond_json(req, &store.list_collections(&database));
        }
        (
            StoreRoute::Collection {
                database,
                collection,
            },
            Method::Put,
        ) => {
            let created = store.create_collection(&database, &collection);
            respond_json(req, &CreateResponse { created });
        }
        (
            StoreRoute::Collection {
                database,
                collection,
            },
            Method::Delete,
        ) => match store.drop_collection(&database, &collection) {
            Ok(()) => respond_json(req, &DropResponse { dropped: true }),
            Err(e) => respond_err(req, store_error_status(&e), &e.to_string()),
        },
        (
            StoreRoute::Documents {
                database,
                collection,
            },
            method,
        ) => handle_documents(store, req, method, &database, &collection),
        (
            StoreRoute::DeleteDocuments {
                database,
                collection,
            },
            Method::Post,
        ) => match read_json::<DeleteRequest>(&mut req) {
            Ok(body) => {
                let deleted = store.delete_many(&database, &collection, &body.ids);
                respond_json(req, &DeleteResponse { deleted });
            }
            Err(msg) => respond_err(req, 400, &msg),
        },
        _ => respond_err(req, 405, "method not allowed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_body(url: &str) -> String {
        let resp = ureq::get(url).call().unwrap();
        let mut body = String::new();
        resp.into_body()
            .into_reader()
            .read_to_string(&mut body)
            .unwrap();
        body
    }

    #[test]
    fn start_on_random_port_serves_health() {
        let store = EphemeralStore::start(0, 2).unwrap();
        assert_ne!(store.port(), 0);
        assert_eq!(store.uri(), format!("http://127.0.0.1:{}", store.port()));

        let body = get_body(&format!("{}/health", store.uri()));
        assert_eq!(body, r#"{"ok":true}"#);
    }

    #[test]
    fn serves_documents_inserted_through_engine() {
        let store = EphemeralStore::start(0, 1).unwrap();
        store
            .store()
            .insert_many("db", "widgets", vec![serde_json::json!({"_id": 1})])
            .unwrap();

        let body = get_body(&format!(
            "{}/databases/db/collections/widgets/documents",
            store.uri()
        ));
        assert_eq!(body, r#"[{"_id":1}]"#);
    }

    #[test]
    fn unknown_route_is_404() {
        let store = EphemeralStore::start(0, 1).unwrap();
        let result = ureq::get(&format!("{}/nope", store.uri())).call();
        assert!(matches!(result, Err(ureq::Error::StatusCode(404))));
    }

    #[test]
    fn binding_a_taken_port_fails() {
        let first = EphemeralStore::start(0, 1).unwrap();
        let err = EphemeralStore::start(first.port(), 1)
            .err()
            .expect("second bind must fail");
        assert!(matches!(err, StoreError::Bind { .. }));
    }

    #[test]
    fn store_error_status_codes() {
        let not_found = StoreError::CollectionNotFound {
            database: "d".to_owned(),
            collection: "c".to_owned(),
        };
        assert_eq!(store_error_status(&not_found), 404);
        let dup = StoreError::DuplicateKey {
            collection: "c".to_owned(),
            id: "1".to_owned(),
        };
        assert_eq!(store_error_status(&dup), 409);
    }
}
