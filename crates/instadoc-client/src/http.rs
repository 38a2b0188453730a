use crate::{ClientConfig, ClientError};
use instadoc_store::wire::{
    collection_path, collections_path, delete_documents_path, documents_path, CreateResponse,
    DeleteRequest, DeleteResponse, DropResponse, HealthResponse, InsertResponse,
};
use instadoc_store::{CollectionInfo, PROTOCOL_HEADER, PROTOCOL_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use tracing::debug;

type HttpResult = Result<ureq::http::Response<ureq::Body>, ureq::Error>;

/// One connection to a running ephemeral store.
///
/// The underlying agent pools HTTP connections and is safe to share between
/// threads, so a single client can serve many concurrent callers.
pub struct StoreClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl StoreClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        Self { config, agent }
    }

    /// Open a client for `uri` and check that the store answers.
    pub fn connect(uri: &str) -> Result<Self, ClientError> {
        Self::connect_with(ClientConfig::new(uri))
    }

    pub fn connect_with(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = Self::new(config);
        client.ping().map_err(|e| ClientError::Connect {
            uri: client.config.url.clone(),
            reason: e.to_string(),
        })?;
        debug!("connected to store at {}", client.config.url);
        Ok(client)
    }

    /// Close the connection. Pooled sockets are released with the agent.
    pub fn disconnect(self) {
        debug!("disconnected from store at {}", self.config.url);
    }

    pub fn uri(&self) -> &str {
        &self.config.url
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        let health: HealthResponse = self.get_json("/health")?;
        if health.ok {
            Ok(())
        } else {
            Err(ClientError::Http("store reported unhealthy".to_owned()))
        }
    }

    pub fn list_databases(&self) -> Result<Vec<String>, ClientError> {
        self.get_json("/databases")
    }

    /// A view of one database. Nothing is sent until a call is made on it.
    pub fn database(&self, name: &str) -> Database<'_> {
        Database {
            client: self,
            name: name.to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.url)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!("GET {url}");
        let result = self
            .agent
            .get(url.as_str())
            .header(PROTOCOL_HEADER, &PROTOCOL_VERSION.to_string())
            .call();
        decode_response(&url, result)
    }

    fn put_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!("PUT {url}");
        let result = self
            .agent
            .put(url.as_str())
            .header(PROTOCOL_HEADER, &PROTOCOL_VERSION.to_string())
            .send_empty();
        decode_response(&url, result)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        let data =
            serde_json::to_vec(body).map_err(|e| ClientError::Serialization(e.to_string()))?;
        debug!("POST {url} ({} bytes)", data.len());
        let result = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header(PROTOCOL_HEADER, &PROTOCOL_VERSION.to_string())
            .send(&data[..]);
        decode_response(&url, result)
    }

    fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!("DELETE {url}");
        let result = self
            .agent
            .delete(url.as_str())
            .header(PROTOCOL_HEADER, &PROTOCOL_VERSION.to_string())
            .call();
        decode_response(&url, result)
    }
}

fn decode_response<T: DeserializeOwned>(url: &str, result: HttpResult) -> Result<T, ClientError> {
    let resp = result.map_err(|e| ClientError::Http(format!("{url}: {e}")))?;
    let code = resp.status().as_u16();

    let mut body = Vec::new();
    resp.into_body()
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| ClientError::Http(e.to_string()))?;

    if (200..300).contains(&code) {
        return serde_json::from_slice(&body).map_err(|e| ClientError::Serialization(e.to_string()));
    }

    let text = String::from_utf8_lossy(&body).into_owned();
    Err(match code {
        400 => ClientError::Rejected(text),
        404 => ClientError::NotFound(text),
        409 => ClientError::DuplicateKey(text),
        _ => ClientError::Http(format!("HTTP {code} for {url}: {text}")),
    })
}

/// Collection-level calls against one named database.
pub struct Database<'a> {
    client: &'a StoreClient,
    name: String,
}

impl Database<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Live collection listing; never cached.
    pub fn list_collections(&self) -> Result<Vec<CollectionInfo>, ClientError> {
        self.client.get_json(&collections_path(&self.name))
    }

    /// Create an empty collection. Returns `false` if it already existed.
    pub fn create_collection(&self, collection: &str) -> Result<bool, ClientError> {
        let resp: CreateResponse = self
            .client
            .put_empty(&collection_path(&self.name, collection))?;
        Ok(resp.created)
    }

    /// Drop a collection. Fails with `NotFound` if it does not exist.
    pub fn drop_collection(&self, collection: &str) -> Result<(), ClientError> {
        let _: DropResponse = self
            .client
            .delete(&collection_path(&self.name, collection))?;
        Ok(())
    }

    pub fn find_all(&self, collection: &str) -> Result<Vec<Value>, ClientError> {
        self.client
            .get_json(&documents_path(&self.name, collection))
    }

    /// Insert a batch, all or nothing. A colliding `_id` fails with `DuplicateKey`.
    pub fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<usize, ClientError> {
        let resp: InsertResponse = self
            .client
            .post_json(&documents_path(&self.name, collection), &docs)?;
        Ok(resp.inserted)
    }

    pub fn delete_many(&self, collection: &str, ids: &[Value]) -> Result<usize, ClientError> {
        let request = DeleteRequest { ids: ids.to_vec() };
        let resp: DeleteResponse = self
            .client
            .post_json(&delete_documents_path(&self.name, collection), &request)?;
        Ok(resp.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instadoc_store::EphemeralStore;
    use serde_json::json;

    fn start_store() -> (EphemeralStore, StoreClient) {
        let store = EphemeralStore::start(0, 2).unwrap();
        let client = StoreClient::connect(store.uri()).unwrap();
        (store, client)
    }

    #[test]
    fn connect_and_ping() {
        let (store, client) = start_store();
        assert_eq!(client.uri(), store.uri());
        client.ping().unwrap();
        client.disconnect();
    }

    #[test]
    fn connection_refused_returns_connect_error() {
        let result = StoreClient::connect("http://127.0.0.1:1");
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[test]
    fn connect_rejects_non_http_uri() {
        let result = StoreClient::connect("mongodb://127.0.0.1:5001");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn insert_and_find_all() {
        let (_store, client) = start_store();
        let db = client.database("testdb");
        let inserted = db
            .insert_many("widgets", &[json!({"id": 1, "name": "a"})])
            .unwrap();
        assert_eq!(inserted, 1);

        let docs = db.find_all("widgets").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "a");
        assert!(docs[0]["_id"].is_string());
    }

    #[test]
    fn find_all_on_missing_collection_is_empty() {
        let (_store, client) = start_store();
        let docs = client.database("testdb").find_all("nothing").unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn duplicate_key_is_reported() {
        let (_store, client) = start_store();
        let db = client.database("testdb");
        db.insert_many("widgets", &[json!({"_id": 1})]).unwrap();
        let err = db.insert_many("widgets", &[json!({"_id": 1})]).unwrap_err();
        assert!(matches!(err, ClientError::DuplicateKey(_)), "got {err}");
    }

    #[test]
    fn invalid_document_is_rejected() {
        let (_store, client) = start_store();
        let err = client
            .database("testdb")
            .insert_many("widgets", &[json!("not an object")])
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)), "got {err}");
    }

    #[test]
    fn list_create_and_drop_collections() {
        let (_store, client) = start_store();
        let db = client.database("testdb");
        assert!(db.list_collections().unwrap().is_empty());

        assert!(db.create_collection("widgets").unwrap());
        assert!(!db.create_collection("widgets").unwrap());
        let names: Vec<String> = db
            .list_collections()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["widgets"]);
        assert_eq!(client.list_databases().unwrap(), vec!["testdb"]);

        db.drop_collection("widgets").unwrap();
        assert!(db.list_collections().unwrap().is_empty());
    }

    #[test]
    fn drop_missing_collection_is_not_found() {
        let (_store, client) = start_store();
        let err = client
            .database("testdb")
            .drop_collection("missing")
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)), "got {err}");
    }

    #[test]
    fn delete_many_by_id() {
        let (_store, client) = start_store();
        let db = client.database("testdb");
        db.insert_many("widgets", &[json!({"_id": "a"}), json!({"_id": "b"})])
            .unwrap();
        assert_eq!(db.delete_many("widgets", &[json!("a")]).unwrap(), 1);
        assert_eq!(db.delete_many("widgets", &[json!("a")]).unwrap(), 0);
        assert_eq!(db.find_all("widgets").unwrap(), vec![json!({"_id": "b"})]);
    }

    #[test]
    fn names_with_reserved_characters() {
        let (store, client) = start_store();
        let db = client.database("my db");
        db.insert_many("a/b?c", &[json!({"_id": 1})]).unwrap();
        assert_eq!(store.store().find_all("my db", "a/b?c").len(), 1);
        assert_eq!(db.find_all("a/b?c").unwrap().len(), 1);
    }

    #[test]
    fn client_is_shared_across_threads() {
        let (_store, client) = start_store();
        let client = std::sync::Arc::new(client);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let client = std::sync::Arc::clone(&client);
                std::thread::spawn(move || {
                    let docs: Vec<Value> = (0..10).map(|i| json!({"_id": t * 100 + i})).collect();
                    client.database("db").insert_many("shared", &docs).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(client.database("db").find_all("shared").unwrap().len(), 40);
    }
}
