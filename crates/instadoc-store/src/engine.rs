use crate::document::{id_key, IdGenerator, ID_FIELD};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Collection metadata as reported by `list_collections`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub documents: usize,
}

#[derive(Debug, Default)]
struct Collection {
    /// Insertion order is the natural iteration order.
    documents: Vec<Value>,
    ids: HashSet<String>,
}

impl Collection {
    /// Stamp missing ids and check uniqueness for the whole batch before
    /// touching the collection, so a failed batch leaves it unchanged.
    fn insert_batch(
        &mut self,
        collection: &str,
        docs: Vec<Value>,
        generator: &IdGenerator,
    ) -> Result<usize, StoreError> {
        let mut staged = Vec::with_capacity(docs.len());
        let mut batch_keys = HashSet::with_capacity(docs.len());

        for (index, mut doc) in docs.into_iter().enumerate() {
            let Some(fields) = doc.as_object_mut() else {
                return Err(StoreError::InvalidDocument {
                    collection: collection.to_owned(),
                    index,
                    reason: "document must be a JSON object".to_owned(),
                });
            };
            let id = fields
                .entry(ID_FIELD)
                .or_insert_with(|| Value::String(generator.next_id()));
            if id.is_array() {
                return Err(StoreError::InvalidDocument {
                    collection: collection.to_owned(),
                    index,
                    reason: "_id cannot be an array".to_owned(),
                });
            }
            let key = id_key(id);
            if self.ids.contains(&key) || !batch_keys.insert(key.clone()) {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_owned(),
                    id: key,
                });
            }
            staged.push((key, doc));
        }

        let count = staged.len();
        for (key, doc) in staged {
            self.ids.insert(key);
            self.documents.push(doc);
        }
        Ok(count)
    }

    fn delete_ids(&mut self, keys: &HashSet<String>) -> usize {
        let before = self.documents.len();
        self.documents.retain(|doc| {
            doc.get(ID_FIELD)
                .map_or(true, |id| !keys.contains(&id_key(id)))
        });
        self.ids.retain(|key| !keys.contains(key));
        before - self.documents.len()
    }
}

type Database = BTreeMap<String, Collection>;

/// Database reserved for the store's own bookkeeping. It never appears in
/// `list_databases`.
pub const RESERVED_DATABASE: &str = "_instadoc";

/// The ephemeral store's data: databases of named collections of documents.
///
/// Databases and collections are created implicitly on first write. A
/// database disappears when its last collection is dropped.
#[derive(Debug, Default)]
pub struct DocumentStore {
    databases: RwLock<BTreeMap<String, Database>>,
    ids: IdGenerator,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Database>> {
        self.databases.read().expect("store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Database>> {
        self.databases.write().expect("store lock poisoned")
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.read()
            .keys()
            .filter(|name| name.as_str() != RESERVED_DATABASE)
            .cloned()
            .collect()
    }

    pub fn list_collections(&self, database: &str) -> Vec<CollectionInfo> {
        self.read()
            .get(database)
            .map(|db| {
                db.iter()
                    .map(|(name, col)| CollectionInfo {
                        name: name.clone(),
                        documents: col.documents.len(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Create an empty collection. Returns `false` if it already existed.
    pub fn create_collection(&self, database: &str, collection: &str) -> bool {
        let mut dbs = self.write();
        let db = dbs.entry(database.to_owned()).or_default();
        if db.contains_key(collection) {
            return false;
        }
        db.insert(collection.to_owned(), Collection::default());
        debug!("created collection {database}.{collection}");
        true
    }

    pub fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        let mut dbs = self.write();
        let removed = dbs
            .get_mut(database)
            .and_then(|db| db.remove(collection))
            .is_some();
        if !removed {
            return Err(StoreError::CollectionNotFound {
                database: database.to_owned(),
                collection: collection.to_owned(),
            });
        }
        if dbs.get(database).is_some_and(BTreeMap::is_empty) {
            dbs.remove(database);
        }
        debug!("dropped collection {database}.{collection}");
        Ok(())
    }

    /// All documents of a collection; a missing collection reads as empty.
    pub fn find_all(&self, database: &str, collection: &str) -> Vec<Value> {
        self.read()
            .get(database)
            .and_then(|db| db.get(collection))
            .map(|col| col.documents.clone())
            .unwrap_or_default()
    }

    /// Insert a batch of documents, all or nothing.
    ///
    /// Documents without `_id` get a generated one. An empty batch still
    /// creates the collection.
    pub fn insert_many(
        &self,
        database: &str,
        collection: &str,
        docs: Vec<Value>,
    ) -> Result<usize, StoreError> {
        let mut dbs = self.write();
        let db_existed = dbs.contains_key(database);
        let db = dbs.entry(database.to_owned()).or_default();
        let col_existed = db.contains_key(collection);
        let col = db.entry(collection.to_owned()).or_default();

        match col.insert_batch(collection, docs, &self.ids) {
            Ok(count) => {
                debug!("inserted {count} documents into {database}.{collection}");
                Ok(count)
            }
            Err(e) => {
                if !col_existed {
                    db.remove(collection);
                }
                if !db_existed {
                    dbs.remove(database);
                }
                Err(e)
            }
        }
    }

    /// Delete the documents whose `_id` is in `ids`. Returns how many were removed.
    pub fn delete_many(&self, database: &str, collection: &str, ids: &[Value]) -> usize {
        let keys: HashSet<String> = ids.iter().map(id_key).collect();
        let mut dbs = self.write();
        let deleted = dbs
            .get_mut(database)
            .and_then(|db| db.get_mut(collection))
            .map_or(0, |col| col.delete_ids(&keys));
        debug!("deleted {deleted} documents from {database}.{collection}");
        deleted
    }
}
