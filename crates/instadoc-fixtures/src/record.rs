use crate::FixtureError;
use instadoc_client::{Database, StoreClient};
use instadoc_store::{ID_FIELD, RESERVED_DATABASE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection in the reserved database holding one record per loaded fixture.
pub const RECORDS_COLLECTION: &str = "loaded_fixtures";

/// Identifies a fixture loaded into a database. Stored as the record's `_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordKey {
    pub database: String,
    pub fixture: String,
}

impl RecordKey {
    pub fn new(database: &str, fixture: &str) -> Self {
        Self {
            database: database.to_owned(),
            fixture: fixture.to_owned(),
        }
    }

    fn to_id(&self) -> Result<Value, FixtureError> {
        serde_json::to_value(self).map_err(FixtureError::Record)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedCollection {
    pub collection: String,
    pub ids: Vec<Value>,
}

/// The `_id`s each collection received from one successful load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadRecord {
    #[serde(rename = "_id")]
    pub key: RecordKey,
    pub collections: Vec<RecordedCollection>,
}

/// Load records kept in the store's reserved database.
pub struct RecordBook<'a> {
    records: Database<'a>,
}

impl<'a> RecordBook<'a> {
    pub fn new(client: &'a StoreClient) -> Self {
        Self {
            records: client.database(RESERVED_DATABASE),
        }
    }

    pub fn find(&self, key: &RecordKey) -> Result<Option<LoadRecord>, FixtureError> {
        let id = key.to_id()?;
        self.records
            .find_all(RECORDS_COLLECTION)?
            .into_iter()
            .find(|doc| doc.get(ID_FIELD) == Some(&id))
            .map(|doc| serde_json::from_value(doc).map_err(FixtureError::Record))
            .transpose()
    }

    pub fn save(&self, record: &LoadRecord) -> Result<(), FixtureError> {
        let doc = serde_json::to_value(record).map_err(FixtureError::Record)?;
        self.records.insert_many(RECORDS_COLLECTION, &[doc])?;
        Ok(())
    }

    pub fn remove(&self, key: &RecordKey) -> Result<(), FixtureError> {
        self.records
            .delete_many(RECORDS_COLLECTION, &[key.to_id()?])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instadoc_store::EphemeralStore;
    use serde_json::json;

    fn record(database: &str, fixture: &str) -> LoadRecord {
        LoadRecord {
            key: RecordKey::new(database, fixture),
            collections: vec![RecordedCollection {
                collection: "widgets".to_owned(),
                ids: vec![json!("w1"), json!(2)],
            }],
        }
    }

    #[test]
    fn record_id_is_the_key_object() {
        let doc = serde_json::to_value(record("testdb", "sample")).unwrap();
        assert_eq!(
            doc["_id"],
            json!({"database": "testdb", "fixture": "sample"})
        );
    }

    #[test]
    fn save_find_remove() {
        let store = EphemeralStore::start(0, 1).unwrap();
        let client = StoreClient::connect(store.uri()).unwrap();
        let book = RecordBook::new(&client);
        let key = RecordKey::new("testdb", "sample");

        assert!(book.find(&key).unwrap().is_none());
        book.save(&record("testdb", "sample")).unwrap();
        book.save(&record("otherdb", "sample")).unwrap();
        assert_eq!(book.find(&key).unwrap(), Some(record("testdb", "sample")));

        book.remove(&key).unwrap();
        assert!(book.find(&key).unwrap().is_none());
        assert!(book
            .find(&RecordKey::new("otherdb", "sample"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn records_stay_out_of_database_listing() {
        let store = EphemeralStore::start(0, 1).unwrap();
        let client = StoreClient::connect(store.uri()).unwrap();
        RecordBook::new(&client)
            .save(&record("testdb", "sample"))
            .unwrap();
        assert!(client.list_databases().unwrap().is_empty());
    }
}
