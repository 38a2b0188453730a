use crate::CoreError;
use instadoc_client::StoreClient;
use serde_json::Value;

/// Collection-level operations the orchestrator needs from the store.
pub trait CollectionOps: Send + Sync {
    /// Live membership check against the store's collection listing.
    fn collection_exists(&self, database: &str, collection: &str) -> Result<bool, CoreError>;

    fn drop_collection(&self, database: &str, collection: &str) -> Result<(), CoreError>;

    /// Every document of the collection; a missing collection reads as empty.
    fn read_collection(&self, database: &str, collection: &str) -> Result<Vec<Value>, CoreError>;
}

impl CollectionOps for StoreClient {
    fn collection_exists(&self, database: &str, collection: &str) -> Result<bool, CoreError> {
        let listed = self.database(database).list_collections()?;
        Ok(listed.iter().any(|c| c.name == collection))
    }

    fn drop_collection(&self, database: &str, collection: &str) -> Result<(), CoreError> {
        self.database(database).drop_collection(collection)?;
        Ok(())
    }

    fn read_collection(&self, database: &str, collection: &str) -> Result<Vec<Value>, CoreError> {
        Ok(self.database(database).find_all(collection)?)
    }
}
