use crate::fixture::{fixture_name, FixtureCollection, FixtureSet};
use crate::record::{LoadRecord, RecordBook, RecordKey, RecordedCollection};
use crate::FixtureError;
use instadoc_client::StoreClient;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Documents affected in one collection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CollectionCount {
    pub collection: String,
    pub documents: usize,
}

/// Outcome of loading a fixture.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadReport {
    pub fixture: String,
    pub database: String,
    pub collections: Vec<CollectionCount>,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.collections.iter().map(|c| c.documents).sum()
    }
}

/// Outcome of unloading a fixture.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnloadReport {
    pub fixture: String,
    pub database: String,
    pub collections: Vec<CollectionCount>,
}

impl UnloadReport {
    pub fn total(&self) -> usize {
        self.collections.iter().map(|c| c.documents).sum()
    }
}

/// A private store connection bound to one database.
///
/// Each load or unload opens its own session and closes it when done, so
/// the adapter never shares connection state with other callers.
pub struct FixtureSession {
    client: StoreClient,
    database: String,
}

impl FixtureSession {
    pub fn connect(endpoint: &str, database: &str) -> Result<Self, FixtureError> {
        let client = StoreClient::connect(endpoint)?;
        debug!("fixture session opened for database '{database}'");
        Ok(Self {
            client,
            database: database.to_owned(),
        })
    }

    fn records(&self) -> RecordBook<'_> {
        RecordBook::new(&self.client)
    }

    /// Remove the documents the last load of `fixture` inserted, then forget
    /// that load. Without a record there is nothing to remove.
    pub fn unload(&self, fixture: &str) -> Result<UnloadReport, FixtureError> {
        let key = RecordKey::new(&self.database, fixture);
        let records = self.records();
        let mut collections = Vec::new();

        let Some(record) = records.find(&key)? else {
            debug!(
                "fixture '{fixture}' is not loaded in database '{}'",
                self.database
            );
            return Ok(UnloadReport {
                fixture: fixture.to_owned(),
                database: self.database.clone(),
                collections,
            });
        };

        let db = self.client.database(&self.database);
        for col in &record.collections {
            let deleted = db.delete_many(&col.collection, &col.ids)?;
            debug!(
                "unloaded {deleted} documents of fixture '{fixture}' from {}.{}",
                self.database, col.collection
            );
            collections.push(CollectionCount {
                collection: col.collection.clone(),
                documents: deleted,
            });
        }
        records.remove(&key)?;

        Ok(UnloadReport {
            fixture: fixture.to_owned(),
            database: self.database.clone(),
            collections,
        })
    }

    /// Insert the fixture's documents, one batch per collection, and record
    /// the ids inserted.
    ///
    /// Any failure, including an `_id` already taken by other data, removes
    /// what this call inserted before the error is returned.
    pub fn load(&self, fixture: &FixtureSet) -> Result<LoadReport, FixtureError> {
        let db = self.client.database(&self.database);
        let mut collections = Vec::with_capacity(fixture.collections.len());
        for col in &fixture.collections {
            match db.insert_many(&col.name, &col.documents) {
                Ok(inserted) => collections.push(CollectionCount {
                    collection: col.name.clone(),
                    documents: inserted,
                }),
                Err(e) => {
                    self.rollback(&fixture.collections[..collections.len()]);
                    return Err(e.into());
                }
            }
        }

        let record = LoadRecord {
            key: RecordKey::new(&self.database, &fixture.name),
            collections: fixture
                .collections
                .iter()
                .map(|col| RecordedCollection {
                    collection: col.name.clone(),
                    ids: col.ids(),
                })
                .collect(),
        };
        if let Err(e) = self.records().save(&record) {
            self.rollback(&fixture.collections);
            return Err(e);
        }

        Ok(LoadReport {
            fixture: fixture.name.clone(),
            database: self.database.clone(),
            collections,
        })
    }

    fn rollback(&self, inserted: &[FixtureCollection]) {
        let db = self.client.database(&self.database);
        for col in inserted {
            if let Err(e) = db.delete_many(&col.name, &col.ids()) {
                warn!(
                    "rollback of {}.{} after failed load left documents behind: {e}",
                    self.database, col.name
                );
            }
        }
    }

    pub fn disconnect(self) {
        debug!("fixture session closed for database '{}'", self.database);
        self.client.disconnect();
    }
}

/// Unload then load the fixture in `fixture_dir` into `database`.
///
/// The session is closed whether or not the unload and load succeed.
pub fn load_fixture(
    endpoint: &str,
    database: &str,
    fixture_dir: &Path,
) -> Result<LoadReport, FixtureError> {
    let fixture = FixtureSet::from_dir(fixture_dir)?;
    let session = FixtureSession::connect(endpoint, database)?;
    let result = session
        .unload(&fixture.name)
        .and_then(|_| session.load(&fixture));
    session.disconnect();

    let report = result?;
    info!(
        "loaded fixture '{}' into database '{database}' ({} documents)",
        report.fixture,
        report.total()
    );
    Ok(report)
}

/// Remove the documents the fixture in `fixture_dir` loaded into `database`.
///
/// Only the load record is consulted, so the directory itself need not
/// exist any more.
pub fn unload_fixture(
    endpoint: &str,
    database: &str,
    fixture_dir: &Path,
) -> Result<UnloadReport, FixtureError> {
    let fixture = fixture_name(fixture_dir)?;
    let session = FixtureSession::connect(endpoint, database)?;
    let result = session.unload(&fixture);
    session.disconnect();

    let report = result?;
    info!(
        "unloaded fixture '{}' from database '{database}' ({} documents)",
        report.fixture,
        report.total()
    );
    Ok(report)
}
