use crate::CoreError;
use instadoc_fixtures::{LoadReport, UnloadReport};
use std::path::Path;

/// Loads and unloads fixture directories into a named database.
pub trait FixtureLoader: Send + Sync {
    fn load(&self, database: &str, fixture_dir: &Path) -> Result<LoadReport, CoreError>;
    fn unload(&self, database: &str, fixture_dir: &Path) -> Result<UnloadReport, CoreError>;
}

/// Loader that opens a fresh store session per call.
#[derive(Debug, Clone)]
pub struct StoreFixtureLoader {
    endpoint: String,
}

impl StoreFixtureLoader {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
        }
    }
}

impl FixtureLoader for StoreFixtureLoader {
    fn load(&self, database: &str, fixture_dir: &Path) -> Result<LoadReport, CoreError> {
        Ok(instadoc_fixtures::load_fixture(
            &self.endpoint,
            database,
            fixture_dir,
        )?)
    }

    fn unload(&self, database: &str, fixture_dir: &Path) -> Result<UnloadReport, CoreError> {
        Ok(instadoc_fixtures::unload_fixture(
            &self.endpoint,
            database,
            fixture_dir,
        )?)
    }
}
