use crate::collections::CollectionOps;
use crate::concurrency::KeyLocks;
use crate::loader::{FixtureLoader, StoreFixtureLoader};
use crate::params::{
    CollectionAction, CollectionParams, FixtureAction, FixtureParams, ValidationError,
};
use crate::CoreError;
use instadoc_client::{ClientError, StoreClient};
use instadoc_fixtures::{LoadReport, UnloadReport};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// What a drop request ended up doing. Both outcomes are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped,
    AlreadyAbsent,
}

impl fmt::Display for DropOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dropped => f.write_str("dropped"),
            Self::AlreadyAbsent => f.write_str("doesn't exist"),
        }
    }
}

/// Failure of an orchestrated operation.
///
/// `Display` is the caller-facing message. For `Failed` it is a fixed
/// one-line summary; the underlying error is only logged.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{summary}")]
    Failed {
        summary: String,
        #[source]
        source: CoreError,
    },
}

impl OperationError {
    fn failed(summary: String, source: CoreError) -> Self {
        error!(error = ?source, "{summary}");
        Self::Failed { summary, source }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// Coordinates fixture and collection operations against one store.
///
/// Holds no per-request state. The only shared state is the per-key lock
/// table that keeps load and unload of the same `(database, fixture)` pair
/// from interleaving.
pub struct Orchestrator {
    fixtures_root: PathBuf,
    loader: Box<dyn FixtureLoader>,
    collections: Box<dyn CollectionOps>,
    locks: KeyLocks,
}

impl Orchestrator {
    pub fn new(
        fixtures_root: impl Into<PathBuf>,
        loader: Box<dyn FixtureLoader>,
        collections: Box<dyn CollectionOps>,
    ) -> Self {
        Self {
            fixtures_root: fixtures_root.into(),
            loader,
            collections,
            locks: KeyLocks::new(),
        }
    }

    /// Connect to the store at `endpoint` and wire up the store-backed
    /// collaborators.
    pub fn connect(endpoint: &str, fixtures_root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let client = StoreClient::connect(endpoint)?;
        Ok(Self::new(
            fixtures_root,
            Box::new(StoreFixtureLoader::new(endpoint)),
            Box::new(client),
        ))
    }

    pub fn fixtures_root(&self) -> &Path {
        &self.fixtures_root
    }

    /// Replace the fixture's documents in the database with a fresh copy.
    pub fn load_fixture(&self, params: &FixtureParams) -> Result<LoadReport, OperationError> {
        let target = params.validate(FixtureAction::Load)?;
        let dir = self.fixtures_root.join(&target.fixture);
        let _guard = self.locks.acquire(&target.database, &target.fixture);

        match self.loader.load(&target.database, &dir) {
            Ok(report) => {
                info!(
                    "Loaded database fixture: {} to database {} ({} documents)",
                    target.fixture,
                    target.database,
                    report.total()
                );
                Ok(report)
            }
            Err(e) => Err(OperationError::failed(
                format!(
                    "Failed to load database fixture {} to database {}",
                    target.fixture, target.database
                ),
                e,
            )),
        }
    }

    pub fn unload_fixture(&self, params: &FixtureParams) -> Result<UnloadReport, OperationError> {
        let target = params.validate(FixtureAction::Unload)?;
        let dir = self.fixtures_root.join(&target.fixture);
        let _guard = self.locks.acquire(&target.database, &target.fixture);

        match self.loader.unload(&target.database, &dir) {
            Ok(report) => {
                info!(
                    "Unloaded database fixture: {} from database {} ({} documents)",
                    target.fixture,
                    target.database,
                    report.total()
                );
                Ok(report)
            }
            Err(e) => Err(OperationError::failed(
                format!(
                    "Failed to unload database fixture {} from database {}",
                    target.fixture, target.database
                ),
                e,
            )),
        }
    }

    /// Drop a collection if it exists. A missing collection is a success.
    pub fn drop_collection(&self, params: &CollectionParams) -> Result<DropOutcome, OperationError> {
        let target = params.validate(CollectionAction::Drop)?;
        let failed = |e| {
            OperationError::failed(
                format!(
                    "Failed to drop collection {} from database {}",
                    target.collection, target.database
                ),
                e,
            )
        };

        let exists = self
            .collections
            .collection_exists(&target.database, &target.collection)
            .map_err(failed)?;
        let outcome = if exists {
            match self
                .collections
                .drop_collection(&target.database, &target.collection)
            {
                Ok(()) => DropOutcome::Dropped,
                // Dropped by someone else between the check and the drop.
                Err(CoreError::Client(ClientError::NotFound(_))) => DropOutcome::AlreadyAbsent,
                Err(e) => return Err(failed(e)),
            }
        } else {
            DropOutcome::AlreadyAbsent
        };

        match outcome {
            DropOutcome::Dropped => info!(
                "Dropped collection: {} from database {}",
                target.collection, target.database
            ),
            DropOutcome::AlreadyAbsent => info!(
                "Collection doesn't exist: {} in database {}",
                target.collection, target.database
            ),
        }
        Ok(outcome)
    }

    /// Every document of the collection, store identity field included.
    pub fn get_collection(&self, params: &CollectionParams) -> Result<Vec<Value>, OperationError> {
        let target = params.validate(CollectionAction::Get)?;
        self.collections
            .read_collection(&target.database, &target.collection)
            .map_err(|e| {
                OperationError::failed(
                    format!(
                        "Failed to get collection {} from database {}",
                        target.collection, target.database
                    ),
                    e,
                )
            })
    }
}
