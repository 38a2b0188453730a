//! Fixture lifecycle orchestration for instadoc.
//!
//! This crate turns control-plane requests into store state transitions: the
//! `Orchestrator` validates request parameters, serializes load/unload of the
//! same fixture, delegates to a `FixtureLoader` or to `CollectionOps`, and
//! maps collaborator failures into short caller-facing messages while logging
//! the full error.

pub mod collections;
pub mod concurrency;
pub mod loader;
pub mod orchestrator;
pub mod params;

pub use collections::CollectionOps;
pub use concurrency::{KeyGuard, KeyLocks};
pub use loader::{FixtureLoader, StoreFixtureLoader};
pub use orchestrator::{DropOutcome, OperationError, Orchestrator};
pub use params::{
    CollectionAction, CollectionParams, CollectionTarget, FixtureAction, FixtureParams,
    FixtureTarget, ValidationError,
};

pub use instadoc_fixtures::{LoadReport, UnloadReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store client error: {0}")]
    Client(#[from] instadoc_client::ClientError),
    #[error("fixture error: {0}")]
    Fixture(#[from] instadoc_fixtures::FixtureError),
}
