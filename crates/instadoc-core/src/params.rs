//! Typed request parameters.
//!
//! Query strings decode into the `*Params` structs, where every field is
//! optional. `validate` turns them into `*Target`s or fails with a message
//! naming the missing parameter. Nothing reaches a collaborator before that.

use instadoc_fixtures::RESERVED_DATABASE;
use serde::Deserialize;
use std::path::{Component, Path};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Query parameter '{name}' specifies {purpose}.")]
    MissingParam {
        name: &'static str,
        purpose: &'static str,
    },
    #[error("Query parameter 'fix' must name a single fixture directory, got '{0}'.")]
    InvalidFixtureName(String),
    #[error("Database '{0}' is reserved for instadoc bookkeeping.")]
    ReservedDatabase(String),
}

/// Which operation a fixture request is for; only changes error wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureAction {
    Load,
    Unload,
}

/// Which operation a collection request is for; only changes error wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionAction {
    Drop,
    Get,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FixtureParams {
    pub db: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CollectionParams {
    pub db: Option<String>,
    pub col: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureTarget {
    pub database: String,
    pub fixture: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    pub database: String,
    pub collection: String,
}

const DB_PURPOSE: &str = "database name";

fn database(value: Option<&str>) -> Result<String, ValidationError> {
    let database = required(value, "db", DB_PURPOSE)?;
    if database == RESERVED_DATABASE {
        return Err(ValidationError::ReservedDatabase(database));
    }
    Ok(database)
}

fn required(
    value: Option<&str>,
    name: &'static str,
    purpose: &'static str,
) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(ValidationError::MissingParam { name, purpose }),
    }
}

/// A fixture name must be one plain path component so it resolves inside the
/// fixtures root.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

impl FixtureParams {
    pub fn new(db: &str, fix: &str) -> Self {
        Self {
            db: Some(db.to_owned()),
            fix: Some(fix.to_owned()),
        }
    }

    pub fn validate(&self, action: FixtureAction) -> Result<FixtureTarget, ValidationError> {
        let database = database(self.db.as_deref())?;
        let purpose = match action {
            FixtureAction::Load => "name of fixture to load into database",
            FixtureAction::Unload => "name of fixture to unload from database",
        };
        let fixture = required(self.fix.as_deref(), "fix", purpose)?;
        if !is_single_component(&fixture) {
            return Err(ValidationError::InvalidFixtureName(fixture));
        }
        Ok(FixtureTarget { database, fixture })
    }
}

impl CollectionParams {
    pub fn new(db: &str, col: &str) -> Self {
        Self {
            db: Some(db.to_owned()),
            col: Some(col.to_owned()),
        }
    }

    pub fn validate(&self, action: CollectionAction) -> Result<CollectionTarget, ValidationError> {
        let database = database(self.db.as_deref())?;
        let purpose = match action {
            CollectionAction::Drop => "name of collection to drop",
            CollectionAction::Get => "name of collection to get",
        };
        let collection = required(self.col.as_deref(), "col", purpose)?;
        Ok(CollectionTarget {
            database,
            collection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_params_valid() {
        let target = FixtureParams::new("testdb", "sample")
            .validate(FixtureAction::Load)
            .unwrap();
        assert_eq!(target.database, "testdb");
        assert_eq!(target.fixture, "sample");
    }

    #[test]
    fn missing_db_is_reported_first() {
        let err = FixtureParams::default()
            .validate(FixtureAction::Load)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query parameter 'db' specifies database name."
        );
    }

    #[test]
    fn missing_fix_message() {
        let params = FixtureParams {
            db: Some("testdb".to_owned()),
            fix: None,
        };
        let err = params.validate(FixtureAction::Load).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query parameter 'fix' specifies name of fixture to load into database."
        );
        let err = params.validate(FixtureAction::Unload).unwrap_err();
        assert!(err.to_string().contains("unload"));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let err = FixtureParams::new("", "sample")
            .validate(FixtureAction::Load)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingParam { name: "db", .. }));
        let err = CollectionParams::new("testdb", "")
            .validate(CollectionAction::Drop)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingParam { name: "col", .. }));
    }

    #[test]
    fn fixture_names_must_stay_inside_root() {
        for bad in ["..", ".", "a/b", "../etc", "/abs", "a\\b"] {
            let err = FixtureParams::new("testdb", bad)
                .validate(FixtureAction::Load)
                .unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidFixtureName(_)),
                "{bad} should be rejected"
            );
        }
        assert!(FixtureParams::new("testdb", "fixture-1.v2")
            .validate(FixtureAction::Load)
            .is_ok());
    }

    #[test]
    fn database_names_pass_through_verbatim() {
        let target = CollectionParams::new("weird db/../name", "widgets")
            .validate(CollectionAction::Get)
            .unwrap();
        assert_eq!(target.database, "weird db/../name");
    }

    #[test]
    fn bookkeeping_database_is_off_limits() {
        let err = CollectionParams::new(RESERVED_DATABASE, "loaded_fixtures")
            .validate(CollectionAction::Get)
            .unwrap_err();
        assert_eq!(err, ValidationError::ReservedDatabase("_instadoc".to_owned()));
        assert!(matches!(
            FixtureParams::new(RESERVED_DATABASE, "sample").validate(FixtureAction::Load),
            Err(ValidationError::ReservedDatabase(_))
        ));
    }

    #[test]
    fn collection_params_messages() {
        let params = CollectionParams {
            db: Some("testdb".to_owned()),
            col: None,
        };
        assert_eq!(
            params
                .validate(CollectionAction::Drop)
                .unwrap_err()
                .to_string(),
            "Query parameter 'col' specifies name of collection to drop."
        );
        assert_eq!(
            params
                .validate(CollectionAction::Get)
                .unwrap_err()
                .to_string(),
            "Query parameter 'col' specifies name of collection to get."
        );
    }
}
