//! Process settings: built-in defaults, an optional TOML file, then CLI flags.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DB_PORT: u16 = 5001;
pub const DEFAULT_REST_PORT: u16 = 5000;
pub const DEFAULT_FIXTURES: &str = "./fixtures";
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("cannot resolve fixtures directory {}: {source}", .path.display())]
    FixturesRoot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error(
        "To load an initial database fixture please use --db=<database-name> to specify which database to load the fixture into."
    )]
    MissingInitialDatabase,
}

/// Contents of a `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_port: Option<u16>,
    pub rest_port: Option<u16>,
    pub fixtures: Option<PathBuf>,
    pub workers: Option<usize>,
    #[serde(default)]
    pub initial: InitialSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InitialSection {
    pub db: Option<String>,
    pub fixture: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_port: Option<u16>,
    pub rest_port: Option<u16>,
    pub fixtures: Option<PathBuf>,
    pub workers: Option<usize>,
    pub db: Option<String>,
    pub load: Option<String>,
}

/// A fixture to load before the control surface starts serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialFixture {
    pub database: String,
    pub fixture: String,
}

/// Resolved, immutable process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_port: u16,
    pub rest_port: u16,
    /// Always absolute.
    pub fixtures: PathBuf,
    pub workers: usize,
    pub initial: Option<InitialFixture>,
}

impl Settings {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Result<Self, ConfigError> {
        let fixtures = cli
            .fixtures
            .or(file.fixtures)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FIXTURES));
        let fixtures = std::path::absolute(&fixtures).map_err(|source| {
            ConfigError::FixturesRoot {
                path: fixtures.clone(),
                source,
            }
        })?;

        let workers = cli.workers.or(file.workers).unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let database = cli.db.or(file.initial.db).filter(|s| !s.is_empty());
        let fixture = cli.load.or(file.initial.fixture).filter(|s| !s.is_empty());
        let initial = match (database, fixture) {
            (Some(database), Some(fixture)) => Some(InitialFixture { database, fixture }),
            (None, Some(_)) => return Err(ConfigError::MissingInitialDatabase),
            (_, None) => None,
        };

        Ok(Self {
            db_port: cli.db_port.or(file.db_port).unwrap_or(DEFAULT_DB_PORT),
            rest_port: cli.rest_port.or(file.rest_port).unwrap_or(DEFAULT_REST_PORT),
            fixtures,
            workers,
            initial,
        })
    }
}
