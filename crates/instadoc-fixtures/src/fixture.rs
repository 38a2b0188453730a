use crate::identity::fixture_document_id;
use crate::FixtureError;
use instadoc_store::ID_FIELD;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Documents destined for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureCollection {
    pub name: String,
    pub documents: Vec<Value>,
}

impl FixtureCollection {
    /// The `_id` of every document, in file order.
    pub fn ids(&self) -> Vec<Value> {
        self.documents
            .iter()
            .filter_map(|doc| doc.get(ID_FIELD).cloned())
            .collect()
    }
}

/// A parsed fixture directory. Collections are sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSet {
    pub name: String,
    pub collections: Vec<FixtureCollection>,
}

impl FixtureSet {
    /// Read every `<collection>.json` file in `dir`.
    ///
    /// Documents without an `_id` get a deterministic one derived from the
    /// fixture name, the collection name and the document's position.
    pub fn from_dir(dir: &Path) -> Result<Self, FixtureError> {
        if !dir.exists() {
            return Err(FixtureError::NotFound(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(FixtureError::NotADirectory(dir.to_path_buf()));
        }

        let name = fixture_name(dir)?;

        let read_err = |source| FixtureError::Read {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if is_collection_file(&path) {
                files.push(path);
            } else {
                debug!("ignoring non-collection entry {}", path.display());
            }
        }
        files.sort();

        let collections = files
            .iter()
            .map(|path| parse_collection_file(&name, path))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "parsed fixture '{name}' with {} collections from {}",
            collections.len(),
            dir.display()
        );
        Ok(Self { name, collections })
    }
}

/// The fixture name of a fixture directory: its last path component.
pub fn fixture_name(dir: &Path) -> Result<String, FixtureError> {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FixtureError::NotFound(dir.to_path_buf()))
}

fn is_collection_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn parse_collection_file(fixture: &str, path: &Path) -> Result<FixtureCollection, FixtureError> {
    let collection = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if collection.is_empty() {
        return Err(FixtureError::InvalidFile {
            path: path.to_path_buf(),
            reason: "collection name is empty".to_owned(),
        });
    }

    let content = fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&content).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Array(items) = parsed else {
        return Err(FixtureError::InvalidFile {
            path: path.to_path_buf(),
            reason: "expected a JSON array of documents".to_owned(),
        });
    };

    let mut documents = Vec::with_capacity(items.len());
    for (index, mut doc) in items.into_iter().enumerate() {
        let Some(fields) = doc.as_object_mut() else {
            return Err(FixtureError::InvalidFile {
                path: path.to_path_buf(),
                reason: format!("element {index} is not a JSON object"),
            });
        };
        fields
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(fixture_document_id(fixture, &collection, index)));
        documents.push(doc);
    }

    Ok(FixtureCollection {
        name: collection,
        documents,
    })
}
