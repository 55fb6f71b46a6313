use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One configuration file, decoded into a flat `name -> value` map.
#[derive(Debug, Clone)]
pub(crate) struct FileSnapshot {
    pub path: PathBuf,
    pub values: Map<String, Value>,
}

impl FileSnapshot {
    /// Read and decode `path`. The top level must be a JSON object.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        let values: Map<String, Value> =
            serde_json::from_slice(&raw).map_err(|source| Error::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), keys = values.len(), "loaded config file");
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }
}
