use std::fs;
use std::path::PathBuf;

use terranova_engine::{Design, DesignError, DesignLoader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DesignFileError {
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid design in {path}")]
    Design {
        path: String,
        #[source]
        source: DesignError,
    },
}

/// Reads a design catalog from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileDesignLoader {
    path: PathBuf,
}

impl FileDesignLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DesignLoader for FileDesignLoader {
    type Error = DesignFileError;

    fn load_design(&self) -> Result<Design, Self::Error> {
        let path = self.path.display().to_string();
        let json = fs::read_to_string(&self.path).map_err(|source| DesignFileError::Io {
            path: path.clone(),
            source,
        })?;
        Design::from_json(&json).map_err(|source| DesignFileError::Design { path, source })
    }
}
