use std::path::PathBuf;

use super::InteractionSource;
use crate::error::{PipelineError, Result};
use crate::types::RawInteraction;

/// Interaction rows from a local JSON array, shaped like the store's rows.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InteractionSource for JsonFileSource {
    fn fetch_interactions(&self) -> Result<Vec<RawInteraction>> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PipelineError::store(format!("read {}", self.path.display()), e))?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::artifact(&self.path, e.to_string()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
