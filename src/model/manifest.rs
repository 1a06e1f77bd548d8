use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ModelShape, TwoTowerModel};
use crate::error::{PipelineError, Result};

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "two_tower.safetensors";

/// Sidecar describing how to rebuild the saved weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    pub shape: ModelShape,
    pub epochs: usize,
    pub final_loss: Option<f32>,
}

impl ModelManifest {
    pub fn new(shape: ModelShape, epochs: usize, final_loss: Option<f32>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            shape,
            epochs,
            final_loss,
        }
    }

    pub fn load(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(PipelineError::artifact(&path, "not found, run `cinematch train` first"));
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: ModelManifest = serde_json::from_str(&content)
            .map_err(|e| PipelineError::artifact(&path, e.to_string()))?;
        if manifest.version > MANIFEST_VERSION {
            return Err(PipelineError::artifact(
                &path,
                "written by a newer version of cinematch; upgrade or retrain",
            ));
        }
        Ok(manifest)
    }

    pub fn save(&self, model_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(model_dir)?;
        let path = model_dir.join(MANIFEST_FILE);
        let tmp_path = model_dir.join(".model.json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Write weights, then the manifest that points at them.
pub fn save_model(model: &TwoTowerModel, manifest: &ModelManifest, model_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(model_dir)?;
    let tmp_path = model_dir.join(".two_tower.safetensors.tmp");
    model.save(&tmp_path)?;
    std::fs::rename(&tmp_path, model_dir.join(WEIGHTS_FILE))?;
    manifest.save(model_dir)
}

pub fn load_model(model_dir: &Path) -> Result<(TwoTowerModel, ModelManifest)> {
    let manifest = ModelManifest::load(model_dir)?;
    let weights = model_dir.join(WEIGHTS_FILE);
    if !weights.exists() {
        return Err(PipelineError::artifact(&weights, "weights file missing"));
    }
    let model = TwoTowerModel::load(manifest.shape, &weights)?;
    Ok((model, manifest))
}
