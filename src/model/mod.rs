pub mod manifest;
pub mod tower;

use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TrainConfig;
use crate::error::{PipelineError, Result};

pub use manifest::ModelManifest;
pub use tower::Tower;
use tower::TowerDims;

/// Whether dropout is active. Callers choose explicitly on every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}

/// Table sizes and layer widths; everything needed to rebuild the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelShape {
    pub num_users: usize,
    pub num_items: usize,
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub dropout: f32,
}

impl ModelShape {
    pub fn new(num_users: usize, num_items: usize, config: &TrainConfig) -> Self {
        Self {
            num_users,
            num_items,
            embedding_dim: config.embedding_dim,
            hidden_dim: config.hidden_dim,
            output_dim: config.output_dim,
            dropout: config.dropout,
        }
    }

    fn tower_dims(&self) -> TowerDims {
        TowerDims {
            embedding_dim: self.embedding_dim,
            hidden_dim: self.hidden_dim,
            output_dim: self.output_dim,
            dropout: self.dropout,
        }
    }
}

/// User and item towers projecting into a shared `output_dim` space.
///
/// Both towers are built from the same `ModelShape`, so their output widths
/// always agree and the dot product is well defined.
pub struct TwoTowerModel {
    shape: ModelShape,
    device: Device,
    user_tower: Tower,
    item_tower: Tower,
    varmap: VarMap,
}

impl TwoTowerModel {
    /// Fresh parameters drawn from `rng`.
    pub fn new(shape: ModelShape, rng: &mut StdRng) -> Result<Self> {
        let model = Self::build(shape, [rng.gen(), rng.gen()])?;
        tower::seed_params(&model.varmap, rng)?;
        Ok(model)
    }

    /// Rebuild from a safetensors file; every tensor must be present with
    /// the shape `shape` implies.
    pub fn load(shape: ModelShape, weights: &Path) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let mut model = Self::build(shape, [rng.gen(), rng.gen()])?;
        model
            .varmap
            .load(weights)
            .map_err(|e| PipelineError::artifact(weights, e.to_string()))?;
        Ok(model)
    }

    pub fn save(&self, weights: &Path) -> Result<()> {
        self.varmap.save(weights)?;
        Ok(())
    }

    fn build(shape: ModelShape, dropout_seeds: [u64; 2]) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let dims = shape.tower_dims();
        let (user_tower, item_tower) = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            (
                Tower::build("user", shape.num_users, dims, vb.pp("user"), dropout_seeds[0])?,
                Tower::build("item", shape.num_items, dims, vb.pp("item"), dropout_seeds[1])?,
            )
        };

        Ok(Self {
            shape,
            device,
            user_tower,
            item_tower,
            varmap,
        })
    }

    pub fn shape(&self) -> &ModelShape {
        &self.shape
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn user_tower(&self) -> &Tower {
        &self.user_tower
    }

    pub fn item_tower(&self) -> &Tower {
        &self.item_tower
    }

    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn user_indices(&self, users: &[u32]) -> Result<Tensor> {
        self.user_tower.index_tensor(users, &self.device)
    }

    pub fn item_indices(&self, items: &[u32]) -> Result<Tensor> {
        self.item_tower.index_tensor(items, &self.device)
    }

    /// Raw dot-product scores (logits), `[batch]`, on prepared index tensors.
    pub fn forward_tensors(&self, users: &Tensor, items: &Tensor, mode: Mode) -> Result<Tensor> {
        let u = self.user_tower.forward(users, mode)?;
        let v = self.item_tower.forward(items, mode)?;
        Ok((u * v)?.sum(1)?)
    }

    /// Raw dot-product scores (logits) for paired user/item indices.
    pub fn forward(&self, users: &[u32], items: &[u32], mode: Mode) -> Result<Vec<f32>> {
        let users = self.user_indices(users)?;
        let items = self.item_indices(items)?;
        Ok(self.forward_tensors(&users, &items, mode)?.to_vec1::<f32>()?)
    }

    /// Probabilities in (0, 1). Always runs in inference mode.
    pub fn predict(&self, users: &[u32], items: &[u32]) -> Result<Vec<f32>> {
        let users = self.user_indices(users)?;
        let items = self.item_indices(items)?;
        let logits = self.forward_tensors(&users, &items, Mode::Inference)?;
        Ok(candle_nn::ops::sigmoid(&logits)?.to_vec1::<f32>()?)
    }
}
