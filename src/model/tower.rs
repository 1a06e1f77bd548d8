use std::collections::HashMap;
use std::sync::Mutex;

use candle_core::{Device, Module, Tensor, Var};
use candle_nn::{Embedding, Linear, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Mode;
use crate::error::{PipelineError, Result};

/// Overwrite every variable in `varmap` from `rng`, in name order.
///
/// candle's own initialisers draw from an unseeded generator, so layers are
/// created through the `VarBuilder` and then refilled here. Lookup tables get
/// a unit-variance uniform; linear weights and biases get `+-1/sqrt(fan_in)`.
pub(crate) fn seed_params(varmap: &VarMap, rng: &mut StdRng) -> Result<()> {
    let vars = varmap.data().lock().unwrap_or_else(|e| e.into_inner());
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();
    for name in names {
        let var = &vars[name];
        let bound = init_bound(name, &vars)?;
        let values: Vec<f32> = (0..var.elem_count())
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        var.set(&Tensor::from_vec(values, var.dims(), var.device())?)?;
    }
    Ok(())
}

fn init_bound(name: &str, vars: &HashMap<String, Var>) -> Result<f32> {
    if name.ends_with("embedding.weight") {
        return Ok(3f32.sqrt());
    }
    let weight_name = match name.strip_suffix(".bias") {
        Some(prefix) => format!("{prefix}.weight"),
        None => name.to_string(),
    };
    let weight = vars
        .get(&weight_name)
        .ok_or_else(|| candle_core::Error::Msg(format!("no weight for {name}")))?;
    let (_, fan_in) = weight.dims2()?;
    Ok(1.0 / (fan_in as f32).sqrt())
}

/// Inverted dropout with its own seeded stream. Identity outside training.
struct Dropout {
    p: f32,
    rng: Mutex<StdRng>,
}

impl Dropout {
    fn new(p: f32, seed: u64) -> Self {
        Self {
            p,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn forward(&self, xs: &Tensor, mode: Mode) -> Result<Tensor> {
        if mode == Mode::Inference || self.p == 0.0 {
            return Ok(xs.clone());
        }
        let scale = 1.0 / (1.0 - self.p);
        let mask: Vec<f32> = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            (0..xs.elem_count())
                .map(|_| if rng.gen::<f32>() < self.p { 0.0 } else { scale })
                .collect()
        };
        let mask = Tensor::from_vec(mask, xs.dims(), xs.device())?;
        Ok(xs.mul(&mask)?)
    }
}

/// Layer sizes shared by both towers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TowerDims {
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub dropout: f32,
}

/// Embedding lookup followed by `E -> H -> D -> D` with ReLU and dropout.
pub struct Tower {
    name: &'static str,
    rows: usize,
    embedding: Embedding,
    hidden: Linear,
    dropout: Dropout,
    projection: Linear,
    output: Linear,
}

impl Tower {
    /// Create the tower's layers under `vb` (`embedding`, `hidden`,
    /// `projection`, `output`).
    pub(crate) fn build(
        name: &'static str,
        rows: usize,
        dims: TowerDims,
        vb: VarBuilder,
        dropout_seed: u64,
    ) -> Result<Self> {
        let embedding = candle_nn::embedding(rows, dims.embedding_dim, vb.pp("embedding"))?;
        let hidden = candle_nn::linear(dims.embedding_dim, dims.hidden_dim, vb.pp("hidden"))?;
        let projection =
            candle_nn::linear(dims.hidden_dim, dims.output_dim, vb.pp("projection"))?;
        let output = candle_nn::linear(dims.output_dim, dims.output_dim, vb.pp("output"))?;
        let dropout = Dropout::new(dims.dropout, dropout_seed);

        Ok(Self {
            name,
            rows,
            embedding,
            hidden,
            dropout,
            projection,
            output,
        })
    }

    /// Turn dense indices into an index tensor, rejecting anything outside
    /// the lookup table.
    pub fn index_tensor(&self, indices: &[u32], device: &Device) -> Result<Tensor> {
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= self.rows) {
            return Err(PipelineError::IndexOutOfRange {
                side: self.name,
                index: bad,
                len: self.rows,
            });
        }
        Ok(Tensor::new(indices, device)?)
    }

    /// `[batch] u32 -> [batch, D]`.
    pub fn forward(&self, indices: &Tensor, mode: Mode) -> Result<Tensor> {
        let xs = self.embedding.forward(indices)?;
        let xs = self.hidden.forward(&xs)?.relu()?;
        let xs = self.dropout.forward(&xs, mode)?;
        let xs = self.projection.forward(&xs)?.relu()?;
        Ok(self.output.forward(&xs)?)
    }
}
