use std::path::Path;

use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::mapping::IdMapping;
use crate::model::{Mode, TwoTowerModel};
use crate::types::ExportRecord;

pub const EXPORT_FILE: &str = "movie_embeddings.json";

/// Run every item index through the item tower in inference mode.
/// Row `i` is the vector for dense item index `i`.
pub fn item_embeddings(model: &TwoTowerModel) -> Result<Array2<f32>> {
    let num_items = model.shape().num_items;
    let all: Vec<u32> = (0..num_items as u32).collect();
    let indices = model.item_indices(&all)?;
    let vectors = model.item_tower().forward(&indices, Mode::Inference)?;

    let (rows, dim) = vectors.dims2()?;
    let rows_data = vectors.to_vec2::<f32>()?;
    Ok(Array2::from_shape_fn((rows, dim), |(i, j)| rows_data[i][j]))
}

/// Join trained item vectors with their original identifiers. Covers
/// `0..num_items` exactly once, in index order. A mapping with more items
/// than the model belongs to a different extraction and is rejected.
pub fn export_items(model: &TwoTowerModel, items: &IdMapping) -> Result<Vec<ExportRecord>> {
    let num_items = model.shape().num_items;
    if items.len() > num_items {
        return Err(PipelineError::ItemCountMismatch {
            mapping: items.len(),
            model: num_items,
        });
    }

    let embeddings = item_embeddings(model)?;
    embeddings
        .rows()
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let item_id = items
                .id_of(index)
                .ok_or(PipelineError::MissingMapping { index })?;
            Ok(ExportRecord {
                item_id: item_id.clone(),
                embedding: row.to_vec(),
            })
        })
        .collect()
}

/// Replace the export file atomically.
pub fn save(dir: &Path, records: &[ExportRecord]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(EXPORT_FILE);
    let tmp_path = dir.join(".movie_embeddings.json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string(records)?)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

pub fn load(dir: &Path) -> Result<Vec<ExportRecord>> {
    let path = dir.join(EXPORT_FILE);
    if !path.exists() {
        return Err(PipelineError::artifact(&path, "not found, run `cinematch train` first"));
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content).map_err(|e| PipelineError::artifact(&path, e.to_string()))
}
