use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::mapping::{IdMapping, MappedInteractions};
use crate::types::{RawInteraction, TrainingExample};

pub const DATASET_FILE: &str = "interactions.csv";

/// Indexable collection of training triples. No deduplication or resampling.
#[derive(Debug, Clone, Default)]
pub struct InteractionDataset {
    examples: Vec<TrainingExample>,
}

/// Column-major view of one mini-batch, ready for tensor construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub users: Vec<u32>,
    pub items: Vec<u32>,
    pub labels: Vec<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl InteractionDataset {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&TrainingExample> {
        self.examples.get(position)
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    /// Number of batches one epoch yields.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.examples.len().div_ceil(batch_size.max(1))
    }

    /// One epoch of shuffled batches, without replacement. The last batch may
    /// be short. Every call draws a fresh permutation from `rng`.
    pub fn shuffled_batches<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> impl Iterator<Item = Batch> + '_ {
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        order.shuffle(rng);

        let batch_size = batch_size.max(1);
        let chunks: Vec<Vec<usize>> = order.chunks(batch_size).map(<[usize]>::to_vec).collect();
        chunks.into_iter().map(move |chunk| {
            let mut batch = Batch {
                users: Vec::with_capacity(chunk.len()),
                items: Vec::with_capacity(chunk.len()),
                labels: Vec::with_capacity(chunk.len()),
            };
            for pos in chunk {
                let ex = &self.examples[pos];
                batch.users.push(ex.user_index);
                batch.items.push(ex.item_index);
                batch.labels.push(ex.label);
            }
            batch
        })
    }
}

/// One row of the intermediate dataset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetRow {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "tmdbId")]
    item_id: String,
    #[serde(rename = "interactionType")]
    interaction_type: String,
    label: f32,
    user_idx: u32,
    item_idx: u32,
}

/// Write raw rows alongside their dense indices.
pub fn save(dir: &Path, rows: &[RawInteraction], mapped: &MappedInteractions) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(DATASET_FILE);
    let tmp_path = dir.join(".interactions.csv.tmp");

    let mut writer = csv::Writer::from_path(&tmp_path)?;
    for (raw, ex) in rows.iter().zip(&mapped.examples) {
        writer.serialize(DatasetRow {
            user_id: raw.user_id.to_string(),
            item_id: raw.item_id.to_string(),
            interaction_type: raw.interaction_type.clone(),
            label: ex.label,
            user_idx: ex.user_index,
            item_idx: ex.item_index,
        })?;
    }
    writer.flush()?;
    drop(writer);
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Read the dataset file, checking every row against the mapping it was
/// extracted with: indices in range and identifiers matching.
pub fn load(dir: &Path, users: &IdMapping, items: &IdMapping) -> Result<InteractionDataset> {
    let path = dir.join(DATASET_FILE);
    if !path.exists() {
        return Err(PipelineError::artifact(&path, "not found, run `cinematch extract` first"));
    }

    let mut reader = csv::Reader::from_path(&path)?;
    let mut examples = Vec::new();
    for (line, row) in reader.deserialize::<DatasetRow>().enumerate() {
        let row = row?;
        let (Some(user), Some(item)) = (
            users.id_of(row.user_idx as usize),
            items.id_of(row.item_idx as usize),
        ) else {
            return Err(PipelineError::artifact(
                &path,
                format!(
                    "row {line}: index ({}, {}) outside mapping ({}x{})",
                    row.user_idx,
                    row.item_idx,
                    users.len(),
                    items.len()
                ),
            ));
        };
        if user.to_string() != row.user_id || item.to_string() != row.item_id {
            return Err(PipelineError::artifact(
                &path,
                format!(
                    "row {line}: ({}, {}) does not match mapping entry ({user}, {item}); \
                     re-run `cinematch extract`",
                    row.user_id, row.item_id
                ),
            ));
        }
        if !(0.0..=1.0).contains(&row.label) {
            return Err(PipelineError::artifact(
                &path,
                format!("row {line}: label {} outside [0, 1]", row.label),
            ));
        }
        examples.push(TrainingExample {
            user_index: row.user_idx,
            item_index: row.item_idx,
            label: row.label,
        });
    }
    Ok(InteractionDataset::new(examples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::map_interactions;
    use crate::types::{fallback_interactions, Identifier};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn dataset(n: u32) -> InteractionDataset {
        InteractionDataset::new(
            (0..n)
                .map(|i| TrainingExample {
                    user_index: i,
                    item_index: i % 3,
                    label: (i % 2) as f32,
                })
                .collect(),
        )
    }

    #[test]
    fn batches_cover_every_example_once() {
        let ds = dataset(10);
        let mut rng = StdRng::seed_from_u64(1);
        let batches: Vec<Batch> = ds.shuffled_batches(4, &mut rng).collect();
        assert_eq!(batches.len(), ds.num_batches(4));
        assert_eq!(
            batches.iter().map(Batch::len).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );

        let mut seen: Vec<u32> = batches.iter().flat_map(|b| b.users.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for batch in &batches {
            for k in 0..batch.len() {
                let ex = ds.get(batch.users[k] as usize).unwrap();
                assert_eq!((ex.item_index, ex.label), (batch.items[k], batch.labels[k]));
            }
        }
    }

    #[test]
    fn epochs_reshuffle() {
        let ds = dataset(64);
        let mut rng = StdRng::seed_from_u64(9);
        let first: Vec<u32> = ds.shuffled_batches(64, &mut rng).flat_map(|b| b.users).collect();
        let second: Vec<u32> = ds.shuffled_batches(64, &mut rng).flat_map(|b| b.users).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn same_seed_same_order() {
        let ds = dataset(32);
        let order = |seed| -> Vec<u32> {
            let mut rng = StdRng::seed_from_u64(seed);
            ds.shuffled_batches(5, &mut rng).flat_map(|b| b.users).collect()
        };
        assert_eq!(order(3), order(3));
    }

    #[test]
    fn file_preserves_rows() {
        let tmp = TempDir::new().unwrap();
        let rows = fallback_interactions();
        let mapped = map_interactions(&rows).unwrap();
        save(tmp.path(), &rows, &mapped).unwrap();

        let ds = load(tmp.path(), &mapped.users, &mapped.items).unwrap();
        assert_eq!(ds.len(), rows.len());
        assert_eq!(ds.examples(), mapped.examples.as_slice());

        let header = std::fs::read_to_string(tmp.path().join(DATASET_FILE)).unwrap();
        assert!(header.starts_with("userId,tmdbId,interactionType,label,user_idx,item_idx"));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let tmp = TempDir::new().unwrap();
        let rows = fallback_interactions();
        let mapped = map_interactions(&rows).unwrap();
        save(tmp.path(), &rows, &mapped).unwrap();

        let two_items = IdMapping::from_ids(&[Identifier::Int(155), Identifier::Int(550)]);
        let err = load(tmp.path(), &mapped.users, &two_items).unwrap_err();
        assert!(err.to_string().contains("outside mapping"));
    }

    #[test]
    fn rows_from_another_extraction_rejected() {
        let tmp = TempDir::new().unwrap();
        let rows = fallback_interactions();
        let mapped = map_interactions(&rows).unwrap();
        save(tmp.path(), &rows, &mapped).unwrap();

        let renamed: Vec<RawInteraction> = rows
            .iter()
            .map(|r| {
                let user = format!("new-{}", r.user_id);
                RawInteraction::new(user.as_str(), r.item_id.clone(), "CLICK", r.label)
            })
            .collect();
        let other = map_interactions(&renamed).unwrap();

        let err = load(tmp.path(), &other.users, &other.items).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArtifact { .. }));
        assert!(err.to_string().contains("does not match mapping entry"));
    }
}
