//! Stage functions shared by the CLI subcommands. Each stage reads the
//! artifacts of the previous one from disk, so a failed run can resume from
//! the last completed stage.

use std::path::Path;

use crate::config::TrainConfig;
use crate::dataset;
use crate::error::{PipelineError, Result};
use crate::export;
use crate::mapping::{self, IdMapping, MappingFile};
use crate::model::manifest::{self, ModelManifest};
use crate::store::{self, InteractionSource, VectorSink};
use crate::train::{EpochReport, Trainer};
use crate::types::{fallback_interactions, ExtractStats, Identifier, UploadStats};

/// Pull rows, map identifiers, and write `mappings.json` + `interactions.csv`.
///
/// An empty source is an error unless `allow_fallback` is set, in which case
/// the prototype dataset is substituted and the substitution is logged.
pub fn extract(
    source: &dyn InteractionSource,
    data_dir: &Path,
    allow_fallback: bool,
) -> Result<ExtractStats> {
    let mut rows = source.fetch_interactions()?;
    let mut used_fallback = false;

    if rows.is_empty() && allow_fallback {
        tracing::warn!(
            source = %source.describe(),
            "no interactions found; substituting the built-in fallback dataset"
        );
        rows = fallback_interactions();
        used_fallback = true;
    }

    let mapped = mapping::map_interactions(&rows)?;
    // Both files are written before either is replaced, so a failure here
    // leaves the previous pair in place.
    let staged = MappingFile::new(&mapped.users, &mapped.items).stage(data_dir)?;
    if let Err(e) = dataset::save(data_dir, &rows, &mapped) {
        staged.discard();
        return Err(e);
    }
    staged.commit()?;

    let stats = ExtractStats {
        interactions: mapped.examples.len(),
        users: mapped.users.len(),
        items: mapped.items.len(),
        used_fallback,
    };
    tracing::info!(
        interactions = stats.interactions,
        users = stats.users,
        items = stats.items,
        "extraction complete"
    );
    Ok(stats)
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub users: usize,
    pub items: usize,
    pub interactions: usize,
    pub history: Vec<EpochReport>,
    pub exported: usize,
}

/// Train on the extracted artifacts, then export item vectors and save weights.
pub fn train(
    data_dir: &Path,
    export_dir: &Path,
    model_dir: &Path,
    config: &TrainConfig,
    on_epoch: Option<&dyn Fn(&EpochReport)>,
) -> Result<TrainSummary> {
    let (users, items) = MappingFile::load(data_dir)?;
    let ds = dataset::load(data_dir, &users, &items)?;
    tracing::info!(
        users = users.len(),
        items = items.len(),
        interactions = ds.len(),
        "initializing model"
    );

    let trainer = Trainer::new(config.clone(), &ds, users.len(), items.len())?;
    let outcome = trainer.fit(on_epoch)?;

    let records = export::export_items(&outcome.model, &items)?;
    export::save(export_dir, &records)?;

    let model_manifest =
        ModelManifest::new(*outcome.model.shape(), config.epochs, outcome.final_loss());
    manifest::save_model(&outcome.model, &model_manifest, model_dir)?;

    Ok(TrainSummary {
        users: users.len(),
        items: items.len(),
        interactions: ds.len(),
        history: outcome.history,
        exported: records.len(),
    })
}

/// Push the export file to the vector store in sequential chunks.
pub fn upload(
    sink: &dyn VectorSink,
    export_dir: &Path,
    chunk_size: usize,
    on_chunk: Option<&dyn Fn(usize, usize)>,
) -> Result<UploadStats> {
    let records = export::load(export_dir)?;
    tracing::info!(records = records.len(), chunk_size, "uploading embeddings");
    store::upload_chunked(sink, &records, chunk_size, on_chunk)
}

/// Relevance probability for one (user, item) pair from the saved model.
pub fn score(
    data_dir: &Path,
    model_dir: &Path,
    user: &Identifier,
    item: &Identifier,
) -> Result<f32> {
    let (users, items) = MappingFile::load(data_dir)?;
    let (model, _) = manifest::load_model(model_dir)?;

    let u = lookup(&users, user).ok_or_else(|| PipelineError::UnknownIdentifier {
        side: "user",
        id: user.to_string(),
    })?;
    let i = lookup(&items, item).ok_or_else(|| PipelineError::UnknownIdentifier {
        side: "item",
        id: item.to_string(),
    })?;

    let probs = model.predict(&[u], &[i])?;
    probs
        .first()
        .copied()
        .ok_or_else(|| PipelineError::Model(candle_core::Error::Msg("no score returned".into())))
}

/// Numeric CLI input may name a string identifier such as "123".
fn lookup(mapping: &IdMapping, id: &Identifier) -> Option<u32> {
    mapping.index_of(id).or_else(|| match id {
        Identifier::Int(n) => mapping.index_of(&Identifier::Text(n.to_string())),
        Identifier::Text(_) => None,
    })
}
