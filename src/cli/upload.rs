use std::path::Path;

use anyhow::{Context, Result};

use super::{output, Paths, UploadArgs};
use crate::config::StoreConfig;
use crate::pipeline;
use crate::store::SupabaseStore;
use crate::types::UploadStats;

pub fn run(paths: &Paths, args: &UploadArgs, env_file: &Path, quiet: bool) -> Result<()> {
    output::step(quiet, 3, "Uploading embeddings...");
    let stats = upload(paths, args, env_file, quiet)?;
    report(&stats, quiet);
    Ok(())
}

pub(crate) fn upload(
    paths: &Paths,
    args: &UploadArgs,
    env_file: &Path,
    quiet: bool,
) -> Result<UploadStats> {
    let config = StoreConfig::from_env(Some(env_file))?;
    let store = SupabaseStore::connect(&config)?;
    let progress = |done: usize, total: usize| {
        if !quiet {
            output::chunk_progress(done, total);
        }
    };

    pipeline::upload(&store, &paths.export_dir, args.chunk_size, Some(&progress))
        .with_context(|| format!("upload to {} failed", config.embeddings_table))
}

pub(crate) fn report(stats: &UploadStats, quiet: bool) {
    output::success(
        quiet,
        &format!(
            "Uploaded {} embeddings in {} chunks.",
            stats.records, stats.chunks
        ),
    );
}
