use std::path::Path;

use anyhow::{Context, Result};

use super::{output, ExtractArgs, Paths};
use crate::config::StoreConfig;
use crate::pipeline;
use crate::store::{InteractionSource, JsonFileSource, SupabaseStore};
use crate::types::ExtractStats;

pub fn run(paths: &Paths, args: &ExtractArgs, env_file: &Path, quiet: bool) -> Result<()> {
    output::step(quiet, 1, "Extracting interactions...");
    let stats = extract(paths, args, env_file)?;
    report(&stats, paths, quiet);
    Ok(())
}

/// Run the stage with a source scoped to this call.
pub(crate) fn extract(paths: &Paths, args: &ExtractArgs, env_file: &Path) -> Result<ExtractStats> {
    let source: Box<dyn InteractionSource> = match &args.input {
        Some(input) => Box::new(JsonFileSource::new(input)),
        None => {
            let config = StoreConfig::from_env(Some(env_file))?;
            Box::new(SupabaseStore::connect(&config)?)
        }
    };

    pipeline::extract(source.as_ref(), &paths.data_dir, args.fallback)
        .with_context(|| format!("extraction from {} failed", source.describe()))
}

pub(crate) fn report(stats: &ExtractStats, paths: &Paths, quiet: bool) {
    if stats.used_fallback {
        output::warn("No interaction data found; used fallback dummy data for prototyping.");
    }
    output::success(
        quiet,
        &format!(
            "Extraction complete. Found {} interactions ({} users, {} items) -> {}",
            stats.interactions,
            stats.users,
            stats.items,
            paths.data_dir.display()
        ),
    );
}

