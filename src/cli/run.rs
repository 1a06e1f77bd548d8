use std::path::Path;

use anyhow::Result;

use super::{extract, output, train, upload, ExtractArgs, Paths, TrainArgs, UploadArgs};
use crate::config::StoreConfig;

/// All stages in order. Each stage's artifacts stay on disk if a later one
/// fails, so the remaining stages can be rerun on their own.
pub fn run(
    paths: &Paths,
    extract_args: &ExtractArgs,
    train_args: &TrainArgs,
    upload_args: Option<&UploadArgs>,
    env_file: &Path,
    quiet: bool,
) -> Result<()> {
    // Credentials are needed by the first or last stage; fail before any work.
    if extract_args.input.is_none() || upload_args.is_some() {
        StoreConfig::from_env(Some(env_file))?;
    }

    output::step(quiet, 1, "Extracting interactions...");
    let stats = extract::extract(paths, extract_args, env_file)?;
    extract::report(&stats, paths, quiet);

    output::step(quiet, 2, "Training two-tower model...");
    let summary = train::train(paths, train_args, quiet)?;
    train::report(&summary, paths, quiet);

    if let Some(args) = upload_args {
        output::step(quiet, 3, "Uploading embeddings...");
        let stats = upload::upload(paths, args, env_file, quiet)?;
        upload::report(&stats, quiet);
    }

    Ok(())
}
