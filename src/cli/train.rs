use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use super::{output, Paths, TrainArgs};
use crate::export::EXPORT_FILE;
use crate::pipeline::{self, TrainSummary};
use crate::train::EpochReport;

pub fn run(paths: &Paths, args: &TrainArgs, quiet: bool) -> Result<()> {
    output::step(quiet, 2, "Training two-tower model...");
    let summary = train(paths, args, quiet)?;
    report(&summary, paths, quiet);
    Ok(())
}

pub(crate) fn train(paths: &Paths, args: &TrainArgs, quiet: bool) -> Result<TrainSummary> {
    let config = args.to_config();
    let t0 = Instant::now();

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(config.epochs as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} epochs  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };
    let on_epoch = |r: &EpochReport| {
        bar.set_position(r.epoch as u64);
        bar.set_message(format!("loss {:.4}", r.mean_loss));
        bar.println(format!("Epoch {}/{}, Loss: {:.4}", r.epoch, r.epochs, r.mean_loss));
    };

    let summary = pipeline::train(
        &paths.data_dir,
        &paths.export_dir,
        &paths.model_dir,
        &config,
        Some(&on_epoch),
    )
    .context("training failed")?;
    bar.finish_and_clear();

    tracing::debug!(elapsed_s = t0.elapsed().as_secs_f64(), "training finished");
    Ok(summary)
}

pub(crate) fn report(summary: &TrainSummary, paths: &Paths, quiet: bool) {
    output::success(
        quiet,
        &format!(
            "Trained on {} interactions ({} users, {} items). Saved {} item embeddings to {}",
            summary.interactions,
            summary.users,
            summary.items,
            summary.exported,
            paths.export_dir.join(EXPORT_FILE).display()
        ),
    );
}
