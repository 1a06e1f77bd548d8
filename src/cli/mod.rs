pub mod extract;
pub mod output;
pub mod run;
pub mod score;
pub mod status;
pub mod train;
pub mod upload;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::TrainConfig;
use crate::store::DEFAULT_CHUNK_SIZE;

#[derive(Parser)]
#[command(name = "cinematch", about = "Two-tower recommendation training", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Env file with store credentials (ignored if missing).
    #[arg(long = "env-file", global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Suppress progress.
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,
}

/// Artifact locations shared by every stage.
#[derive(Args, Clone, Debug)]
pub struct Paths {
    /// Mapping + dataset directory.
    #[arg(long = "data-dir", default_value = "data")]
    pub data_dir: PathBuf,
    /// Embedding export directory.
    #[arg(long = "export-dir", default_value = "exports")]
    pub export_dir: PathBuf,
    /// Saved weights directory.
    #[arg(long = "model-dir", default_value = "models")]
    pub model_dir: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct ExtractArgs {
    /// Read rows from a local JSON array instead of the store.
    #[arg(long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Substitute the prototype dataset when no rows are found.
    #[arg(long = "fallback")]
    pub fallback: bool,
}

#[derive(Args, Clone, Debug)]
pub struct TrainArgs {
    #[arg(long = "epochs", default_value = "10")]
    pub epochs: usize,
    #[arg(long = "batch-size", default_value = "32")]
    pub batch_size: usize,
    #[arg(long = "learning-rate", default_value = "0.001")]
    pub learning_rate: f64,
    /// Dropout rate in the towers' hidden layer.
    #[arg(long = "dropout", default_value = "0.2")]
    pub dropout: f32,
    /// Fix all randomness for a reproducible run.
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

impl TrainArgs {
    pub fn to_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            dropout: self.dropout,
            seed: self.seed,
            ..Default::default()
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct UploadArgs {
    /// Records per upsert request.
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Pull interactions and build id mappings + dataset file.
    Extract {
        #[command(flatten)]
        paths: Paths,
        #[command(flatten)]
        args: ExtractArgs,
    },
    /// Train the model and export item embeddings.
    Train {
        #[command(flatten)]
        paths: Paths,
        #[command(flatten)]
        args: TrainArgs,
    },
    /// Upsert exported embeddings into the vector store.
    Upload {
        #[command(flatten)]
        paths: Paths,
        #[command(flatten)]
        args: UploadArgs,
    },
    /// Extract, train and upload in one go.
    Run {
        #[command(flatten)]
        paths: Paths,
        #[command(flatten)]
        extract: ExtractArgs,
        #[command(flatten)]
        train: TrainArgs,
        #[command(flatten)]
        upload: UploadArgs,
        /// Stop after export.
        #[arg(long = "no-upload")]
        no_upload: bool,
    },
    /// Show which artifacts exist.
    Status {
        #[command(flatten)]
        paths: Paths,
    },
    /// Score one user/item pair with the saved model.
    Score {
        #[command(flatten)]
        paths: Paths,
        user: String,
        item: String,
    },
}

/// Main CLI entry point.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.quiet);
    let env_file = cli.env_file.as_path();

    match cli.command {
        Command::Extract { paths, args } => extract::run(&paths, &args, env_file, cli.quiet),
        Command::Train { paths, args } => train::run(&paths, &args, cli.quiet),
        Command::Upload { paths, args } => upload::run(&paths, &args, env_file, cli.quiet),
        Command::Run {
            paths,
            extract,
            train,
            upload,
            no_upload,
        } => run::run(
            &paths,
            &extract,
            &train,
            (!no_upload).then_some(&upload),
            env_file,
            cli.quiet,
        ),
        Command::Status { paths } => status::run(&paths),
        Command::Score { paths, user, item } => score::run(&paths, &user, &item),
    }
}
