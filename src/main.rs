use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use sprig_eval::Evaluation;
use sprig_io::{
    FeatureTableReader, PredictionWriter, ScoringConfig, error_chain, load_model_file,
};
use sprig_rf::RandomForest;

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Splice-variant pathogenicity scoring with pre-trained random forests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel scoring (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Score a CSV feature table with every configured classifier version
    Score {
        /// Path to the JSON scoring configuration
        #[arg(long)]
        config: PathBuf,

        /// Path to the CSV feature table (id column first)
        #[arg(long)]
        features: PathBuf,

        /// Path of the JSON predictions file to write
        #[arg(long)]
        output: PathBuf,
    },

    /// Validate a model and print its structure
    Inspect {
        /// Path to a JSON model document, or a binary snapshot with --snapshot
        #[arg(long)]
        model: PathBuf,

        /// Read the model as a binary snapshot instead of JSON
        #[arg(long, default_value_t = false)]
        snapshot: bool,
    },

    /// Validate a JSON model and save it as a binary snapshot
    Compile {
        /// Path to the JSON model document
        #[arg(long)]
        model: PathBuf,

        /// Path of the snapshot to write
        #[arg(long)]
        output: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct ScoreOutput {
    n_records: usize,
    versions: Vec<String>,
    failed_versions: Vec<FailedVersionOutput>,
    n_failed_evaluations: usize,
    output: PathBuf,
}

#[derive(Serialize)]
struct FailedVersionOutput {
    id: String,
    error: String,
}

#[derive(Serialize)]
struct InspectOutput {
    name: String,
    classes: Vec<String>,
    n_trees: usize,
    features: Vec<String>,
    trees: Vec<TreeOutput>,
}

#[derive(Serialize)]
struct TreeOutput {
    name: Option<String>,
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
}

#[derive(Serialize)]
struct CompileOutput {
    name: String,
    n_trees: usize,
    n_classes: usize,
    output: PathBuf,
}

fn read_model(path: &Path, snapshot: bool) -> Result<RandomForest> {
    let forest = if snapshot {
        RandomForest::load(path).context("failed to load model snapshot")?
    } else {
        load_model_file(path).context("failed to load model")?
    };
    Ok(forest)
}

fn count_failures(evaluations: &[Evaluation]) -> usize {
    evaluations
        .iter()
        .flat_map(|e| e.values())
        .filter(|outcome| outcome.is_err())
        .count()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Score {
            config,
            features,
            output,
        } => {
            // 1. Load configuration and every version's model
            let setup = ScoringConfig::from_file(&config)
                .context("failed to read scoring configuration")?
                .build()
                .context("failed to assemble evaluator")?;
            for failure in &setup.failures {
                warn!(version = %failure.version, "version excluded from scoring");
            }

            // 2. Read feature table
            let table = FeatureTableReader::new(&features)
                .read()
                .context("failed to read feature table")?;

            // 3. Evaluate
            let evaluations = setup.evaluator.evaluate_batch(table.vectors);

            // 4. Write predictions JSON
            let writer = PredictionWriter::new(&output)?;
            writer.write(&table.record_ids, &evaluations)?;

            // 5. Print summary
            let summary = ScoreOutput {
                n_records: table.record_ids.len(),
                versions: setup
                    .evaluator
                    .versions()
                    .map(|v| v.id().to_string())
                    .collect(),
                failed_versions: setup
                    .failures
                    .iter()
                    .map(|f| FailedVersionOutput {
                        id: f.version.to_string(),
                        error: error_chain(&f.error),
                    })
                    .collect(),
                n_failed_evaluations: count_failures(&evaluations),
                output,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Inspect { model, snapshot } => {
            let forest = read_model(&model, snapshot)?;

            let summary = InspectOutput {
                name: forest.name().to_string(),
                classes: forest.labels().to_strings(),
                n_trees: forest.n_trees(),
                features: forest.feature_names().to_vec(),
                trees: forest
                    .trees()
                    .iter()
                    .map(|tree| TreeOutput {
                        name: tree.name().map(str::to_string),
                        n_nodes: tree.n_nodes(),
                        n_leaves: tree.n_leaves(),
                        depth: tree.depth(),
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Compile { model, output } => {
            let forest = read_model(&model, false)?;
            forest
                .save(&output)
                .with_context(|| format!("failed to write snapshot {}", output.display()))?;

            let summary = CompileOutput {
                name: forest.name().to_string(),
                n_trees: forest.n_trees(),
                n_classes: forest.n_classes(),
                output,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
