//! `colpo` command line front-end
//!
//! Runs the analysis pipeline on local files without starting the server.

mod commands;

use analysis::{AnalysisEngine, EngineConfig};
use clap::{Parser, Subcommand};
use shared::{ClassifierBackend, ProcessId, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "colpo")]
#[command(about = "Colposcopy image triage from the command line", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "COLPO_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Seed for the simulated classifier
    #[arg(long, global = true, env = "COLPO_SEED")]
    seed: Option<u64>,

    /// JSON weights for the placeholder network
    #[arg(long, global = true, env = "COLPO_WEIGHTS")]
    weights: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single image
    Analyze {
        file: PathBuf,

        /// Skip CLAHE enhancement
        #[arg(long)]
        no_enhance: bool,

        /// Classifier backend (model, simulated)
        #[arg(short, long, default_value = "simulated")]
        backend: ClassifierBackend,

        /// Write a PDF report here
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Classify every image in the given files or directories
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "simulated")]
        backend: ClassifierBackend,

        /// Write the full batch report as JSON here
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write a PDF batch report here
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Classify an image with and without enhancement
    Compare {
        file: PathBuf,

        #[arg(short, long, default_value = "simulated")]
        backend: ClassifierBackend,
    },

    /// List the diagnostic classes
    Classes,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    ProcessId::init_cli();
    logging::init_tracing_with_level(Some(&cli.log_level));

    let config = EngineConfig {
        seed: cli.seed,
        weights_path: cli.weights,
        ..EngineConfig::default()
    };
    let engine = || AnalysisEngine::from_config(&config);

    let output = match cli.command {
        Commands::Analyze {
            file,
            no_enhance,
            backend,
            report,
        } => commands::analyze(&engine()?, &file, !no_enhance, backend, report.as_deref())?,
        Commands::Batch {
            inputs,
            backend,
            json,
            report,
        } => commands::batch(&engine()?, &inputs, backend, json.as_deref(), report.as_deref())?,
        Commands::Compare { file, backend } => commands::compare(&engine()?, &file, backend)?,
        Commands::Classes => commands::format_classes(),
    };

    print!("{output}");
    Ok(())
}
