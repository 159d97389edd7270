//! geolyze - expression dataset analysis CLI
//!
//! Command-line interface for type detection and the bulk and single-cell
//! analysis pipelines.

use clap::{Parser, Subcommand};
use geolyze::config::AnalysisConfig;
use geolyze::data::{AnalysisResult, ExpressionMatrix, SampleMetadata};
use geolyze::detect::detect;
use geolyze::error::{AnalysisError, Result};
use geolyze::pipeline::Analyzer;
use geolyze::worker::{AnalysisJob, JobRunner, LoggingSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Expression dataset analysis
#[derive(Parser)]
#[command(name = "geolyze")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the data type and run the matching pipeline
    Analyze {
        /// Path to expression matrix TSV (features x samples)
        #[arg(short = 'x', long)]
        matrix: PathBuf,

        /// Path to sample metadata (TSV sample sheet or JSON)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Path to analysis configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output path for the JSON result
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the DE table as TSV
        #[arg(long)]
        de_tsv: Option<PathBuf>,

        /// Series accession (e.g. GSE12345); runs as a tracked job
        #[arg(short, long)]
        accession: Option<String>,
    },

    /// Print the data type detection report
    Detect {
        /// Path to expression matrix TSV
        #[arg(short = 'x', long)]
        matrix: PathBuf,

        /// Path to sample metadata (TSV sample sheet or JSON)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write the default configuration as YAML
    ExampleConfig {
        /// Output path for the configuration
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            matrix,
            metadata,
            config,
            output,
            de_tsv,
            accession,
        } => cmd_analyze(
            &matrix,
            metadata.as_deref(),
            config.as_deref(),
            &output,
            de_tsv.as_deref(),
            accession,
        ),

        Commands::Detect {
            matrix,
            metadata,
            format,
        } => cmd_detect(&matrix, metadata.as_deref(), &format),

        Commands::ExampleConfig { output } => cmd_example_config(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_inputs(matrix_path: &Path, metadata_path: Option<&Path>) -> Result<(ExpressionMatrix, SampleMetadata)> {
    eprintln!("Loading data...");
    let matrix = ExpressionMatrix::from_tsv(matrix_path)?;
    let metadata = match metadata_path {
        Some(path) => SampleMetadata::from_path(path)?,
        None => SampleMetadata::new(),
    };
    eprintln!(
        "Loaded {} features x {} samples",
        matrix.n_features(),
        matrix.n_samples()
    );
    Ok((matrix, metadata))
}

/// Run the analysis and write the result
fn cmd_analyze(
    matrix_path: &Path,
    metadata_path: Option<&Path>,
    config_path: Option<&Path>,
    output_path: &Path,
    de_tsv_path: Option<&Path>,
    accession: Option<String>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            eprintln!("Loading configuration from {:?}...", path);
            AnalysisConfig::from_path(path)?
        }
        None => AnalysisConfig::default(),
    };
    let (matrix, metadata) = load_inputs(matrix_path, metadata_path)?;
    let analyzer = Analyzer::new(config);

    let result: AnalysisResult = match accession {
        Some(accession) => {
            let job = AnalysisJob::new(accession.clone(), accession, matrix, metadata)?;
            JobRunner::new(analyzer, Arc::new(LoggingSink)).run(&job)?
        }
        None => analyzer.run(&matrix, &metadata)?,
    };

    eprintln!("Writing results to {:?}...", output_path);
    result.write_json(output_path)?;
    if let Some(path) = de_tsv_path {
        match result.de_results {
            Some(_) => result.write_de_tsv(path)?,
            None => eprintln!("No differential expression table; skipping {:?}", path),
        }
    }

    eprintln!();
    eprintln!("{}", result);
    Ok(())
}

/// Print the detection report
fn cmd_detect(matrix_path: &Path, metadata_path: Option<&Path>, format: &str) -> Result<()> {
    let (matrix, metadata) = load_inputs(matrix_path, metadata_path)?;
    let detection = detect(&matrix, &metadata);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&detection)?),
        "text" => print!("{}", detection),
        other => {
            return Err(AnalysisError::InvalidParameter(format!(
                "Unknown format '{}'. Use 'text' or 'json'.",
                other
            )))
        }
    }
    Ok(())
}

/// Write the default configuration
fn cmd_example_config(output_path: &Path) -> Result<()> {
    let yaml = AnalysisConfig::default().to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote default configuration to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
