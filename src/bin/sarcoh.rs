use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sarcoh::core::RegionOfInterest;
use sarcoh::io::dimap;
use sarcoh::io::registry::DEFAULT_PATTERN;
use sarcoh::pipeline::{CoherencePipeline, PipelineConfig};
use sarcoh::{AcquisitionFile, ProductRegistry, Subswath};
use serde::Serialize;
use std::path::PathBuf;

/// Staged Sentinel-1 coherence processing
#[derive(Parser, Debug)]
#[command(author, version, about = "Sentinel-1 interferometric coherence pipeline")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline from a JSON configuration
    Run {
        /// Pipeline configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the acquisition search root
        #[arg(long)]
        input_root: Option<PathBuf>,

        /// Override the artifact directory
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Override the region of interest (WKT polygon)
        #[arg(long)]
        roi: Option<RegionOfInterest>,

        /// Sub-swaths to process (repeatable)
        #[arg(long = "subswath")]
        subswaths: Vec<Subswath>,

        /// Recompute every stage even if its artifact exists
        #[arg(long)]
        no_resume: bool,
    },
    /// List the acquisitions a run would pick up
    Discover {
        root: PathBuf,

        #[arg(short, long, default_value = DEFAULT_PATTERN)]
        pattern: String,
    },
    /// Summarize a persisted stage artifact
    Inspect { artifact: PathBuf },
    /// Decode the metadata carried by an acquisition filename
    Parse { filename: String },
}

#[derive(Serialize)]
struct ArtifactSummary {
    name: String,
    product_type: String,
    width: usize,
    height: usize,
    geocoding: String,
    polarizations: Vec<String>,
    subswaths: Vec<String>,
    bands: Vec<String>,
    secondaries: Vec<String>,
    history: Vec<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Run { config, input_root, output_root, roi, subswaths, no_resume } => {
            let mut config = PipelineConfig::from_file(&config)
                .with_context(|| format!("loading configuration {}", config.display()))?;
            if let Some(root) = input_root {
                config.input_root = root;
            }
            if let Some(root) = output_root {
                config.output_root = root;
            }
            if let Some(roi) = roi {
                config.region_of_interest = roi;
            }
            if !subswaths.is_empty() {
                config.subswaths = subswaths;
            }
            if no_resume {
                config.resume = false;
            }

            let report = CoherencePipeline::new(config)?.run().context("pipeline run failed")?;
            print_json(&report)
        }
        Command::Discover { root, pattern } => {
            let files: Vec<AcquisitionFile> = ProductRegistry::discover(&root, &pattern)?;
            print_json(&files)
        }
        Command::Inspect { artifact } => {
            let product = dimap::read_product(&artifact)
                .with_context(|| format!("reading {}", artifact.display()))?;
            let summary = ArtifactSummary {
                geocoding: product.geocoding.to_string(),
                polarizations: product.polarizations().iter().map(|p| p.to_string()).collect(),
                subswaths: product.subswaths().iter().map(|s| s.to_string()).collect(),
                bands: product.band_names(),
                secondaries: product.metadata.secondaries.iter().map(|s| s.product_name.clone()).collect(),
                history: product.metadata.history.clone(),
                name: product.name,
                product_type: product.product_type,
                width: product.width,
                height: product.height,
            };
            print_json(&summary)
        }
        Command::Parse { filename } => {
            let file = AcquisitionFile::parse(&filename)?;
            print_json(&file)
        }
    }
}
