use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context;
use clap::Parser;
use log::info;

use forensic_lens::{
    AnalysisConfig, BatchOrchestrator, BatchSummary, find_images, report::write_reports,
};

#[derive(Parser)]
#[command(name = "forensic-lens")]
#[command(about = "Batch image forensics: digests, perceptual hashes, ELA and LSB heuristics")]
#[command(version)]
struct Cli {
    /// Image file or directory to scan recursively
    #[arg(short, long, required = true)]
    input: PathBuf,

    /// Directory for the reports and ELA images
    #[arg(short, long, default_value = "forensic_results")]
    out: PathBuf,

    /// JPEG quality used for the ELA round-trip (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Amplification applied to ELA differences
    #[arg(long)]
    scale: Option<f64>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Per-image timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip writing ELA difference images
    #[arg(long)]
    no_ela_images: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn analysis_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(quality) = self.quality {
            config = config.with_ela_quality(quality);
        }
        if let Some(scale) = self.scale {
            config = config.with_visualization_scale(scale);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Some(Duration::from_secs(secs)));
        }
        if self.no_ela_images {
            config.persist_ela = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    // RUST_LOG, when set, overrides the -v level
    builder.parse_default_env();
    builder.init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.analysis_config()?;

    let images = find_images(&cli.input)?;
    if images.is_empty() {
        eprintln!("No images found under {}", cli.input.display());
        return Ok(ExitCode::FAILURE);
    }
    info!("Found {} image(s) under {}", images.len(), cli.input.display());

    let digests = config.digests.clone();
    let results = BatchOrchestrator::new(config)?
        .with_output_dir(&cli.out)
        .run(&images)?;

    let paths = write_reports(&cli.out, &results, &digests)
        .with_context(|| format!("writing reports to {}", cli.out.display()))?;

    let summary = BatchSummary::from_results(&results);
    println!(
        "Processed {} image(s): {} completed, {} failed, {} suspicious. Report: {}",
        summary.total,
        summary.completed,
        summary.failed,
        summary.suspicious,
        paths.csv.display()
    );

    Ok(ExitCode::SUCCESS)
}
