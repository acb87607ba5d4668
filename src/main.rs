use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use stadium_etl::config::Config;
use stadium_etl::error::{Stage, StageFailure};
use stadium_etl::pipeline::Pipeline;
use stadium_etl::{logging, metrics};

#[derive(Parser)]
#[command(name = "stadium_etl")]
#[command(about = "Scrapes the stadium capacity list, geocodes it and writes a CSV")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration; defaults apply when the file is absent
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run extract, transform and load in one process
    Run,
    /// Fetch and parse the source page into a handoff file
    Extract {
        #[arg(long)]
        out: PathBuf,
    },
    /// Geocode and normalize an extract handoff into a transform handoff
    Transform {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write a transform handoff to the configured sink
    Load {
        #[arg(long)]
        input: PathBuf,
    },
}

impl Commands {
    /// Stages this command runs; only their adapters are built
    fn stages(&self) -> &'static [Stage] {
        match self {
            Commands::Run => &Stage::ALL,
            Commands::Extract { .. } => &[Stage::Extract],
            Commands::Transform { .. } => &[Stage::Transform],
            Commands::Load { .. } => &[Stage::Load],
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let stages = cli.command.stages();
    let config = Config::load_for_stages(&cli.config, stages)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let pipeline = Pipeline::for_stages(&config, stages).context("building pipeline adapters")?;

    match cli.command {
        Commands::Run => {
            let result = pipeline.run().await?;
            println!("\n📊 Pipeline results (run {}):", result.run_id);
            println!("   Tables parsed: {}", result.extract.tables);
            println!("   Records: {}", result.load.records);
            println!("   Geocoded: {}", result.enrich.primary_found);
            println!(
                "   Duplicate locations: {} flagged, {} repaired",
                result.enrich.collisions_flagged, result.enrich.collisions_repaired
            );
            println!("   Output: {}", result.load.location);
        }
        Commands::Extract { out } => {
            let stats = pipeline.extract_to(&out).await?;
            info!(records = stats.records, out = %out.display(), "extract finished");
            println!("✅ Extracted {} records to {}", stats.records, out.display());
        }
        Commands::Transform { input, out } => {
            let stats = pipeline.transform_file(&input, &out).await?;
            info!(records = stats.records, out = %out.display(), "transform finished");
            println!("✅ Transformed {} records to {}", stats.records, out.display());
        }
        Commands::Load { input } => {
            let report = pipeline.load_file(&input).await?;
            println!("✅ Loaded {} records to {}", report.records, report.location);
        }
    }
    Ok(())
}

/// Stage failures exit with their stage's code; everything else is a configuration problem
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<StageFailure>()
        .map(|failure| failure.stage.exit_code())
        .unwrap_or(1)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    if let Err(e) = execute(cli).await {
        let code = exit_code(&e);
        error!(exit_code = code, "{:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(code);
    }
}
