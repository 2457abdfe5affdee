// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use star_organize::utils::logging::{format_stat, format_success, format_warning};
use star_organize::{
    Config, DatasetStore, FetchMode, JsonExporter, PipelineOrchestrator, aggregate,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "star_organize")]
#[command(version = "0.1.0")]
#[command(about = "Sync and classify GitHub starred repositories", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Incremental,
}

impl From<ModeArg> for FetchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => FetchMode::Full,
            ModeArg::Incremental => FetchMode::Incremental,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, merge and classify in one pass
    Run {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        #[arg(long)]
        skip_classification: bool,
    },

    /// Fetch and merge without classifying
    Fetch {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Classify whatever is pending in the stored dataset
    Classify,

    /// Print dataset statistics
    Stats,

    /// Export the dataset and aggregate report as JSON
    Export {
        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Remove old dataset backups beyond the configured retention
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    star_organize::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Loading configuration from: {}", cli.config.display());
    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using environment and defaults",
            cli.config.display()
        );
        Config::load(None).context("Failed to load configuration")?
    };

    match cli.command {
        Commands::Run {
            mode,
            skip_classification,
        } => {
            cmd_run(config, mode.map(Into::into), skip_classification).await?;
        }
        Commands::Fetch { mode } => {
            cmd_run(config, mode.map(Into::into), true).await?;
        }
        Commands::Classify => {
            cmd_classify(config).await?;
        }
        Commands::Stats => {
            cmd_stats(&config)?;
        }
        Commands::Export { output, pretty } => {
            cmd_export(&config, output, pretty)?;
        }
        Commands::Cleanup => {
            cmd_cleanup(&config)?;
        }
    }

    Ok(())
}

async fn cmd_run(
    config: Config,
    mode: Option<FetchMode>,
    skip_classification: bool,
) -> Result<()> {
    let orchestrator = PipelineOrchestrator::new(config).context("Failed to build pipeline")?;
    let stats = orchestrator
        .run(mode, skip_classification)
        .await
        .context("Pipeline run failed")?;

    println!(
        "{}",
        format_success(&format!(
            "Sync complete: {} fetched, {} added, {} updated, {} classified",
            stats.fetched, stats.added, stats.updated, stats.classified
        ))
    );

    if stats.classification_failures > 0 {
        println!(
            "{}",
            format_warning(&format!(
                "{} repositories left unclassified, re-run `classify` to retry",
                stats.classification_failures
            ))
        );
    }

    Ok(())
}

async fn cmd_classify(config: Config) -> Result<()> {
    let orchestrator = PipelineOrchestrator::new(config).context("Failed to build pipeline")?;
    let stats = orchestrator
        .classify_only()
        .await
        .context("Classification pass failed")?;

    println!(
        "{}",
        format_success(&format!(
            "Classification complete: {} classified, {} failed",
            stats.classified, stats.classification_failures
        ))
    );
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let store = DatasetStore::new(&config.storage);
    let dataset = store.load().context("Failed to load dataset")?;
    let report = aggregate(&dataset, config.classification.recent_count);

    println!("\nDataset statistics\n{}", "=".repeat(40));
    println!("{}", format_stat("Total repositories", report.total));
    println!("{}", format_stat("Classified", report.classified));
    println!("{}", format_stat("Unclassified", report.unclassified));
    println!(
        "{}",
        format_stat(
            "Classification rate",
            format!("{:.1}%", report.classification_rate)
        )
    );
    println!(
        "{}",
        format_stat("Total stars", format!("{}", report.stars.total))
    );

    if !report.by_category.is_empty() {
        println!("\nBy category");
        for entry in &report.by_category {
            println!("{}", format_stat(&entry.category, entry.count));
        }
    }

    if !report.by_language.is_empty() {
        println!("\nBy language (top 10)");
        for entry in report.by_language.iter().take(10) {
            println!(
                "{}",
                format_stat(
                    &entry.language,
                    format!("{} ({:.1}%)", entry.count, entry.percentage)
                )
            );
        }
    }

    if let Some(last_updated) = report.last_updated {
        println!(
            "\n{}",
            format_stat("Last updated", last_updated.format("%Y-%m-%d %H:%M:%S UTC"))
        );
    }

    Ok(())
}

fn cmd_export(config: &Config, output: PathBuf, pretty: bool) -> Result<()> {
    let store = DatasetStore::new(&config.storage);
    let dataset = store.load().context("Failed to load dataset")?;

    let exporter = JsonExporter::new(output).context("Failed to create export directory")?;
    let manifest = exporter
        .export_all(&dataset, config.classification.recent_count, pretty)
        .context("Export failed")?;

    println!(
        "{}",
        format_success(&format!("Exported {} files", manifest.files.len()))
    );
    Ok(())
}

fn cmd_cleanup(config: &Config) -> Result<()> {
    let store = DatasetStore::new(&config.storage);
    let removed = store
        .cleanup_old_backups()
        .context("Backup cleanup failed")?;

    println!(
        "{}",
        format_success(&format!("Removed {} old backups", removed))
    );
    Ok(())
}
