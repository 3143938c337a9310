use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use screw_synth::batch::{run_batch, summarize_batch, BatchOptions, BatchPlan, DEFAULT_SEED};
use screw_synth::config::Configuration;
use screw_synth::io::{create_timestamped_output_dir, write_batch};
use screw_synth::logging::{init_logging, LogConfig, LogFormat, LogLevel};

#[derive(Debug, Parser)]
#[command(name = "screw-synth")]
#[command(about = "Synthetic screw-driving run generator")]
struct Cli {
    /// Parameter file; falls back to configs/default.toml, then built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "output-screw-synth")]
    outdir: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Generate only the mixed preview set (`number_of_ok_to_plot`, `amount_to_plot`)
    #[arg(long, default_value_t = false)]
    preview: bool,

    /// Write the built-in parameter file to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Filter directive, e.g. `screw_synth::batch=debug`; replaces --log-level
    #[arg(long)]
    log_filter: Option<String>,

    #[arg(long, default_value_t = false)]
    log_source_location: bool,

    #[arg(long, default_value_t = false)]
    log_thread_names: bool,

    /// Debug-level pretty logs with source locations and thread names
    #[arg(long, default_value_t = false)]
    dev_logging: bool,
}

fn log_config(cli: &Cli) -> LogConfig {
    let base = if cli.dev_logging {
        LogConfig::development()
    } else {
        LogConfig {
            level: cli.log_level,
            format: cli.log_format,
            ..LogConfig::default()
        }
    };
    LogConfig {
        source_location: base.source_location || cli.log_source_location,
        thread_names: base.thread_names || cli.log_thread_names,
        filter: cli.log_filter.clone(),
        ..base
    }
}

fn resolve_default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("configs").join("default.toml");
    if local.exists() {
        return Some(local);
    }

    let bundled = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("configs")
        .join("default.toml");
    bundled.exists().then_some(bundled)
}

fn load_config(path: Option<&Path>) -> Result<Configuration> {
    let Some(path) = path else {
        tracing::info!("no parameter file found, using built-in defaults");
        return Ok(Configuration::default());
    };
    tracing::info!(path = %path.display(), "loading parameter file");
    Configuration::from_toml_file(path)
        .with_context(|| format!("failed to load parameter file {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&log_config(&cli));

    if let Some(path) = &cli.write_default_config {
        Configuration::default()
            .save_toml_file(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote default parameters to {}", path.display());
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(resolve_default_config_path);
    let config = load_config(config_path.as_deref())?;

    let mut options = BatchOptions::default().with_seed(cli.seed.unwrap_or(DEFAULT_SEED));
    if cli.sequential {
        options = options.sequential();
    }
    if cli.preview {
        options = options.with_plan(BatchPlan::preview_from_config(&config));
    }

    let result = run_batch(&config, &options).context("batch generation failed")?;
    let summary = summarize_batch(&result);

    let run_dir = create_timestamped_output_dir(&cli.outdir).with_context(|| {
        format!(
            "failed to create run directory under {}",
            cli.outdir.display()
        )
    })?;
    write_batch(&run_dir, &result, &summary)
        .with_context(|| format!("failed to write batch into {}", run_dir.display()))?;
    config
        .save_toml_file(&run_dir.join("parameters.toml"))
        .context("failed to record parameters")?;

    println!(
        "{} observations written to {} ({} failed)",
        summary.succeeded,
        run_dir.display(),
        summary.failed
    );
    Ok(())
}
