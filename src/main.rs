// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tippool_core::csv_io::{read_shift_rows, read_transaction_rows, write_report};
use tippool_core::diagnostics::Diagnostics;
use tippool_core::{DepartmentRoleClassifier, RawConfig, TipPoolEngine};

/// Allocates pooled tips from a time-clock export and a POS transaction export.
#[derive(Parser, Debug)]
#[command(name = "tippool", version, about)]
struct Cli {
    /// Time-clock shift export (CSV)
    #[arg(long)]
    shifts: PathBuf,

    /// POS transaction export (CSV)
    #[arg(long)]
    transactions: PathBuf,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Slot length in minutes, 2..=60 dividing 1440
    #[arg(long)]
    interval_minutes: Option<String>,

    /// Back-of-house share of each slot, 0..=1
    #[arg(long, allow_hyphen_values = true)]
    boh_ratio: Option<String>,

    /// calendar | shift
    #[arg(long)]
    interval_mode: Option<String>,

    /// full-fallback | strict-ratio
    #[arg(long)]
    policy: Option<String>,

    /// Convert POS timestamps from --source-tz to --target-tz
    #[arg(long)]
    convert_timezone: bool,

    #[arg(long)]
    source_tz: Option<String>,

    #[arg(long)]
    target_tz: Option<String>,

    /// Warn instead of failing when shift and transaction dates do not overlap
    #[arg(long)]
    allow_range_mismatch: bool,

    /// Keep back-to-back punches as separate shifts
    #[arg(long)]
    no_merge: bool,

    /// Employee always treated as an executive (repeatable)
    #[arg(long = "executive")]
    executives: Vec<String>,
}

impl Cli {
    /// Only flags actually given override the environment.
    fn raw_config(&self) -> RawConfig {
        RawConfig {
            interval_minutes: self.interval_minutes.clone(),
            boh_ratio: self.boh_ratio.clone(),
            interval_mode: self.interval_mode.clone(),
            allocation_policy: self.policy.clone(),
            convert_timezone: self.convert_timezone.then_some(true),
            source_tz: self.source_tz.clone(),
            target_tz: self.target_tz.clone(),
            strict_ranges: self.allow_range_mismatch.then_some(false),
            merge_presence: self.no_merge.then_some(false),
            executives: (!self.executives.is_empty()).then(|| self.executives.clone()),
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let env = RawConfig::from_env().context("Failed to read TIPPOOL_* environment settings")?;
    let mut config_diagnostics = Diagnostics::new();
    let config = env
        .overlay(cli.raw_config())
        .resolve(&mut config_diagnostics)
        .context("Invalid configuration")?;
    config_diagnostics.emit();
    info!(
        "Interval {} min, BOH ratio {}, {:?}, {:?}",
        config.interval_minutes, config.boh_ratio.get(), config.interval_mode, config.allocation_policy
    );

    let shift_rows = read_shift_rows(&cli.shifts)
        .with_context(|| format!("Failed to read shifts from {}", cli.shifts.display()))?;
    let transaction_rows = read_transaction_rows(&cli.transactions).with_context(|| {
        format!("Failed to read transactions from {}", cli.transactions.display())
    })?;
    info!(
        "Loaded {} shift rows and {} transaction rows",
        shift_rows.len(),
        transaction_rows.len()
    );

    let classifier = DepartmentRoleClassifier::with_executives(&config.executive_names);
    let engine = TipPoolEngine::new(&config, &classifier);
    let report = engine
        .run(&shift_rows, &transaction_rows)
        .context("Allocation aborted")?;
    report.diagnostics.emit();
    report
        .ensure_trustworthy()
        .context("Refusing to write payouts")?;

    let written = write_report(&cli.output_dir, &report).with_context(|| {
        format!("Failed to write results to {}", cli.output_dir.display())
    })?;
    for path in written {
        info!("  {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
