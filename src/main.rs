//! Forensic Wipe CLI
//!
//! Command-line front end for the sanitization protocol. Device
//! discovery and seizure are left to the operator: pass the raw device
//! (or an image file) explicitly.

use clap::{Args, Parser, Subcommand};
use forensic_wipe::{
    analysis::EntropyWatchdog,
    config::{Config, ConfigError},
    device::{BlockDevice, FileDevice},
    metrics::{MetricsError, WipeMetrics},
    progress::TracingSink,
    provider::{HexFileProvider, OsEntropyProvider, RetryingProvider, SecretError, SecretProvider},
    wipe::{audit_rng, random_sector_audit, surface_hash, Stage, WipeError, WipeOrchestrator},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const SECRET_ATTEMPTS: u32 = 3;
const SECRET_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(author, version, about = "Forensically verifiable multi-pass block device sanitization")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full two-pass protocol and issue a certificate.
    Wipe(WipeArgs),
    /// Print the surface hash of a device without writing to it.
    Hash(DeviceArgs),
    /// Run a standalone random sector audit.
    Audit(AuditArgs),
}

#[derive(Args, Debug, Clone)]
struct DeviceArgs {
    /// Raw device or image file.
    #[arg(short, long, value_name = "PATH")]
    device: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct WipeArgs {
    #[command(flatten)]
    target: DeviceArgs,

    /// Confirm that every byte of the device will be destroyed.
    #[arg(long)]
    yes: bool,

    /// Read the root secret from this file instead of the OS CSPRNG.
    #[arg(long, value_name = "PATH")]
    secret_file: Option<PathBuf>,

    /// Write the certificate to this file.
    #[arg(long, value_name = "PATH")]
    certificate: Option<PathBuf>,

    /// Emit the certificate as JSON.
    #[arg(long)]
    json: bool,

    /// Override the number of random audit samples.
    #[arg(long, value_name = "N")]
    samples: Option<u32>,

    /// Print Prometheus metrics when the run ends.
    #[arg(long)]
    metrics: bool,
}

#[derive(Args, Debug, Clone)]
struct AuditArgs {
    #[command(flatten)]
    target: DeviceArgs,

    /// Number of samples.
    #[arg(long, value_name = "N")]
    samples: Option<u32>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("refusing to wipe {0} without --yes")]
    NotConfirmed(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Wipe(#[from] WipeError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode certificate: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CliError {
    fn class(&self) -> &'static str {
        match self {
            CliError::NotConfirmed(_) => "confirmation",
            CliError::Config(_) => "config",
            CliError::Secret(_) => "secret",
            CliError::Wipe(e) => e.class(),
            CliError::Metrics(_) => "metrics",
            CliError::Output { .. } | CliError::Encode(_) => "output",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Forensic Wipe v{}", forensic_wipe::VERSION);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(class = err.class(), "{}", err);
            eprintln!("FATAL [{}]: {}", err.class(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Wipe(args) => {
            if let Some(samples) = args.samples {
                config.audit.samples = samples;
            }
            execute_wipe(config, &args)
        }
        Command::Hash(args) => execute_hash(&config, &args),
        Command::Audit(args) => execute_audit(&config, &args),
    }
}

fn execute_wipe(config: Config, args: &WipeArgs) -> Result<(), CliError> {
    let device = FileDevice::new(&args.target.device);
    if !args.yes {
        return Err(CliError::NotConfirmed(device.identity().to_string()));
    }

    let source: Box<dyn SecretProvider> = match &args.secret_file {
        Some(path) => Box::new(HexFileProvider::new(path)),
        None => Box::new(OsEntropyProvider::new()),
    };
    let mut provider = RetryingProvider::new(source, SECRET_ATTEMPTS, SECRET_RETRY_DELAY);
    info!(provider = provider.name(), "Acquiring root secret");
    let secret = provider.fetch()?;

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Interrupt handler unavailable: {}", e);
    }

    let mut metrics = if args.metrics {
        Some(WipeMetrics::new()?)
    } else {
        None
    };

    let outcome = match metrics.as_mut() {
        Some(metrics) => WipeOrchestrator::new(device, secret, config, (TracingSink, metrics))?
            .with_interrupt(interrupt)
            .run(),
        None => WipeOrchestrator::new(device, secret, config, TracingSink)?
            .with_interrupt(interrupt)
            .run(),
    };

    let rendered = if args.json {
        outcome.certificate.to_json()?
    } else {
        outcome.certificate.render()
    };
    println!("{rendered}");

    if let Some(path) = &args.certificate {
        std::fs::write(path, &rendered).map_err(|source| CliError::Output {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Certificate written");
    }

    if let Some(metrics) = &metrics {
        println!("{}", metrics.encode()?);
    }

    match outcome.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn execute_hash(config: &Config, args: &DeviceArgs) -> Result<(), CliError> {
    let device = FileDevice::new(&args.device);
    let digest = surface_hash(
        &device,
        &config.wipe,
        Stage::PreAudit,
        "SURFACE HASH",
        &mut TracingSink,
    )?;
    println!("{}  {}", digest, device.identity());
    Ok(())
}

fn execute_audit(config: &Config, args: &AuditArgs) -> Result<(), CliError> {
    let device = FileDevice::new(&args.target.device);
    let samples = args.samples.unwrap_or(config.audit.samples);
    let watchdog = EntropyWatchdog::new(config.watchdog.threshold);
    let mut rng = audit_rng(config.audit.rng_seed);

    let summary = random_sector_audit(
        &device,
        &config.audit,
        samples,
        &watchdog,
        &mut rng,
        &mut TracingSink,
    )?;

    println!(
        "average entropy: {}  scored: {}  failed: {}  unreadable: {}",
        summary
            .average_entropy
            .map_or_else(|| "N/A".to_string(), |e| format!("{e:.4}")),
        summary.scored,
        summary.failed,
        summary.locked
    );
    Ok(())
}
