use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use lambda_pruner::{
    config::{ConfigError, DEFAULT_CONFIG_TOML, PrunerConfig},
    observability::init_tracing,
    retention::{RunReport, Runner},
    store::LambdaVersionStore,
};
use tokio_util::sync::CancellationToken;

/// CLI arguments for lambda-pruner
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Delete old AWS Lambda versions that no alias references",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a TOML config file. Command line flags override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Values that override the config file.
///
/// The function name and keep count can also come from the environment
/// variables a GitHub Actions step sets for its `function_name` and
/// `number_to_keep` inputs.
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Function name or ARN
    #[arg(long, global = true, env = "INPUT_FUNCTION_NAME")]
    function_name: Option<String>,

    /// Number of unreferenced versions to keep
    #[arg(long, global = true, env = "INPUT_NUMBER_TO_KEEP")]
    keep: Option<String>,

    /// Maximum delete requests in flight
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Log the planned deletions without deleting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// AWS region
    #[arg(long, global = true)]
    region: Option<String>,

    /// Custom Lambda endpoint (e.g. LocalStack)
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// Overall deadline in seconds (0 = none)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Print the run report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Delete unreferenced versions beyond the retention window (default)
    Prune,
    /// Show what would be deleted without deleting anything
    Plan,
    /// Write a starter configuration file
    Init {
        /// Path to create the config file (defaults to ./lambda-pruner.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => run_init(output, force),
        Some(Command::Plan) => run_prune(args.config.as_deref(), &args.overrides, true).await,
        Some(Command::Prune) | None => {
            run_prune(args.config.as_deref(), &args.overrides, false).await
        }
    }
}

/// Load the config file (if any), apply command line overrides and validate.
fn load_config(
    path: Option<&Path>,
    overrides: &Overrides,
    force_dry_run: bool,
) -> Result<PrunerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => PrunerConfig::from_file(path)?,
        None => PrunerConfig::default(),
    };

    if let Some(name) = &overrides.function_name {
        config.function.name = Some(name.clone());
    }
    if let Some(keep) = &overrides.keep {
        config.set_keep_from_str(keep)?;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.deletion.max_concurrency = concurrency;
    }
    if let Some(region) = &overrides.region {
        config.aws.region = Some(region.clone());
    }
    if let Some(endpoint_url) = &overrides.endpoint_url {
        config.aws.endpoint_url = Some(endpoint_url.clone());
    }
    if let Some(timeout_secs) = overrides.timeout_secs {
        config.run.timeout_secs = timeout_secs;
    }
    config.deletion.dry_run |= overrides.dry_run || force_dry_run;

    config.validate()?;
    Ok(config)
}

/// Run the retention policy once and exit with its verdict.
async fn run_prune(config_path: Option<&Path>, overrides: &Overrides, force_dry_run: bool) {
    // Configuration problems are reported before any AWS call is made
    let config = match load_config(config_path, overrides, force_dry_run) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.observability.logging) {
        eprintln!("Warning: {e}");
    }

    let store = Arc::new(LambdaVersionStore::new(&config.aws).await);
    let runner = match Runner::new(store, &config) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("Shutdown signal received, cancelling run");
        signal_token.cancel();
    });

    let report = match runner.with_cancellation(cancel).run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Retention run failed");
            std::process::exit(1);
        }
    };

    if overrides.json {
        print_report(&report);
    }

    if let Err(e) = report.check() {
        tracing::error!(error = %e, "Retention run failed");
        std::process::exit(1);
    }

    tracing::info!(
        function = %report.function,
        planned = report.decision.len(),
        deleted = report.deleted(),
        dry_run = report.dry_run,
        "Retention run succeeded"
    );
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_report(report: &RunReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize report: {e}");
            std::process::exit(1);
        }
    }
}

/// Create a default configuration file.
fn run_init(output: Option<PathBuf>, force: bool) {
    let output_path = output.unwrap_or_else(|| PathBuf::from("lambda-pruner.toml"));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, DEFAULT_CONFIG_TOML) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("Edit the [function] section, then preview the deletions with:");
    println!("  lambda-pruner plan --config {}", output_path.display());
}
