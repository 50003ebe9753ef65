//! registry-warden CLI
//!
//! One invocation performs a single discovery → diff → apply cycle against
//! the Falcon APIs and exits; scheduling is left to cron, Nomad, or
//! whatever runs the binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

mod config;

use config::AppConfig;
use rw_core::notify::{CompositeNotifier, LogNotifier, Notifier, SlackNotifier, WebhookNotifier};
use rw_core::{report, EngineConfig, Reconciler, RunResult};

#[derive(Parser)]
#[command(name = "registry-warden")]
#[command(version)]
#[command(about = "Reconciles discovered ECR registries with Container Security", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./config.yaml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation cycle
    Run {
        /// Compute and report the diff without mutating anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the cleanup stage for this invocation
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Validate configuration and exit
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = if cli.format == OutputFormat::Json {
        rw_observability::logging::LoggingConfig::scheduled()
    } else if cli.verbose {
        rw_observability::logging::LoggingConfig::verbose()
    } else {
        rw_observability::logging::LoggingConfig::default()
    };
    rw_observability::logging::init_logging_with_config(logging);

    match cli.command {
        Commands::Run {
            dry_run,
            no_cleanup,
        } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_run(config, dry_run, no_cleanup, cli.format).await
        }
        Commands::Validate { config: cfg_path } => {
            let path = cfg_path.or(cli.config);
            cmd_validate(path.as_deref())
        }
        Commands::Config { show_secrets } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_config(config, show_secrets, cli.format)
        }
    }
}

/// Loads configuration: an explicit file must parse; otherwise a
/// `config.yaml` in the working directory is used if present, falling back
/// to environment variables alone.
fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => {
            let default = std::path::Path::new("config.yaml");
            if default.exists() {
                AppConfig::load(default)
            } else {
                Ok(AppConfig::from_env())
            }
        }
    }
}

async fn cmd_run(
    config: AppConfig,
    dry_run_override: bool,
    no_cleanup: bool,
    format: OutputFormat,
) -> Result<()> {
    let problems = config.validate();
    if !problems.is_empty() {
        print_problems(&problems);
        std::process::exit(1);
    }

    // Per-invocation overrides never mutate the loaded config's defaults.
    let engine_config = EngineConfig {
        dry_run: dry_run_override || config.settings.dry_run,
        cleanup_enabled: !no_cleanup && config.settings.cleanup_enabled,
        cleanup_offline_days: config.settings.cleanup_offline_days,
        discovery_limit: config.settings.discovery_limit,
    };

    let falcon = rw_connectors::FalconConfig {
        base_url: config.falcon.base_url.clone(),
        client_id: config.falcon.client_id.clone(),
        client_secret: config.falcon.client_secret.clone(),
        timeout_secs: config.falcon.timeout_secs,
    };
    let client = falcon
        .build_client()
        .context("Failed to build Falcon client")?;

    let reconciler = Reconciler::new(
        Arc::new(rw_connectors::FalconAuth::new(client.clone())),
        Arc::new(rw_connectors::FalconAssetInventory::new(client.clone())),
        Arc::new(rw_connectors::FalconCspmAccounts::new(client.clone())),
        Arc::new(rw_connectors::FalconRegistryStore::new(client)),
        engine_config,
    )
    .with_notifier(build_notifier(&config));

    let result = reconciler.run().await;
    print_result(&result, format)?;

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Builds the notification fan-out from configuration. Misconfigured
/// channels are reported and skipped; the run itself never depends on
/// notification delivery.
fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    let mut composite = CompositeNotifier::new().add(LogNotifier);

    if let Some(url) = &config.notifications.slack_webhook_url {
        match SlackNotifier::new(url) {
            Ok(notifier) => composite = composite.add(notifier),
            Err(e) => eprintln!("{}: {}", "Ignoring Slack channel".yellow(), e),
        }
    }
    if let Some(url) = &config.notifications.webhook_url {
        match WebhookNotifier::new(url) {
            Ok(notifier) => composite = composite.add(notifier),
            Err(e) => eprintln!("{}: {}", "Ignoring webhook channel".yellow(), e),
        }
    }

    Arc::new(composite)
}

fn print_result(result: &RunResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", report::render_text(result));
    if result.is_success() {
        println!("{}", "Run completed successfully".green().bold());
    } else {
        println!("{}", "Run completed with errors".red().bold());
        for error in &result.errors {
            println!("  {} {}", "-".red(), error);
        }
    }
    Ok(())
}

fn cmd_validate(path: Option<&std::path::Path>) -> Result<()> {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {:#}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };

    let problems = config.validate();
    if problems.is_empty() {
        println!("{}", "Configuration is valid.".green().bold());
        Ok(())
    } else {
        print_problems(&problems);
        std::process::exit(1);
    }
}

fn print_problems(problems: &[String]) {
    println!("{}", "Configuration problems:".red().bold());
    for problem in problems {
        println!("  {} {}", "-".red(), problem);
    }
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display)?);
    } else {
        println!("{}", "Effective configuration".bold());
        println!("───────────────────────");
        print!("{}", serde_yaml::to_string(&display)?);
    }
    Ok(())
}
