//! TPU - Main entry point

use colored::Colorize;
use std::process;
use tpu_cli::config::SERVICE_LOG_LEVEL;
use tpu_cli::{Cli, PipelineConfig, Summary};
use tpu_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tpu_common::Properties;
use tracing::{error, info};

/// Run finished, but some files failed
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    // Optional .env overlay for LOG_* and TPU_CONF
    dotenvy::dotenv().ok();

    let cli = Cli::parse_normalized();

    let props = match Properties::load(&cli.conf) {
        Ok(props) => props,
        Err(e) => {
            eprintln!(
                "{} Could not read '{}': {}",
                "FATAL ERROR:".red().bold(),
                cli.conf.display(),
                e
            );
            process::exit(1);
        }
    };

    let _log_guard = match setup_logging(&cli, &props) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    info!(conf = %cli.conf.display(), "Configuration loaded");

    let config = match PipelineConfig::from_properties(&props) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    match tpu_cli::orchestrator::run(config).await {
        Ok(summary) => {
            print_summary(&summary);
            if !summary.is_success() {
                process::exit(EXIT_PARTIAL_FAILURE);
            }
        }
        Err(e) => fail(&e),
    }
}

fn setup_logging(cli: &Cli, props: &Properties) -> anyhow::Result<tpu_common::logging::LogGuard> {
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        props
            .get(SERVICE_LOG_LEVEL)
            .map(str::parse::<LogLevel>)
            .transpose()?
            .unwrap_or(LogLevel::Info)
    };

    let base = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("tpu")
        .build();

    // Environment variables take precedence
    let config = LogConfig::from_env_with(base)?;
    init_logging(&config)
}

fn fail(err: &tpu_cli::PipelineError) -> ! {
    error!(error = %err, root_cause = %err.root_cause(), "Pipeline failed");
    eprintln!("{} {}", "Error:".red().bold(), err);
    println!("Root cause: {}", err.root_cause());
    process::exit(1);
}

fn print_summary(summary: &Summary) {
    for outcome in &summary.outcomes {
        let item = outcome
            .item
            .as_ref()
            .map(|i| format!(" {}", i))
            .unwrap_or_default();

        match outcome.failure {
            None => println!("{} {}{}", "✓".green(), outcome.phase, item),
            Some(ref failure) => println!(
                "{} {}{}: {}\n    Root cause: {}",
                "✗".red(),
                outcome.phase,
                item,
                failure.message,
                failure.root_cause
            ),
        }
    }

    for warning in &summary.cleanup_warnings {
        println!(
            "{} could not delete {} '{}': {}",
            "!".yellow(),
            warning.entity,
            warning.id,
            warning.message
        );
    }

    for artifact in &summary.artifacts {
        if let Some(ref path) = artifact.path {
            println!("  wrote {} ({} bytes)", path.display(), artifact.bytes);
        }
    }

    println!("{}", summary.headline());
}
