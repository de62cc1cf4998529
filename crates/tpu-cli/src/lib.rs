//! Task Processing Unit
//!
//! Batch driver for a remote metadata-management service: files from a watch
//! folder are provisioned as data models, ingested, transformed by the
//! mappings of one or more projects and exported.
//!
//! # Overview
//!
//! - **Configuration**: [`config::PipelineConfig`], built from a properties file
//! - **Remote client**: [`api::RemoteServiceClient`] and its HTTP implementation
//! - **Phases**: Init, Ingest, Transform, Export ([`phases`])
//! - **Worker pool**: bounded barrier execution ([`pool::WorkerPool`])
//! - **Orchestration**: strategy selection, sequencing and cleanup ([`orchestrator`])
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod phases;
pub mod pool;
pub mod summary;
pub mod watch_folder;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{PipelineError, Result, ServiceError};
pub use orchestrator::Orchestrator;
pub use summary::Summary;

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Default location of the properties file
pub const DEFAULT_CONF: &str = "conf/config.properties";

/// TPU - Task Processing Unit
#[derive(Parser, Debug)]
#[command(name = "tpu")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Properties file with the pipeline configuration
    #[arg(long, env = "TPU_CONF", default_value = DEFAULT_CONF)]
    pub conf: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse arguments, accepting the single-dash `-conf=<path>` form as well
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrite `-conf=<path>` and `-conf <path>` into `--conf`
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s) if s == "-conf" || s.starts_with("-conf=") => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_legacy_conf_flag() {
        let cli = Cli::parse_from(normalize_args(args(&["tpu", "-conf=/etc/tpu.properties"])));
        assert_eq!(cli.conf, PathBuf::from("/etc/tpu.properties"));

        let cli = Cli::parse_from(normalize_args(args(&["tpu", "-conf", "a.properties", "-v"])));
        assert_eq!(cli.conf, PathBuf::from("a.properties"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_default_conf() {
        if std::env::var_os("TPU_CONF").is_some() {
            return;
        }
        let cli = Cli::parse_from(args(&["tpu"]));
        assert_eq!(cli.conf, PathBuf::from(DEFAULT_CONF));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_other_args_untouched() {
        let normalized = normalize_args(args(&["tpu", "--conf=x", "-v", "-config"]));
        assert_eq!(normalized, args(&["tpu", "--conf=x", "-v", "-config"]));
    }
}
