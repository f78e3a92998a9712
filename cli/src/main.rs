//! Command-line driver for the job-search experiment.
//!
//! ```text
//! main() -> load config -> run | check
//!                           |
//!                           v
//!             sim::run (one task per participant) -> SessionReport (JSON on stdout)
//! ```
//!
//! Logs go to stderr, or to `--log-file` when given, filtered by `RUST_LOG`.

mod report;
mod sim;

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

use search_config::ExperimentFile;

use crate::report::SessionReport;

#[derive(Debug, Parser)]
#[command(name = "search-experiment")]
#[command(about = "Run simulated sessions of the job-search experiment")]
struct Cli {
    /// Config file (defaults to $SEARCH_EXPERIMENT_CONFIG, then ~/.search-experiment/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a full session and print the report as JSON
    Run {
        /// Override the number of participants
        #[arg(long)]
        participants: Option<u32>,
        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },
    /// Validate the configuration and print it as JSON
    Check,
}

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
        return;
    };

    match open_log_file(path) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %path.display(), "Logging initialized");
        }
        Err(err) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(env_filter)
                .init();
            tracing::warn!(path = %path.display(), "Failed to open log file, using stderr: {err}");
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Fold command-line overrides into the loaded file and re-check it.
fn apply_overrides(
    file: &mut ExperimentFile,
    participants: Option<u32>,
    seed: Option<u64>,
) -> Result<()> {
    if let Some(participants) = participants {
        file.simulation.participants = participants;
    }
    if seed.is_some() {
        file.simulation.seed = seed;
    }
    file.validate()
        .context("command-line overrides conflict with the configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref());

    let mut file =
        ExperimentFile::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Check => {
            println!("{}", serde_json::to_string_pretty(&file)?);
        }
        Command::Run {
            participants,
            seed,
            pretty,
        } => {
            apply_overrides(&mut file, participants, seed)?;
            let session_id = Uuid::new_v4();
            let started_at = Utc::now();
            tracing::info!(
                %session_id,
                treatment = %file.experiment.treatment(),
                participants = file.simulation.participants,
                "Starting session"
            );
            let summary = sim::run(&file)
                .await
                .with_context(|| format!("session {session_id} aborted"))?;
            let report = SessionReport::new(session_id, started_at, file.simulation.seed, summary);
            println!("{}", report.to_json(pretty)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_types::{ExperimentConfig, Treatment};

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "search-experiment",
            "--config",
            "lab.toml",
            "run",
            "--participants",
            "8",
            "--seed",
            "3",
            "--pretty",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("lab.toml")));
        match cli.command {
            Command::Run {
                participants,
                seed,
                pretty,
            } => {
                assert_eq!(participants, Some(8));
                assert_eq!(seed, Some(3));
                assert!(pretty);
            }
            Command::Check => panic!("expected run"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["search-experiment", "check", "--log-file", "out.log"]).unwrap();
        assert_eq!(cli.log_file.as_deref(), Some(Path::new("out.log")));
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn overrides_are_validated() {
        let mut file = ExperimentFile {
            experiment: ExperimentConfig::builder()
                .treatment(Treatment::Team)
                .build()
                .unwrap(),
            ..ExperimentFile::default()
        };
        assert!(apply_overrides(&mut file, Some(3), None).is_err());
        apply_overrides(&mut file, Some(6), Some(9)).unwrap();
        assert_eq!(file.simulation.participants, 6);
        assert_eq!(file.simulation.seed, Some(9));
    }

    #[test]
    fn log_file_parents_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("session.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn report_serializes_with_metadata() {
        let mut file = ExperimentFile {
            experiment: ExperimentConfig::builder().num_rounds(2).build().unwrap(),
            ..ExperimentFile::default()
        };
        file.simulation.seed = Some(5);
        let summary = sim::run(&file).await.unwrap();
        let report = SessionReport::new(Uuid::nil(), Utc::now(), Some(5), summary);
        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
        assert_eq!(json["session_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["seed"], 5);
        assert_eq!(json["summary"]["participants"].as_array().unwrap().len(), 4);
    }
}
