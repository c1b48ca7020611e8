mod config;
mod logging;
mod scheduler;
mod workflow;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use extract::FoundryAgentClient;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::workflow::{Process, WorkflowManager};

/// Longest accepted schedule interval, one year in minutes
const MAX_INTERVAL_MINUTES: u64 = 525_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Run the selected process once
    Run,
    /// Run the selected process on a fixed interval
    Schedule,
}

#[derive(Debug, Parser)]
#[command(name = "env-segregation", version, about = "Extract environment data and flag DEV/TEST/PROD segregation deviations")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Run)]
    mode: Mode,

    #[arg(long, value_enum, default_value_t = Process::Env)]
    process: Process,

    /// Minutes between scheduled runs
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MINUTES))]
    interval: u64,

    /// Minutes the schedule stays active, 0 runs until Ctrl-C
    #[arg(long, default_value_t = 60)]
    duration: u64,

    #[arg(long, default_value = "src/data/input")]
    data_dir: PathBuf,

    #[arg(long, default_value = "src/data/output")]
    output_dir: PathBuf,

    #[arg(long, default_value = "environment_data_extraction.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log_file);

    let config = match AppConfig::from_env(cli.data_dir.clone(), cli.output_dir.clone()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<ExitCode> {
    info!(
        endpoint = %config.agent.endpoint,
        model = %config.agent.model_deployment,
        data_dir = %config.data_dir().display(),
        output_dir = %config.output_dir().display(),
        "Configuration loaded"
    );

    let agent = FoundryAgentClient::new(config.foundry_config(), config.retry_policy())
        .context("Failed to build agent client")?;
    let manager = WorkflowManager::new(config, Arc::new(agent));

    match cli.mode {
        Mode::Run => {
            let summary = manager.run(cli.process).await;
            if summary.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        Mode::Schedule => {
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Stop requested, finishing the current run");
                    stop_tx.send(true).ok();
                }
            });

            let report = scheduler::schedule(
                &manager,
                cli.process,
                minutes(cli.interval),
                minutes(cli.duration),
                stop_rx,
            )
            .await;

            info!(
                ticks = report.ticks,
                failures = report.failures,
                stopped_by_signal = report.stopped_by_signal,
                "Schedule finished"
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn minutes(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["env-segregation"]);
        assert_eq!(cli.mode, Mode::Run);
        assert_eq!(cli.process, Process::Env);
        assert_eq!(cli.interval, 5);
        assert_eq!(cli.duration, 60);
        assert_eq!(cli.log_file, PathBuf::from("environment_data_extraction.log"));
    }

    #[test]
    fn test_cli_schedule_all() {
        let cli = Cli::parse_from([
            "env-segregation",
            "--mode",
            "schedule",
            "--process",
            "all",
            "--interval",
            "1",
            "--duration",
            "0",
        ]);
        assert_eq!(cli.mode, Mode::Schedule);
        assert_eq!(cli.process, Process::All);
        assert_eq!(cli.duration, 0);

        assert!(Cli::try_parse_from(["env-segregation", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["env-segregation", "--process", "mainframe"]).is_err());
    }

    #[test]
    fn test_huge_minute_values_do_not_overflow() {
        let cli = Cli::parse_from(["env-segregation", "--duration", "18446744073709551615"]);
        assert_eq!(minutes(cli.duration), Duration::from_secs(u64::MAX));
        assert_eq!(minutes(5), Duration::from_secs(300));

        assert!(Cli::try_parse_from(["env-segregation", "--interval", "525601"]).is_err());
        let cli = Cli::parse_from(["env-segregation", "--interval", "525600"]);
        assert_eq!(minutes(cli.interval), Duration::from_secs(525_600 * 60));
    }
}
