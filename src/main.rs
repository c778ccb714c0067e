//! rf-survey-engine — per-node RF survey agent.
//!
//! Drives an SDR across configured frequency sweeps on a schedule, writes
//! captures to disk, publishes metadata over a message bus, and optionally
//! takes its configuration from a remote fleet controller ("ZMS"). Run
//! `rf-survey-engine --help` for usage.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod metrics_exporter;
mod orchestrator;
mod producer;
mod zms;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.log_dir.as_deref())?;

    let settings = config::AppSettings::from_cli(&cli)?;
    let exit_code = orchestrator::run(settings)?;

    std::process::exit(exit_code);
}

/// Installs the `tracing` subscriber: console output plus, if `log_dir` is
/// set, a daily-rotating file layer (§10.5/§11.5). Returns the
/// `tracing_appender` guard — it must stay alive for the process lifetime or
/// buffered file writes are lost on drop.
fn init_logging(log_dir: Option<&std::path::Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::from_default_env().add_directive("warn".parse()?);

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "rf-survey-engine.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            Ok(None)
        }
    }
}
