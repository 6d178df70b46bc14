use anyhow::{Context, Result};
use clap::Parser;
use forking_core::fs::PidFile;
use forking_core::logging;
use forking_daemon::cli::Cli;
use forking_daemon::signals::register_termination_signals;
use forking_daemon::{worker_from_settings, Supervisor};
use log::{info, warn};
use std::io::Write;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("info")?;
    info!("=== Forking Service Starting ===");

    let settings = cli
        .resolve_settings()
        .context("Failed to resolve settings")?;
    let worker = worker_from_settings(&settings.worker);

    let supervisor = Supervisor::bind(&settings, worker)
        .with_context(|| format!("Failed to start on {}", settings.service.address()))?;

    // Scripts wait for this exact line to learn an ephemeral port.
    let mut stderr = std::io::stderr();
    writeln!(stderr, "Listening on port: {}", supervisor.sockname().port())?;
    stderr.flush()?;

    let _pid_file = match &settings.pid_file {
        Some(path) => Some(
            PidFile::create(path)
                .with_context(|| format!("Failed to write pid file {}", path.display()))?,
        ),
        None => None,
    };

    register_termination_signals(&supervisor.termination())
        .context("Failed to install signal handlers")?;

    let report = supervisor.run();
    if report.is_clean() {
        info!("All children reaped ({}). Bye.", report.reaped);
    } else {
        let pids: Vec<String> = report
            .remaining
            .iter()
            .map(|child| child.pid().to_string())
            .collect();
        warn!(
            "Gave up waiting for {} children: {}",
            pids.len(),
            pids.join(", ")
        );
    }
    Ok(())
}
