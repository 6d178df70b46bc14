use clap::Parser;
use forking_core::args::ServiceArgs;
use forking_core::{DaemonSettings, Result, WorkerSettings};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "forking-daemon")]
#[command(about = "Control-socket service that forks workers on request")]
pub struct Cli {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// TOML settings file, layered under FORKING_* environment variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory in which worker directories are created [default: system temp dir]
    #[arg(long)]
    pub child_root: Option<PathBuf>,

    /// Write the daemon pid to this file while running
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Seconds to wait for children after a quit before giving up on them
    #[arg(long, value_parser = parse_seconds)]
    pub children_timeout: Option<Duration>,

    /// Program each worker execs instead of the built-in echo worker
    #[arg(long)]
    pub exec: Option<PathBuf>,

    /// Extra argument for --exec, before the fork argument (repeatable)
    #[arg(long = "exec-arg", requires = "exec", allow_hyphen_values = true)]
    pub exec_args: Vec<String>,
}

impl Cli {
    /// Loads the settings file and environment, then applies explicit flags on top.
    pub fn resolve_settings(&self) -> Result<DaemonSettings> {
        let base = DaemonSettings::load(self.config.as_deref())?;
        Ok(self.apply_to(base))
    }

    fn apply_to(&self, mut settings: DaemonSettings) -> DaemonSettings {
        settings.service = self.service.apply_to(&settings.service);
        if let Some(root) = &self.child_root {
            settings.child_root = root.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            settings.pid_file = Some(pid_file.clone());
        }
        if let Some(timeout) = self.children_timeout {
            settings.timeouts = settings.timeouts.with_wait_for_children(timeout);
        }
        if let Some(program) = &self.exec {
            settings.worker = WorkerSettings::Exec {
                program: program.clone(),
                args: self.exec_args.clone(),
            };
        }
        settings
    }
}

fn parse_seconds(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("{:?} is not a number of seconds", value))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}
