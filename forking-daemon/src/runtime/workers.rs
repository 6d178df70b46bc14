use crate::runtime::traits::{WorkerStdio, WorkerTask};
use forking_core::WorkerSettings;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

/// Exit status used when the configured program cannot be executed.
pub const EXEC_FAILED_STATUS: i32 = 127;

/// Reads one line from stdin and acknowledges it with `ok\x01<n>`.
///
/// This is the reference payload the conformance tests talk to.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoWorker;

impl WorkerTask for EchoWorker {
    fn run(&self, argument: i64, stdio: WorkerStdio) -> i32 {
        let mut request = String::new();
        if BufReader::new(stdio.stdin).read_line(&mut request).is_err() {
            return 1;
        }
        let mut stdout = stdio.stdout;
        match write!(stdout, "ok\x01{}\n", argument).and_then(|_| stdout.flush()) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }
}

/// Replaces the child with `program args... <n>`.
///
/// The new image inherits descriptors 0, 1 and 2, i.e. the worker's fifos.
#[derive(Debug, Clone)]
pub struct ExecWorker {
    program: PathBuf,
    args: Vec<String>,
}

impl ExecWorker {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl WorkerTask for ExecWorker {
    fn run(&self, argument: i64, stdio: WorkerStdio) -> i32 {
        // Only returns on failure.
        let err = Command::new(&self.program)
            .args(&self.args)
            .arg(argument.to_string())
            .exec();
        let mut stderr = stdio.stderr;
        let _ = writeln!(stderr, "exec {:?} failed: {}", self.program, err);
        EXEC_FAILED_STATUS
    }
}

/// Builds the worker described by the daemon settings.
pub fn worker_from_settings(settings: &WorkerSettings) -> Arc<dyn WorkerTask> {
    match settings {
        WorkerSettings::Echo => Arc::new(EchoWorker),
        WorkerSettings::Exec { program, args } => Arc::new(ExecWorker::new(program, args.clone())),
    }
}
