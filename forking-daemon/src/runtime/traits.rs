use std::fs::File;

/// The three ends a forked child talks through, already opened on its fifos
/// and duplicated onto descriptors 0, 1 and 2.
#[derive(Debug)]
pub struct WorkerStdio {
    pub stdin: File,
    pub stdout: File,
    pub stderr: File,
}

/// The payload a forked child runs.
///
/// Implement this for whatever a worker should do once its pipes are
/// connected. `run` executes inside the child process after `fork`, so it must
/// not touch locks that another parent thread could have been holding: no
/// logging, no shared state beyond what was captured before the fork. The only
/// descriptors open in the child are its three pipes.
pub trait WorkerTask: Send + Sync {
    /// Runs the worker and returns the child's exit status.
    ///
    /// # Arguments
    ///
    /// * `argument` - The integer from the `fork <n>` request.
    /// * `stdio` - The worker's connected pipes.
    fn run(&self, argument: i64, stdio: WorkerStdio) -> i32;
}

impl<F> WorkerTask for F
where
    F: Fn(i64, WorkerStdio) -> i32 + Send + Sync,
{
    fn run(&self, argument: i64, stdio: WorkerStdio) -> i32 {
        self(argument, stdio)
    }
}
