use super::service::Supervisor;
use crate::process::DrainReport;
use crate::runtime::WorkerTask;
use crate::state::{ServiceStatus, StatusCell, TerminationFlag};
use forking_core::{DaemonSettings, Result, ServiceError};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A supervisor running on its own thread.
///
/// The socket is bound before `start` returns, so `sockname()` is immediately
/// usable by clients. Dropping the handle requests termination but does not wait.
pub struct ServiceHandle {
    sockname: SocketAddr,
    termination: TerminationFlag,
    status: StatusCell,
    thread: Option<JoinHandle<DrainReport>>,
    report: Option<DrainReport>,
}

impl ServiceHandle {
    /// Binds on the calling thread, then runs the supervisor in the background.
    pub fn start(settings: &DaemonSettings, worker: Arc<dyn WorkerTask>) -> Result<Self> {
        let supervisor = Supervisor::bind(settings, worker)?;
        let sockname = supervisor.sockname();
        let termination = supervisor.termination();
        let status = supervisor.status();

        let thread = thread::Builder::new()
            .name(format!("supervisor-{}", sockname.port()))
            .spawn(move || supervisor.run())?;
        info!("Supervisor: started on {}", sockname);

        Ok(Self {
            sockname,
            termination,
            status,
            thread: Some(thread),
            report: None,
        })
    }

    pub fn sockname(&self) -> SocketAddr {
        self.sockname
    }

    /// `host:port` for clients.
    pub fn address(&self) -> String {
        self.sockname.to_string()
    }

    pub fn status(&self) -> ServiceStatus {
        self.status.get()
    }

    pub fn termination(&self) -> TerminationFlag {
        self.termination.clone()
    }

    /// Sets the termination flag without waiting. Same effect as a `quit` request.
    pub fn request_stop(&self) {
        if self.termination.request() {
            info!("Supervisor: stop requested on {}", self.sockname);
        }
    }

    /// Requests termination and waits for the supervisor to finish draining.
    ///
    /// Calling it again after success is a no-op.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::StopTimeout)` if the supervisor is still running after
    ///   `timeout`; the thread is kept so the caller may wait again.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.request_stop();
        self.wait(timeout)
    }

    /// Waits for the supervisor to stop on its own (after `quit` or a signal).
    ///
    /// A `timeout` too large to represent as an instant (`Duration::MAX`) waits forever.
    pub fn wait(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        let finished = match &self.thread {
            None => return Ok(()),
            Some(thread) => loop {
                if thread.is_finished() {
                    break true;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    break false;
                }
                thread::sleep(JOIN_POLL_INTERVAL);
            },
        };
        if !finished {
            return Err(ServiceError::StopTimeout(timeout));
        }

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(report) => {
                self.report = Some(report);
                Ok(())
            }
            Err(_) => {
                error!("Supervisor: thread for {} panicked", self.sockname);
                Err(ServiceError::SupervisorPanicked)
            }
        }
    }

    /// The outcome of the drain, once `stop` or `wait` has succeeded.
    pub fn drain_report(&self) -> Option<&DrainReport> {
        self.report.as_ref()
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.request_stop();
        }
    }
}
