use crate::dispatcher::CommandDispatcher;
use crate::listener::ControlListener;
use crate::process::{ChildRegistry, DrainReport, WorkerSpawner};
use crate::runtime::WorkerTask;
use crate::state::{ServiceStatus, StatusCell, TerminationFlag};
use forking_core::fs::ChildDirAllocator;
use forking_core::{DaemonSettings, Result, Timeouts};
use forking_protocol::server::is_timeout;
use forking_protocol::{ControlConnection, ControlResponse};
use log::{debug, error, info, warn};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pause after an unexpected accept failure before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The service main loop.
///
/// Owns the control socket and the child registry. Use `Supervisor::bind(...)`
/// to get a listening supervisor and `supervisor.run()` to serve until a
/// termination request, then drain.
pub struct Supervisor {
    listener: ControlListener,
    dispatcher: CommandDispatcher,
    registry: ChildRegistry,
    timeouts: Timeouts,
    termination: TerminationFlag,
    status: StatusCell,
}

impl Supervisor {
    /// Binds the control socket. `created -> listening`.
    ///
    /// # Arguments
    ///
    /// * `settings` - Bind address, timeouts and the root for worker directories.
    /// * `worker` - What forked children run.
    ///
    /// # Returns
    ///
    /// * `Ok(Supervisor)` in the `listening` state.
    /// * `Err(ServiceError::Bind)` if the socket could not be bound. Not retried.
    pub fn bind(settings: &DaemonSettings, worker: Arc<dyn WorkerTask>) -> Result<Self> {
        let status = StatusCell::new();
        let termination = TerminationFlag::new();

        let listener = ControlListener::bind(&settings.service)?;
        let spawner = WorkerSpawner::new(ChildDirAllocator::new(&settings.child_root), worker);
        status.advance(ServiceStatus::Listening);

        Ok(Self {
            listener,
            dispatcher: CommandDispatcher::new(spawner, termination.clone()),
            registry: ChildRegistry::new(),
            timeouts: settings.timeouts,
            termination,
            status,
        })
    }

    pub fn sockname(&self) -> SocketAddr {
        self.listener.sockname()
    }

    /// A handle on the termination flag; setting it makes `run` drain and return.
    pub fn termination(&self) -> TerminationFlag {
        self.termination.clone()
    }

    pub fn status(&self) -> StatusCell {
        self.status.clone()
    }

    /// Serves control connections until termination is requested, then closes
    /// the socket and drains children. `listening -> draining -> stopped`.
    pub fn run(mut self) -> DrainReport {
        info!(
            "Supervisor: serving control connections on {}",
            self.listener.sockname()
        );

        while !self.termination.is_requested() {
            for handle in self.registry.reap_available() {
                debug!("Supervisor: child {} is gone", handle.pid());
            }

            match self.listener.accept_with_timeout(self.timeouts.socket_timeout()) {
                Ok(Some((stream, peer))) => self.serve(stream, peer),
                Ok(None) => {}
                Err(e) => {
                    error!("Supervisor: accept failed: {}", e);
                    thread::sleep(ACCEPT_ERROR_BACKOFF);
                }
            }
        }

        self.status.advance(ServiceStatus::Draining);
        let Supervisor {
            listener,
            mut registry,
            timeouts,
            status,
            ..
        } = self;
        drop(listener);

        let report = registry.drain(timeouts.sleep_for_children(), timeouts.wait_for_children());
        info!(
            "Supervisor: drained, {} reaped, {} left running",
            report.reaped,
            report.remaining.len()
        );
        status.advance(ServiceStatus::Stopped);
        report
    }

    /// One connection, one request, one response.
    fn serve(&mut self, stream: TcpStream, peer: SocketAddr) {
        let mut conn = match ControlConnection::new(stream, self.timeouts.request_timeout()) {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Supervisor: could not set up connection from {}: {}", peer, e);
                return;
            }
        };

        let response = match conn.read_request() {
            Ok(Some(Ok(line))) => {
                debug!("Supervisor: {} sent {:?}", peer, line.trim_end());
                self.dispatcher.dispatch(&line, &mut self.registry)
            }
            Ok(Some(Err(e))) => {
                warn!("Supervisor: unreadable request from {}: {}", peer, e);
                ControlResponse::failure(e)
            }
            Ok(None) => {
                debug!("Supervisor: {} closed without a request", peer);
                return;
            }
            Err(e) if is_timeout(&e) => {
                warn!("Supervisor: no request from {} in time", peer);
                ControlResponse::failure("request timed out")
            }
            Err(e) => {
                warn!("Supervisor: reading from {} failed: {}", peer, e);
                return;
            }
        };

        if let Err(e) = conn.send_response(&response) {
            warn!("Supervisor: replying to {} failed: {}", peer, e);
        }
        conn.close();
    }
}
