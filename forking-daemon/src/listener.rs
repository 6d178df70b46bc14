use forking_core::{Result, ServiceConfig, ServiceError};
use log::info;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsFd;
use std::time::Duration;

/// The master control socket.
///
/// Accepts are bounded in time so a single-threaded loop can keep checking
/// its termination flag between connections.
#[derive(Debug)]
pub struct ControlListener {
    listener: TcpListener,
    sockname: SocketAddr,
}

impl ControlListener {
    /// Binds and listens on `config`. Port 0 resolves to an ephemeral port.
    ///
    /// # Returns
    ///
    /// * `Ok(ControlListener)` listening on [`sockname`](Self::sockname).
    /// * `Err(ServiceError::Bind)` if the address is taken or not permitted.
    pub fn bind(config: &ServiceConfig) -> Result<Self> {
        let address = config.address();
        let listener = TcpListener::bind(&address).map_err(|source| ServiceError::Bind {
            address: address.clone(),
            source,
        })?;
        // Readiness from poll can go stale (peer reset before accept); never block in accept.
        listener.set_nonblocking(true)?;
        let sockname = listener.local_addr()?;

        info!("Listener: control socket bound on {}", sockname);
        Ok(Self { listener, sockname })
    }

    /// The address actually bound.
    pub fn sockname(&self) -> SocketAddr {
        self.sockname
    }

    /// Waits at most `timeout` for a connection.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((stream, peer)))` for an accepted connection.
    /// * `Ok(None)` on timeout, on a signal interrupting the wait, or when the
    ///   pending connection vanished before it could be accepted.
    /// * `Err` on any other socket failure.
    pub fn accept_with_timeout(&self, timeout: Duration) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.listener.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) | Err(Errno::EINTR) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }

        match self.listener.accept() {
            Ok(accepted) => Ok(Some(accepted)),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::ConnectionAborted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
