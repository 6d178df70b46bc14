use crate::process::registry::ChildHandle;
use crate::runtime::{WorkerStdio, WorkerTask};
use forking_core::fs::{ChildDirAllocator, ChildPaths};
use forking_core::Result;
use log::{error, info};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{close, dup2, fork, ForkResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Exit status of a child whose pipes could not be opened.
pub const CONNECT_FAILED_STATUS: i32 = 126;

/// Exit status of a child whose worker panicked.
pub const PANIC_STATUS: i32 = 101;

/// Turns a validated `fork <n>` into a running, addressable child process.
pub struct WorkerSpawner {
    allocator: ChildDirAllocator,
    worker: Arc<dyn WorkerTask>,
}

impl WorkerSpawner {
    pub fn new(allocator: ChildDirAllocator, worker: Arc<dyn WorkerTask>) -> Self {
        Self { allocator, worker }
    }

    pub fn allocator(&self) -> &ChildDirAllocator {
        &self.allocator
    }

    /// Creates the worker directory and its fifos, then forks.
    ///
    /// The fifos exist before this returns, so the directory can be handed to a
    /// client straight away. The child blocks opening them until a client
    /// attaches to every pipe.
    ///
    /// The child keeps none of the parent's descriptors besides 0, 1 and 2:
    /// no listening sockets, no control connections, no other worker's pipes.
    ///
    /// # Arguments
    ///
    /// * `argument` - Passed to the worker.
    ///
    /// # Returns
    ///
    /// * `Ok(ChildHandle)` in the parent.
    /// * `Err` if the directory, a fifo or the fork failed. No directory is left behind.
    pub fn spawn(&self, argument: i64) -> Result<ChildHandle> {
        let paths = self.allocator.allocate()?;

        // SAFETY: the child only opens files, duplicates descriptors, runs the
        // worker and leaves through `_exit`; it never returns into parent code.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => run_child(&paths, argument, self.worker.as_ref()),
            Ok(ForkResult::Parent { child }) => {
                info!(
                    "Spawner: forked child {} for argument {} at {:?}",
                    child,
                    argument,
                    paths.directory()
                );
                Ok(ChildHandle::new(child, paths, argument))
            }
            Err(e) => {
                error!("Spawner: fork failed: {}", e);
                let _ = paths.remove();
                Err(e.into())
            }
        }
    }
}

fn run_child(paths: &ChildPaths, argument: i64, worker: &dyn WorkerTask) -> ! {
    close_inherited_fds();
    // The parent may route these to a flag; a worker must die on them.
    for sig in [Signal::SIGTERM, Signal::SIGINT] {
        // SAFETY: restoring the default disposition installs no handler code.
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }

    let status = match connect_stdio(paths) {
        Ok(stdio) => panic::catch_unwind(AssertUnwindSafe(|| worker.run(argument, stdio)))
            .unwrap_or(PANIC_STATUS),
        Err(_) => CONNECT_FAILED_STATUS,
    };

    // SAFETY: `_exit` skips the parent's atexit handlers and buffered state,
    // which belong to the supervisor process image.
    unsafe { libc::_exit(status) }
}

/// Fallback ceiling when the descriptor limit is unknown.
const FALLBACK_MAX_FD: RawFd = 1024;

/// Closes every descriptor above stderr.
fn close_inherited_fds() {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: close_range takes plain integers and touches no memory.
        if unsafe { libc::syscall(libc::SYS_close_range, 3u32, u32::MAX, 0u32) } == 0 {
            return;
        }
    }

    // SAFETY: sysconf only reads a system limit.
    let limit = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    let max_fd = RawFd::try_from(limit)
        .ok()
        .filter(|max| *max > 0)
        .unwrap_or(FALLBACK_MAX_FD)
        .min(1 << 16);
    for fd in 3..max_fd {
        let _ = close(fd);
    }
}

/// Opens the fifos in the order clients are expected to: stdin, stdout, stderr.
/// Each open blocks until the other end shows up.
fn connect_stdio(paths: &ChildPaths) -> io::Result<WorkerStdio> {
    let stdin = OpenOptions::new().read(true).open(paths.stdin())?;
    let stdout = OpenOptions::new().write(true).open(paths.stdout())?;
    let stderr = OpenOptions::new().write(true).open(paths.stderr())?;

    redirect(&stdin, libc::STDIN_FILENO)?;
    redirect(&stdout, libc::STDOUT_FILENO)?;
    redirect(&stderr, libc::STDERR_FILENO)?;

    Ok(WorkerStdio {
        stdin,
        stdout,
        stderr,
    })
}

fn redirect(file: &File, target: RawFd) -> io::Result<()> {
    dup2(file.as_raw_fd(), target)?;
    Ok(())
}
