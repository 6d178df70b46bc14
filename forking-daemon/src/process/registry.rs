use forking_core::fs::ChildPaths;
use log::{error, info, warn};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// A live worker: its pid, its pipe directory and the argument it was forked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildHandle {
    pid: Pid,
    paths: ChildPaths,
    argument: i64,
}

impl ChildHandle {
    pub fn new(pid: Pid, paths: ChildPaths, argument: i64) -> Self {
        Self {
            pid,
            paths,
            argument,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn argument(&self) -> i64 {
        self.argument
    }

    pub fn paths(&self) -> &ChildPaths {
        &self.paths
    }

    pub fn directory(&self) -> &Path {
        self.paths.directory()
    }

    pub fn stdin_fifo(&self) -> &Path {
        self.paths.stdin()
    }

    pub fn stdout_fifo(&self) -> &Path {
        self.paths.stdout()
    }

    pub fn stderr_fifo(&self) -> &Path {
        self.paths.stderr()
    }
}

/// Outcome of a drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Children reaped while draining.
    pub reaped: usize,
    /// Children still running when the timeout hit. Their directories are kept.
    pub remaining: Vec<ChildHandle>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Tracks spawned workers and reaps them.
///
/// Owned by the supervisor thread, which is its only writer.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    children: HashMap<Pid, ChildHandle>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: ChildHandle) {
        info!(
            "Reaper: tracking child {} (argument {}) at {:?}",
            handle.pid(),
            handle.argument(),
            handle.directory()
        );
        self.children.insert(handle.pid(), handle);
    }

    pub fn unregister(&mut self, pid: Pid) -> Option<ChildHandle> {
        self.children.remove(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.children.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Non-blocking sweep: collects every child that has exited, removes it
    /// from the registry and deletes its directory.
    ///
    /// # Returns
    ///
    /// The handles of the children reaped by this call.
    pub fn reap_available(&mut self) -> Vec<ChildHandle> {
        let finished: Vec<Pid> = self
            .children
            .keys()
            .copied()
            .filter(|pid| Self::has_exited(*pid))
            .collect();

        finished
            .into_iter()
            .filter_map(|pid| self.children.remove(&pid))
            .inspect(|handle| {
                if let Err(e) = handle.paths().remove() {
                    warn!(
                        "Reaper: failed to remove {:?} of child {}: {}",
                        handle.directory(),
                        handle.pid(),
                        e
                    );
                }
            })
            .collect()
    }

    /// Waits for the registry to empty, polling every `interval`, for at most `timeout`.
    ///
    /// Children are never killed. Whatever is still running at the deadline is
    /// left to the OS and reported back. A `timeout` too large to represent
    /// as an instant means no deadline.
    pub fn drain(&mut self, interval: Duration, timeout: Duration) -> DrainReport {
        let deadline = Instant::now().checked_add(timeout);
        let mut reaped = 0;

        if !self.is_empty() {
            info!(
                "Reaper: waiting up to {:?} for {} children",
                timeout,
                self.len()
            );
        }

        loop {
            reaped += self.reap_available().len();
            if self.is_empty() {
                break;
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            "Reaper: {} children still running after {:?}, giving up",
                            self.len(),
                            timeout
                        );
                        break;
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            thread::sleep(pause);
        }

        DrainReport {
            reaped,
            remaining: self.children.drain().map(|(_, handle)| handle).collect(),
        }
    }

    fn has_exited(pid: Pid) -> bool {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => {
                info!("Reaper: child {} exited with status {}", pid, code);
                true
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                info!("Reaper: child {} killed by {:?}", pid, signal);
                true
            }
            Ok(_) => false,
            Err(Errno::ECHILD) => {
                warn!("Reaper: child {} is not ours to wait for anymore", pid);
                true
            }
            Err(e) => {
                error!("Reaper: waitpid({}) failed: {}", pid, e);
                false
            }
        }
    }
}
