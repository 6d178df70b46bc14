//! Lifecycle state shared between the supervisor and whoever controls it.

use log::info;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// `Created -> Listening -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceStatus {
    Created,
    Listening,
    Draining,
    Stopped,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceStatus::Created => "created",
            ServiceStatus::Listening => "listening",
            ServiceStatus::Draining => "draining",
            ServiceStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Set-once termination request. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag(Arc<AtomicBool>);

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests termination.
    ///
    /// # Returns
    ///
    /// `true` for the call that actually flipped the flag, `false` afterwards.
    pub fn request(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying atomic, for signal handlers that set it directly.
    pub fn shared(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Current [`ServiceStatus`], readable from any thread.
#[derive(Debug, Clone)]
pub struct StatusCell(Arc<Mutex<ServiceStatus>>);

impl Default for StatusCell {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(ServiceStatus::Created)))
    }
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ServiceStatus {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves forward to `next`. Moving backwards or staying put is ignored.
    ///
    /// # Returns
    ///
    /// `true` if the status changed.
    pub fn advance(&self, next: ServiceStatus) -> bool {
        let mut current = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if next <= *current {
            return false;
        }
        info!("Supervisor: {} -> {}", *current, next);
        *current = next;
        true
    }
}
