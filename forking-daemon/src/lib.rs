//! A control-socket service that forks workers on request.
//!
//! Clients connect over TCP and send a single line: `hello`, `quit` or
//! `fork <n>`. Each `fork` creates a private directory holding three named
//! pipes, forks a child whose standard streams are those pipes, and answers
//! with the directory path. On `quit` or a termination signal the service stops
//! accepting and waits a bounded time for its children.

pub mod cli;
pub mod dispatcher;
pub mod listener;
pub mod process;
pub mod runtime;
pub mod signals;
pub mod state;
pub mod supervisor;

pub use dispatcher::CommandDispatcher;
pub use listener::ControlListener;
pub use process::{ChildHandle, ChildRegistry, DrainReport, WorkerSpawner};
pub use runtime::{worker_from_settings, EchoWorker, ExecWorker, WorkerStdio, WorkerTask};
pub use state::{ServiceStatus, StatusCell, TerminationFlag};
pub use supervisor::{ServiceHandle, Supervisor};
