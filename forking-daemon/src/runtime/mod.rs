pub mod traits;
pub mod workers;

pub use traits::{WorkerStdio, WorkerTask};
pub use workers::{worker_from_settings, EchoWorker, ExecWorker};
