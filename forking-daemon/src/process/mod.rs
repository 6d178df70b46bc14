pub mod registry;
pub mod spawner;

pub use registry::{ChildHandle, ChildRegistry, DrainReport};
pub use spawner::WorkerSpawner;
