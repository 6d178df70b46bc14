pub mod handle;
pub mod service;

pub use handle::ServiceHandle;
pub use service::Supervisor;
