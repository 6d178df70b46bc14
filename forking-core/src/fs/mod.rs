pub mod paths;
pub mod pidfile;

pub use paths::{ChildDirAllocator, ChildPaths, CHILD_DIR_PREFIX};
pub use pidfile::PidFile;
