use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::{fs, process};

use crate::error::Result;

/// Prefix of every worker directory name.
pub const CHILD_DIR_PREFIX: &str = "lp-service-child";

pub const STDIN_FIFO: &str = "stdin";
pub const STDOUT_FIFO: &str = "stdout";
pub const STDERR_FIFO: &str = "stderr";

/// Shared by every allocator in the process so two services never hand out the same name.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Layout of a single worker directory: the directory and its three named pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildPaths {
    directory: PathBuf,
    stdin: PathBuf,
    stdout: PathBuf,
    stderr: PathBuf,
}

impl ChildPaths {
    /// Describes the layout under `directory` without touching the filesystem.
    pub fn for_directory(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            stdin: directory.join(STDIN_FIFO),
            stdout: directory.join(STDOUT_FIFO),
            stderr: directory.join(STDERR_FIFO),
            directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn stdin(&self) -> &Path {
        &self.stdin
    }

    pub fn stdout(&self) -> &Path {
        &self.stdout
    }

    pub fn stderr(&self) -> &Path {
        &self.stderr
    }

    /// Creates the three fifos (mode 0600) inside an existing directory.
    ///
    /// # Returns
    ///
    /// * `Ok(())` once all three exist.
    /// * `Err(ServiceError::Sys)` on the first `mkfifo` failure. Already created
    ///   fifos are left for the caller to remove with the directory.
    pub fn create_fifos(&self) -> Result<()> {
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;
        for fifo in [&self.stdin, &self.stdout, &self.stderr] {
            mkfifo(fifo.as_path(), mode)?;
        }
        Ok(())
    }

    /// Removes the directory and everything in it. A missing directory is not an error.
    pub fn remove(&self) -> std::io::Result<()> {
        match fs::remove_dir_all(&self.directory) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Hands out fresh, unique worker directories under a root.
///
/// Names follow `lp-service-child-<pid>-<sequence>`. Creation is exclusive, so
/// a stale directory left by an earlier process with a recycled pid is skipped.
#[derive(Debug, Clone)]
pub struct ChildDirAllocator {
    root: PathBuf,
}

impl ChildDirAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a new worker directory populated with its fifos.
    ///
    /// On any failure nothing is left behind.
    ///
    /// # Returns
    ///
    /// * `Ok(ChildPaths)` describing the ready-to-use layout.
    /// * `Err` if the directory or one of the fifos could not be created.
    pub fn allocate(&self) -> Result<ChildPaths> {
        let paths = self.create_directory()?;
        if let Err(e) = paths.create_fifos() {
            let _ = paths.remove();
            return Err(e);
        }
        Ok(paths)
    }

    fn create_directory(&self) -> Result<ChildPaths> {
        loop {
            let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}-{}-{}", CHILD_DIR_PREFIX, process::id(), sequence);
            let directory = self.root.join(name);
            match fs::create_dir(&directory) {
                Ok(()) => return Ok(ChildPaths::for_directory(directory)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_allocate_creates_three_fifos() {
        let root = tempfile::tempdir().unwrap();
        let allocator = ChildDirAllocator::new(root.path());

        let paths = allocator.allocate().unwrap();

        assert!(paths.directory().starts_with(root.path()));
        for fifo in [paths.stdin(), paths.stdout(), paths.stderr()] {
            let meta = fs::metadata(fifo).unwrap();
            assert!(meta.file_type().is_fifo(), "{:?} is not a fifo", fifo);
        }
        assert_eq!(fs::read_dir(paths.directory()).unwrap().count(), 3);
    }

    #[test]
    fn test_allocate_never_collides() {
        let root = tempfile::tempdir().unwrap();
        let first = ChildDirAllocator::new(root.path());
        let second = ChildDirAllocator::new(root.path());

        let mut seen = HashSet::new();
        for _ in 0..10 {
            assert!(seen.insert(first.allocate().unwrap().directory().to_path_buf()));
            assert!(seen.insert(second.allocate().unwrap().directory().to_path_buf()));
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_allocate_skips_stale_directory() {
        let root = tempfile::tempdir().unwrap();
        let next = SEQUENCE.load(Ordering::Relaxed);
        // Squat a few upcoming names; concurrent tests may advance the counter meanwhile.
        for sequence in next..next + 3 {
            let name = format!("{}-{}-{}", CHILD_DIR_PREFIX, process::id(), sequence);
            fs::create_dir(root.path().join(name)).unwrap();
        }

        let paths = ChildDirAllocator::new(root.path()).allocate().unwrap();
        assert!(fs::metadata(paths.stdin()).unwrap().file_type().is_fifo());
    }

    #[test]
    fn test_allocate_fails_cleanly_without_root() {
        let root = tempfile::tempdir().unwrap();
        let allocator = ChildDirAllocator::new(root.path().join("missing"));

        assert!(allocator.allocate().is_err());
        assert!(!root.path().join("missing").exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let paths = ChildDirAllocator::new(root.path()).allocate().unwrap();

        paths.remove().unwrap();
        assert!(!paths.directory().exists());
        paths.remove().unwrap();
    }
}
