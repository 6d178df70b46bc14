use log::warn;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A file holding the daemon's pid, removed again when dropped.
///
/// The pid is written to a sibling temporary file first and renamed into
/// place, so a reader never observes a half-written pid.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Target file. Parent directories are created if needed.
    ///
    /// # Returns
    ///
    /// * `Ok(PidFile)` guarding the written file.
    /// * `Err` on IO failure.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let mut temp_file = fs::File::create(&temp_path)?;
        writeln!(temp_file, "{}", std::process::id())?;
        temp_file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("PidFile: failed to remove {:?}: {}", self.path, e);
        }
    }
}
