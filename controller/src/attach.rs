use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;

/// Connects the local terminal to a forked worker's pipes.
///
/// The pipes are opened in the order the worker opens them (stdin, stdout,
/// stderr), otherwise both sides block forever. Returns once the worker has
/// closed its stdout and stderr.
pub fn attach(directory: &Path) -> Result<()> {
    let (to_worker, from_stdout, from_stderr) = open_pipes(directory)?;

    // Detached: local stdin may never reach EOF.
    thread::spawn(move || relay(io::stdin(), to_worker));
    let errors = thread::spawn(move || relay(from_stderr, io::stderr()));
    relay(from_stdout, io::stdout()).context("Failed to relay worker stdout")?;

    errors
        .join()
        .map_err(|_| anyhow::anyhow!("stderr relay panicked"))?
        .context("Failed to relay worker stderr")?;
    Ok(())
}

fn open_pipes(directory: &Path) -> Result<(File, File, File)> {
    let open_read = |name: &str| {
        let path = directory.join(name);
        File::open(&path).with_context(|| format!("Failed to open {}", path.display()))
    };

    let stdin_path = directory.join("stdin");
    let stdin = OpenOptions::new()
        .write(true)
        .open(&stdin_path)
        .with_context(|| format!("Failed to open {}", stdin_path.display()))?;
    let stdout = open_read("stdout")?;
    let stderr = open_read("stderr")?;
    Ok((stdin, stdout, stderr))
}

fn relay(mut from: impl Read, mut to: impl Write) -> io::Result<u64> {
    let copied = io::copy(&mut from, &mut to)?;
    to.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;

    #[test]
    fn test_pipes_open_in_worker_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["stdin", "stdout", "stderr"] {
            mkfifo(&dir.path().join(name), Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        }

        let path = dir.path().to_path_buf();
        let worker = thread::spawn(move || {
            let mut stdin = File::open(path.join("stdin")).unwrap();
            let mut stdout = OpenOptions::new().write(true).open(path.join("stdout")).unwrap();
            let stderr = OpenOptions::new().write(true).open(path.join("stderr")).unwrap();

            let mut line = [0u8; 6];
            stdin.read_exact(&mut line).unwrap();
            stdout.write_all(b"ok\x013\n").unwrap();
            drop(stderr);
            line
        });

        let (mut to_worker, mut from_stdout, mut from_stderr) = open_pipes(dir.path()).unwrap();
        to_worker.write_all(b"hello\n").unwrap();

        let mut out = Vec::new();
        relay(&mut from_stdout, &mut out).unwrap();
        let mut err = Vec::new();
        relay(&mut from_stderr, &mut err).unwrap();

        assert_eq!(&worker.join().unwrap(), b"hello\n");
        assert_eq!(out, b"ok\x013\n");
        assert!(err.is_empty());
    }
}
