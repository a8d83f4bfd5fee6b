use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Exclusive lock next to the control socket, one per manager instance.
///
/// Holds the owning pid for diagnostics. The lock itself is the `flock`,
/// so a stale file left by a crashed manager does not block a new one.
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        #[cfg(unix)]
        {
            use libc::{LOCK_EX, LOCK_NB, flock};
            let fd = file.as_raw_fd();
            if unsafe { flock(fd, LOCK_EX | LOCK_NB) } != 0 {
                anyhow::bail!("Another manager instance holds {}", path.display());
            }
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        tracing::info!("Acquired lock file: {}", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        tracing::info!("Released lock file {}", self.path.display());
    }
}
