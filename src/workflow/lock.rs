use crate::errors::{GitumError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "lock";

/// Exclusive lock over the role branches of one repository.
///
/// The lock file is removed on drop, unless the lock was suspended: a
/// conflicted operation keeps holding it until `continue_*` finishes or
/// aborts.
#[derive(Debug)]
pub struct RepoLock {
    _file: File,
    lock_path: PathBuf,
    suspended: bool,
}

impl RepoLock {
    /// Take the lock for a new operation; fails if anyone holds it
    pub fn acquire(metadata_dir: &Path) -> Result<Self> {
        let lock_path = metadata_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => GitumError::precondition(format!(
                    "Another gitum operation holds the repository lock ({}). \
                     Finish it with the matching continue command, or delete the lock file if no operation is running.",
                    lock_path.display()
                )),
                _ => GitumError::config(format!("Failed to acquire lock {lock_path:?}: {e}")),
            })?;

        Self::stamp(file, lock_path)
    }

    /// Take over the lock left behind by a suspended operation
    pub fn reclaim(metadata_dir: &Path) -> Result<Self> {
        let lock_path = metadata_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| GitumError::config(format!("Failed to reclaim lock {lock_path:?}: {e}")))?;

        Self::stamp(file, lock_path)
    }

    fn stamp(mut file: File, lock_path: PathBuf) -> Result<Self> {
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!("Acquired repository lock {:?}", lock_path);
        Ok(Self {
            _file: file,
            lock_path,
            suspended: false,
        })
    }

    /// Keep the lock file past this process
    pub fn suspend(&mut self) {
        self.suspended = true;
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if !self.suspended {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
