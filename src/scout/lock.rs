use crate::error::ScoutError;
use crate::scout::paths::ScoutPaths;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

/// Exclusive scheduler lock, released when dropped.
#[derive(Debug)]
pub struct SchedulerLock {
    file: File,
    path: PathBuf,
}

impl SchedulerLock {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for SchedulerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Take the scheduler lock or fail fast with [`ScoutError::SchedulerBusy`].
pub fn acquire(paths: &ScoutPaths) -> Result<SchedulerLock> {
    let lock_path = paths.lock_file.clone();
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open scheduler lock {}", lock_path.display()))?;

    match file.try_lock_exclusive() {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::WouldBlock => {
            return Err(ScoutError::SchedulerBusy(lock_path.display().to_string()).into());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to lock {}", lock_path.display()));
        }
    }

    file.set_len(0)
        .with_context(|| format!("failed to truncate scheduler lock {}", lock_path.display()))?;
    writeln!(&mut file, "{}", std::process::id())
        .with_context(|| format!("failed to write scheduler lock {}", lock_path.display()))?;

    Ok(SchedulerLock {
        file,
        path: lock_path,
    })
}
