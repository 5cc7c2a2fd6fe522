use crate::backup::paths::BackupPaths;
use crate::error::BackupError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const INSTANCE_LOCK_FILE: &str = "chatkeep.lock";

/// Exclusive advisory lock on a file, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Blocks until the lock is held.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

pub fn instance_lock_path(paths: &BackupPaths) -> PathBuf {
    paths.logs_dir.join(INSTANCE_LOCK_FILE)
}

/// One archiving process per backup dir. The holder's pid is written into the file.
pub fn acquire_instance(paths: &BackupPaths) -> Result<FileLock> {
    let path = instance_lock_path(paths);
    let mut file = open_lock_file(&path)?;

    if file.try_lock_exclusive().is_err() {
        let mut holder = String::new();
        let _ = file.read_to_string(&mut holder);
        let pid = holder.trim();
        return Err(BackupError::InstanceLocked {
            path: path.display().to_string(),
            pid: if pid.is_empty() {
                "unknown".to_string()
            } else {
                pid.to_string()
            },
        }
        .into());
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())
        .with_context(|| format!("failed to write pid into {}", path.display()))?;
    file.flush()?;

    Ok(FileLock { file })
}
