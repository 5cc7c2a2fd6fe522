use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "messages.json";

#[derive(Debug, Clone)]
pub struct BackupPaths {
    pub backup_dir: PathBuf,
    pub chats_dir: PathBuf,
    pub media_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub state_dir: PathBuf,
    pub session_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

impl BackupPaths {
    pub fn from_backup_dir(backup_dir: &Path) -> Self {
        Self {
            backup_dir: backup_dir.to_path_buf(),
            chats_dir: backup_dir.join("chats"),
            media_dir: backup_dir.join("media"),
            logs_dir: backup_dir.join("logs"),
            state_dir: backup_dir.join("state"),
            session_dir: backup_dir.join("session"),
        }
    }

    pub fn chat_dir(&self, folder: &str) -> PathBuf {
        self.chats_dir.join(folder)
    }

    pub fn chat_log_path(&self, folder: &str) -> PathBuf {
        self.chat_dir(folder).join(LOG_FILE_NAME)
    }

    /// `media/<YYYY-MM-DD>/<folder>`
    pub fn media_dir_for(&self, day: &str, folder: &str) -> PathBuf {
        self.media_dir.join(day).join(folder)
    }
}

pub fn resolve_paths() -> Result<BackupPaths> {
    let backup_dir = match env_path("BACKUP_DIR") {
        Some(dir) => dir,
        None => required_home_dir()?.join("chatkeep/backup"),
    };

    let mut paths = BackupPaths::from_backup_dir(&backup_dir);
    if let Some(session_dir) = env_path("CHATKEEP_SESSION_DIR") {
        paths.session_dir = session_dir;
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_backup_dir() {
        let paths = BackupPaths::from_backup_dir(Path::new("/data/backup"));
        assert_eq!(
            paths.chat_log_path("Alice"),
            PathBuf::from("/data/backup/chats/Alice/messages.json")
        );
        assert_eq!(
            paths.media_dir_for("2024-03-01", "Alice"),
            PathBuf::from("/data/backup/media/2024-03-01/Alice")
        );
    }
}
