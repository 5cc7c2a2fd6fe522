use crate::backup::paths::BackupPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupState {
    pub schema_version: u32,
    pub last_ready_epoch_secs: Option<u64>,
    pub last_sync_started_epoch_secs: Option<u64>,
    pub last_sync_finished_epoch_secs: Option<u64>,
    pub last_message_epoch_secs: Option<i64>,
    /// Chat id to the epoch of its last completed sync.
    pub synced_chats: BTreeMap<String, u64>,
}

impl Default for BackupState {
    fn default() -> Self {
        Self {
            schema_version: 1,
            last_ready_epoch_secs: None,
            last_sync_started_epoch_secs: None,
            last_sync_finished_epoch_secs: None,
            last_message_epoch_secs: None,
            synced_chats: BTreeMap::new(),
        }
    }
}

impl BackupState {
    pub fn note_message(&mut self, timestamp: i64) {
        self.last_message_epoch_secs = Some(match self.last_message_epoch_secs {
            Some(prev) => prev.max(timestamp),
            None => timestamp,
        });
    }
}

pub fn state_file_path(paths: &BackupPaths) -> PathBuf {
    paths.state_dir.join("backup_state.json")
}

pub fn load(paths: &BackupPaths) -> Result<BackupState> {
    let file = state_file_path(paths);
    if !file.exists() {
        return Ok(BackupState::default());
    }

    let raw =
        fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let parsed: BackupState = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    Ok(parsed)
}

pub fn save(paths: &BackupPaths, state: &BackupState) -> Result<PathBuf> {
    let file = state_file_path(paths);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(state)?;
    fs::write(&file, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_state_loads_default_and_saves_roundtrip() {
        let tmp = tempdir().expect("tempdir");
        let paths = BackupPaths::from_backup_dir(tmp.path());

        let mut state = load(&paths).expect("load");
        assert!(state.synced_chats.is_empty());

        state.synced_chats.insert("1@c.us".to_string(), 42);
        state.note_message(100);
        state.note_message(90);
        save(&paths, &state).expect("save");

        let back = load(&paths).expect("reload");
        assert_eq!(back.synced_chats.get("1@c.us"), Some(&42));
        assert_eq!(back.last_message_epoch_secs, Some(100));
    }
}
