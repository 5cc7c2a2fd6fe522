use crate::error::BackupError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const MAX_SYNC_PAUSE_MS: u64 = 600_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub headless: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { headless: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub save_groups: bool,
    pub save_messages: bool,
    pub save_media: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            save_groups: true,
            save_messages: true,
            save_media: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-chat history limit; 0 means unbounded.
    pub limit: u64,
    pub pause_ms: u64,
    pub from_me_only: bool,
    pub on_ready: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            pause_ms: 2_000,
            from_me_only: false,
            on_ready: true,
        }
    }
}

impl SyncConfig {
    pub fn fetch_limit(&self) -> Option<usize> {
        if self.limit == 0 {
            None
        } else {
            Some(usize::try_from(self.limit).unwrap_or(usize::MAX))
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackupConfig {
    pub client: ClientConfig,
    pub archive: ArchiveConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialBackupConfig {
    client: Option<ClientConfig>,
    archive: Option<ArchiveConfig>,
    sync: Option<SyncConfig>,
}

fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if ["1", "true", "yes", "on"]
        .iter()
        .any(|v| trimmed.eq_ignore_ascii_case(v))
    {
        return Some(true);
    }
    if ["0", "false", "no", "off"]
        .iter()
        .any(|v| trimmed.eq_ignore_ascii_case(v))
    {
        return Some(false);
    }
    None
}

/// `0`, `all` and `unlimited` lift the limit.
fn parse_limit(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("unlimited") {
        return Some(0);
    }
    trimmed.parse::<u64>().ok()
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => parse_bool(&v).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_limit(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => parse_limit(&v).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn validate(cfg: &BackupConfig) -> Result<()> {
    if cfg.sync.pause_ms > MAX_SYNC_PAUSE_MS {
        return Err(BackupError::InvalidConfig(format!(
            "sync pause {}ms exceeds {}ms",
            cfg.sync.pause_ms, MAX_SYNC_PAUSE_MS
        ))
        .into());
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CHATKEEP_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".config").join("chatkeep").join("config.toml"))
}

fn merge_file_config(base: &mut BackupConfig, raw: &str) -> Result<()> {
    let parsed: PartialBackupConfig =
        toml::from_str(raw).map_err(|err| BackupError::InvalidConfig(err.to_string()))?;
    if let Some(client) = parsed.client {
        base.client = client;
    }
    if let Some(archive) = parsed.archive {
        base.archive = archive;
    }
    if let Some(sync) = parsed.sync {
        base.sync = sync;
    }
    Ok(())
}

fn apply_env(cfg: &mut BackupConfig) {
    cfg.client.headless = env_or_bool("HEADLESS", cfg.client.headless);
    cfg.archive.save_groups = env_or_bool("SAVE_GROUPS", cfg.archive.save_groups);
    cfg.archive.save_messages = env_or_bool("SAVE_MESSAGES", cfg.archive.save_messages);
    cfg.archive.save_media = env_or_bool("SAVE_MEDIA", cfg.archive.save_media);
    cfg.sync.limit = env_or_limit("SYNC_LIMIT", cfg.sync.limit);
    cfg.sync.pause_ms = env_or_u64("SYNC_PAUSE_MS", cfg.sync.pause_ms);
    cfg.sync.from_me_only = env_or_bool("SYNC_FROM_ME_ONLY", cfg.sync.from_me_only);
    cfg.sync.on_ready = env_or_bool("SYNC_ON_READY", cfg.sync.on_ready);
}

pub fn load_config() -> Result<BackupConfig> {
    let mut cfg = BackupConfig::default();
    if let Some(path) = resolve_config_path()
        && path.exists()
    {
        let raw = fs::read_to_string(&path).map_err(|err| {
            BackupError::InvalidConfig(format!("{}: {err}", path.display()))
        })?;
        merge_file_config(&mut cfg, &raw).map_err(|err| {
            BackupError::InvalidConfig(format!("{}: {err:#}", path.display()))
        })?;
    }

    apply_env(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_accepts_numbers_and_unbounded_keywords() {
        assert_eq!(parse_limit("50"), Some(50));
        assert_eq!(parse_limit(" all "), Some(0));
        assert_eq!(parse_limit("Unlimited"), Some(0));
        assert_eq!(parse_limit("lots"), None);
    }

    #[test]
    fn zero_limit_means_unbounded_fetch() {
        let mut sync = SyncConfig::default();
        assert_eq!(sync.fetch_limit(), Some(50));
        sync.limit = 0;
        assert_eq!(sync.fetch_limit(), None);
    }

    #[test]
    fn bool_parsing_rejects_garbage() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn bool_parsing_ignores_case() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" On "), Some(true));
        assert_eq!(parse_bool("OFF"), Some(false));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("False"), Some(false));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let mut cfg = BackupConfig::default();
        merge_file_config(
            &mut cfg,
            "[archive]\nsave_groups = false\n\n[sync]\nlimit = 10\n",
        )
        .expect("merge");

        assert!(!cfg.archive.save_groups);
        assert!(cfg.archive.save_messages);
        assert!(cfg.archive.save_media);
        assert_eq!(cfg.sync.fetch_limit(), Some(10));
        assert_eq!(cfg.sync.pause_ms, 2_000);
        assert!(!cfg.sync.from_me_only);
        assert!(cfg.sync.on_ready);
        assert!(cfg.client.headless);
    }

    #[test]
    fn file_sections_replace_defaults() {
        let mut cfg = BackupConfig::default();
        merge_file_config(
            &mut cfg,
            r#"
[archive]
save_groups = false
save_messages = true
save_media = false

[sync]
limit = 0
pause_ms = 10
from_me_only = true
on_ready = true
"#,
        )
        .expect("merge");

        assert!(!cfg.archive.save_groups);
        assert!(!cfg.archive.save_media);
        assert_eq!(cfg.sync.fetch_limit(), None);
        assert!(cfg.sync.from_me_only);
        assert!(cfg.client.headless);
    }

    #[test]
    fn oversized_pause_is_rejected() {
        let mut cfg = BackupConfig::default();
        cfg.sync.pause_ms = MAX_SYNC_PAUSE_MS + 1;
        assert!(validate(&cfg).is_err());
    }
}
