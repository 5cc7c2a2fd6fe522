//! Per-conversation message logs.
//!
//! A log is a single JSON array rewritten in full on each append. Rewrites go
//! through a temp file and rename under an advisory lock, so a crash leaves
//! either the old or the new array on disk, never a torn one.

use crate::backup::lock::FileLock;
use crate::backup::record::MessageRecord;
use crate::backup::util::now_epoch_secs;
use crate::backup::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { total: usize },
    /// The new record repeats the last one in the log.
    SkippedLastId,
}

enum LoadedLog {
    Missing,
    Records(Vec<MessageRecord>),
    Corrupt(String),
    /// The file exists but could not be read; nothing is known about its content.
    Unreadable(std::io::Error),
}

fn load_log(path: &Path) -> LoadedLog {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return LoadedLog::Missing,
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            return LoadedLog::Corrupt(format!("read failed: {err}"));
        }
        Err(err) => return LoadedLog::Unreadable(err),
    };
    if raw.trim().is_empty() {
        return LoadedLog::Records(Vec::new());
    }
    match serde_json::from_str::<Vec<MessageRecord>>(&raw) {
        Ok(records) => LoadedLog::Records(records),
        Err(err) => LoadedLog::Corrupt(format!("parse failed: {err}")),
    }
}

fn warn_corrupt(path: &Path, action: &str, reason: &str, err: &str) {
    warn::emit(WarnEvent {
        code: "LOG_UNREADABLE",
        stage: "log",
        action,
        chat: &path.display().to_string(),
        message: "",
        reason,
        err,
    });
}

fn lock_path_for(log_path: &Path) -> PathBuf {
    log_path.with_extension("json.lock")
}

/// Move an unparsable log aside so the next rewrite does not destroy it.
fn quarantine(log_path: &Path) -> Result<PathBuf> {
    let target = log_path.with_extension(format!("json.corrupt-{}", now_epoch_secs()?));
    fs::rename(log_path, &target).with_context(|| {
        format!(
            "failed to move {} to {}",
            log_path.display(),
            target.display()
        )
    })?;
    Ok(target)
}

fn write_log(log_path: &Path, records: &[MessageRecord]) -> Result<()> {
    let parent = log_path
        .parent()
        .with_context(|| format!("log path has no parent: {}", log_path.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(log_path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", log_path.display()))?;
    Ok(())
}

/// Records in `log_path`; empty when the file is missing or unreadable.
pub fn read_log(log_path: &Path) -> Vec<MessageRecord> {
    match load_log(log_path) {
        LoadedLog::Missing => Vec::new(),
        LoadedLog::Records(records) => records,
        LoadedLog::Corrupt(err) => {
            warn_corrupt(log_path, "read-log", "treated-as-empty", &err);
            Vec::new()
        }
        LoadedLog::Unreadable(err) => {
            warn_corrupt(log_path, "read-log", "treated-as-empty", &err.to_string());
            Vec::new()
        }
    }
}

pub fn is_duplicate(log_path: &Path, message_id: &str) -> bool {
    read_log(log_path).iter().any(|r| r.id == message_id)
}

pub fn append_record(log_path: &Path, record: &MessageRecord) -> Result<AppendOutcome> {
    let parent = log_path
        .parent()
        .with_context(|| format!("log path has no parent: {}", log_path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let _guard = FileLock::acquire(&lock_path_for(log_path))?;

    let mut records = match load_log(log_path) {
        LoadedLog::Missing => Vec::new(),
        LoadedLog::Records(records) => records,
        LoadedLog::Corrupt(err) => {
            let moved = quarantine(log_path)?;
            warn_corrupt(
                log_path,
                "append-record",
                &format!("moved-to-{}", moved.display()),
                &err,
            );
            Vec::new()
        }
        LoadedLog::Unreadable(err) => {
            return Err(err).with_context(|| format!("failed to read {}", log_path.display()));
        }
    };

    if records.last().is_some_and(|last| last.id == record.id) {
        return Ok(AppendOutcome::SkippedLastId);
    }

    records.push(record.clone());
    write_log(log_path, &records)?;
    Ok(AppendOutcome::Appended {
        total: records.len(),
    })
}
