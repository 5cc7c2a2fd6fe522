use crate::backup::paths::BackupPaths;
use crate::bridge::{ChatMessage, ChatProvider};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const VIEW_ONCE_PREFIX: &str = "VIEWONCE_";
pub const FALLBACK_EXTENSION: &str = "bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    Saved(PathBuf),
    AlreadyPresent(PathBuf),
}

/// Extensions for common attachment types where `mime_guess` lists an obscure one first.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("audio/mp4", "m4a"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("image/jpeg", "jpg"),
    ("text/plain", "txt"),
    ("video/quicktime", "mov"),
];

/// Extension for a declared content type such as `audio/ogg; codecs=opus`.
pub fn extension_for_mime(mimetype: &str) -> String {
    let essence = mimetype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(mime, _)| *mime == essence) {
        return (*ext).to_string();
    }
    let Some(extensions) = mime_guess::get_mime_extensions_str(&essence) else {
        return FALLBACK_EXTENSION.to_string();
    };

    let subtype = essence.split('/').nth(1).unwrap_or_default();
    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .map(|ext| (*ext).to_string())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Extension from the mimetype, else from the sender's file name, else `bin`.
pub fn extension_for_payload(mimetype: &str, filename: Option<&str>) -> String {
    let from_mime = extension_for_mime(mimetype);
    if from_mime != FALLBACK_EXTENSION {
        return from_mime;
    }
    filename
        .map(Path::new)
        .and_then(|name| name.extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or(from_mime)
}

/// `[VIEWONCE_]<id>` with path separators neutralized.
pub fn media_file_stem(message: &ChatMessage) -> String {
    let safe_id: String = message
        .id
        .chars()
        .map(|ch| if matches!(ch, '/' | '\\') { '_' } else { ch })
        .collect();
    if message.is_view_once {
        format!("{VIEW_ONCE_PREFIX}{safe_id}")
    } else {
        safe_id
    }
}

/// UTC calendar day of the message, `YYYY-MM-DD`.
pub fn media_day(epoch_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

fn find_existing(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) == Some(stem) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Download and store the media of `message` unless a file for it already exists.
pub fn save_media(
    paths: &BackupPaths,
    folder: &str,
    message: &ChatMessage,
    provider: &mut dyn ChatProvider,
) -> Result<MediaOutcome> {
    let dir = paths.media_dir_for(&media_day(message.timestamp), folder);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let stem = media_file_stem(message);
    if let Some(existing) = find_existing(&dir, &stem)? {
        return Ok(MediaOutcome::AlreadyPresent(existing));
    }

    let payload = provider
        .download_media(message)
        .with_context(|| format!("failed to download media for {}", message.id))?;
    let extension = extension_for_payload(&payload.mimetype, payload.filename.as_deref());
    let target = dir.join(format!("{stem}.{extension}"));
    if target.exists() {
        return Ok(MediaOutcome::AlreadyPresent(target));
    }

    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(&payload.data)?;
    match tmp.persist_noclobber(&target) {
        Ok(_) => Ok(MediaOutcome::Saved(target)),
        Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
            Ok(MediaOutcome::AlreadyPresent(target))
        }
        Err(err) => {
            Err(err.error).with_context(|| format!("failed to write {}", target.display()))
        }
    }
}
