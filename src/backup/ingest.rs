//! The single entry point every message goes through, live or from history.

use crate::backup::ArchiveContext;
use crate::backup::log::{AppendOutcome, append_record, is_duplicate};
use crate::backup::media::{MediaOutcome, save_media};
use crate::backup::naming::folder_for_chat;
use crate::backup::record::MessageRecord;
use crate::backup::warn::{self, WarnEvent};
use crate::bridge::{Chat, ChatMessage, ChatProvider, is_group_chat_id};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    Appended,
    Duplicate,
    SkippedLastId,
    Disabled,
    SkippedGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStatus {
    None,
    Disabled,
    SkippedGroup,
    Saved(PathBuf),
    AlreadyPresent(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub folder: Option<String>,
    pub log: LogOutcome,
    pub media: MediaStatus,
}

impl IngestOutcome {
    fn skipped_group() -> Self {
        Self {
            folder: None,
            log: LogOutcome::SkippedGroup,
            media: MediaStatus::SkippedGroup,
        }
    }
}

/// Archive one message of a known chat.
///
/// Log write failures are returned; media failures are reported in the
/// outcome so the message itself is still kept.
pub fn archive_message(
    ctx: &ArchiveContext,
    provider: &mut dyn ChatProvider,
    chat: &Chat,
    message: &ChatMessage,
) -> Result<IngestOutcome> {
    let archive = &ctx.config.archive;
    if chat.is_group && !archive.save_groups {
        return Ok(IngestOutcome::skipped_group());
    }

    let folder = folder_for_chat(provider, chat, Some(message));

    let log = if archive.save_messages {
        let log_path = ctx.paths.chat_log_path(&folder);
        if is_duplicate(&log_path, &message.id) {
            LogOutcome::Duplicate
        } else {
            match append_record(&log_path, &MessageRecord::from(message))? {
                AppendOutcome::Appended { .. } => LogOutcome::Appended,
                AppendOutcome::SkippedLastId => LogOutcome::SkippedLastId,
            }
        }
    } else {
        LogOutcome::Disabled
    };

    let media = if !message.has_media {
        MediaStatus::None
    } else if !archive.save_media {
        MediaStatus::Disabled
    } else {
        match save_media(&ctx.paths, &folder, message, provider) {
            Ok(MediaOutcome::Saved(path)) => MediaStatus::Saved(path),
            Ok(MediaOutcome::AlreadyPresent(path)) => MediaStatus::AlreadyPresent(path),
            Err(err) => {
                let err = format!("{err:#}");
                warn::emit(WarnEvent {
                    code: "MEDIA_SAVE_FAILED",
                    stage: "archive",
                    action: "save-media",
                    chat: &folder,
                    message: &message.id,
                    reason: if message.is_view_once {
                        "view-once-media-lost"
                    } else {
                        "skipped-this-pass"
                    },
                    err: &err,
                });
                MediaStatus::Failed(err)
            }
        }
    };

    Ok(IngestOutcome {
        folder: Some(folder),
        log,
        media,
    })
}

/// Archive a message delivered by a live event, resolving its chat first.
pub fn ingest_live_message(
    ctx: &ArchiveContext,
    provider: &mut dyn ChatProvider,
    message: &ChatMessage,
) -> Result<IngestOutcome> {
    let chat = match provider.chat(&message.chat_id) {
        Ok(chat) => chat,
        Err(err) => {
            warn::emit(WarnEvent {
                code: "CHAT_LOOKUP_FAILED",
                stage: "ingest",
                action: "lookup-chat",
                chat: &message.chat_id,
                message: &message.id,
                reason: "using-chat-id",
                err: &format!("{err:#}"),
            });
            Chat {
                id: message.chat_id.clone(),
                name: None,
                is_group: is_group_chat_id(&message.chat_id),
            }
        }
    };
    archive_message(ctx, provider, &chat, message)
}
