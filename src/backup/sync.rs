use crate::backup::ArchiveContext;
use crate::backup::audit;
use crate::backup::ingest::{LogOutcome, MediaStatus, archive_message};
use crate::backup::state::{self, BackupState};
use crate::backup::util::now_epoch_secs;
use crate::backup::warn::{self, WarnEvent};
use crate::bridge::{Chat, ChatMessage, ChatProvider, FetchQuery};
use anyhow::Result;
use std::thread;

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub chats_seen: usize,
    pub chats_synced: usize,
    pub chats_skipped_groups: usize,
    pub chats_failed: usize,
    pub messages_seen: usize,
    pub messages_appended: usize,
    pub messages_duplicate: usize,
    pub messages_failed: usize,
    pub media_saved: usize,
    pub media_failed: usize,
    pub failures: Vec<String>,
}

impl SyncOutcome {
    pub fn summary(&self) -> String {
        format!(
            "chats={} synced={} skipped_groups={} failed_chats={} messages={} appended={} duplicates={} failed_messages={} media_saved={} media_failed={}",
            self.chats_seen,
            self.chats_synced,
            self.chats_skipped_groups,
            self.chats_failed,
            self.messages_seen,
            self.messages_appended,
            self.messages_duplicate,
            self.messages_failed,
            self.media_saved,
            self.media_failed
        )
    }
}

/// Providers hand back history newest-first; the archive is written oldest-first.
pub fn chronological(mut newest_first: Vec<ChatMessage>) -> Vec<ChatMessage> {
    newest_first.reverse();
    newest_first
}

fn sync_chat(
    ctx: &ArchiveContext,
    provider: &mut dyn ChatProvider,
    chat: &Chat,
    query: &FetchQuery,
    state: &mut BackupState,
    out: &mut SyncOutcome,
) -> Result<()> {
    let history = provider.fetch_messages(&chat.id, query)?;

    for message in chronological(history) {
        out.messages_seen += 1;
        match archive_message(ctx, provider, chat, &message) {
            Ok(ingested) => {
                match ingested.log {
                    LogOutcome::Appended => {
                        out.messages_appended += 1;
                        state.note_message(message.timestamp);
                    }
                    LogOutcome::Duplicate | LogOutcome::SkippedLastId => {
                        out.messages_duplicate += 1
                    }
                    LogOutcome::Disabled | LogOutcome::SkippedGroup => {}
                }
                match ingested.media {
                    MediaStatus::Saved(_) => out.media_saved += 1,
                    MediaStatus::Failed(_) => out.media_failed += 1,
                    _ => {}
                }
            }
            Err(err) => {
                out.messages_failed += 1;
                let err = format!("{err:#}");
                warn::emit(WarnEvent {
                    code: "ARCHIVE_FAILED",
                    stage: "sync",
                    action: "archive-message",
                    chat: &chat.id,
                    message: &message.id,
                    reason: "continuing-with-next-message",
                    err: &err,
                });
                out.failures
                    .push(format!("chat={} message={} error={err}", chat.id, message.id));
            }
        }
    }
    Ok(())
}

/// Backfill every known chat through the same path as live messages.
///
/// A failed fetch skips that chat for this pass; the remaining chats still run.
pub fn run_sync(ctx: &ArchiveContext, provider: &mut dyn ChatProvider) -> Result<SyncOutcome> {
    let mut state = state::load(&ctx.paths)?;
    state.last_sync_started_epoch_secs = Some(now_epoch_secs()?);

    let chats = provider.chats()?;
    let query = FetchQuery {
        limit: ctx.config.sync.fetch_limit(),
        from_me_only: ctx.config.sync.from_me_only,
    };
    audit::append_event(
        &ctx.paths,
        "sync",
        "started",
        &format!(
            "chats={} limit={} from_me_only={}",
            chats.len(),
            query
                .limit
                .map_or_else(|| "all".to_string(), |l| l.to_string()),
            query.from_me_only
        ),
    )?;

    let mut out = SyncOutcome {
        chats_seen: chats.len(),
        ..SyncOutcome::default()
    };
    let mut first = true;

    for chat in &chats {
        if chat.is_group && !ctx.config.archive.save_groups {
            out.chats_skipped_groups += 1;
            continue;
        }

        if !first {
            thread::sleep(ctx.config.sync.pause());
        }
        first = false;

        warn::progress(
            "sync",
            &format!("chat {} ({})", chat.id, chat.name.as_deref().unwrap_or("-")),
        );
        match sync_chat(ctx, provider, chat, &query, &mut state, &mut out) {
            Ok(()) => {
                out.chats_synced += 1;
                state.synced_chats.insert(chat.id.clone(), now_epoch_secs()?);
            }
            Err(err) => {
                out.chats_failed += 1;
                let err = format!("{err:#}");
                warn::emit(WarnEvent {
                    code: "SYNC_FETCH_FAILED",
                    stage: "sync",
                    action: "fetch-messages",
                    chat: &chat.id,
                    message: "",
                    reason: "skipped-this-pass",
                    err: &err,
                });
                audit::append_event(
                    &ctx.paths,
                    "sync",
                    "degraded",
                    &format!("chat={} error={err}", chat.id),
                )?;
                out.failures.push(format!("chat={} error={err}", chat.id));
            }
        }
    }

    state.last_sync_finished_epoch_secs = Some(now_epoch_secs()?);
    state::save(&ctx.paths, &state)?;

    let status = if out.chats_failed > 0 || out.messages_failed > 0 {
        "degraded"
    } else {
        "ok"
    };
    audit::append_event(&ctx.paths, "sync", status, &out.summary())?;
    Ok(out)
}
