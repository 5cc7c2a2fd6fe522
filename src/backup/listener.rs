use crate::backup::ArchiveContext;
use crate::backup::audit;
use crate::backup::ingest::{LogOutcome, ingest_live_message};
use crate::backup::state;
use crate::backup::sync::{SyncOutcome, run_sync};
use crate::backup::util::now_epoch_secs;
use crate::backup::warn::{self, WarnEvent};
use crate::bridge::{ChatProvider, ClientEvent};
use anyhow::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListenOptions {
    pub sync_on_ready: bool,
    /// Return as soon as the first post-ready sync finishes.
    pub stop_after_sync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    Disconnected(String),
    #[default]
    StreamClosed,
    SyncCompleted,
}

#[derive(Debug, Clone, Default)]
pub struct ListenOutcome {
    pub qr_codes: usize,
    pub ready_events: usize,
    pub client_errors: usize,
    pub messages_seen: usize,
    pub messages_appended: usize,
    pub messages_failed: usize,
    pub syncs: Vec<SyncOutcome>,
    pub stop: StopReason,
}

fn record_ready(ctx: &ArchiveContext) -> Result<()> {
    let mut current = state::load(&ctx.paths)?;
    current.last_ready_epoch_secs = Some(now_epoch_secs()?);
    state::save(&ctx.paths, &current)?;
    audit::append_event(&ctx.paths, "client", "ready", "session ready")
}

fn handle_ready(
    ctx: &ArchiveContext,
    provider: &mut dyn ChatProvider,
    opts: &ListenOptions,
    out: &mut ListenOutcome,
) -> Result<()> {
    out.ready_events += 1;
    record_ready(ctx)?;
    warn::progress("client", "ready");

    if !opts.sync_on_ready {
        return Ok(());
    }

    match run_sync(ctx, provider) {
        Ok(sync) => {
            warn::progress("sync", &sync.summary());
            out.syncs.push(sync);
            Ok(())
        }
        Err(err) if !opts.stop_after_sync => {
            let err = format!("{err:#}");
            warn::emit(WarnEvent {
                code: "SYNC_FAILED",
                stage: "sync",
                action: "list-chats",
                chat: "",
                message: "",
                reason: "continuing-with-live-messages",
                err: &err,
            });
            audit::append_event(&ctx.paths, "sync", "failed", &err)
        }
        Err(err) => Err(err),
    }
}

/// Consume client events until the session ends.
///
/// Live messages that arrive during a sync are delivered afterwards and go
/// through the duplicate filter like everything else.
pub fn run_listener(
    ctx: &ArchiveContext,
    provider: &mut dyn ChatProvider,
    opts: &ListenOptions,
) -> Result<ListenOutcome> {
    let mut out = ListenOutcome::default();

    while let Some(event) = provider.next_event()? {
        match event {
            ClientEvent::Qr { code } => {
                out.qr_codes += 1;
                warn::progress(
                    "client",
                    "pairing required; link this device with the code below",
                );
                eprintln!("{code}");
            }
            ClientEvent::Ready => {
                handle_ready(ctx, provider, opts, &mut out)?;
                if opts.stop_after_sync && opts.sync_on_ready {
                    out.stop = StopReason::SyncCompleted;
                    return Ok(out);
                }
            }
            ClientEvent::Message { message } => {
                out.messages_seen += 1;
                match ingest_live_message(ctx, provider, &message) {
                    Ok(ingested) => {
                        if ingested.log == LogOutcome::Appended {
                            out.messages_appended += 1;
                        }
                    }
                    Err(err) => {
                        out.messages_failed += 1;
                        warn::emit(WarnEvent {
                            code: "ARCHIVE_FAILED",
                            stage: "live",
                            action: "archive-message",
                            chat: &message.chat_id,
                            message: &message.id,
                            reason: "message-not-archived",
                            err: &format!("{err:#}"),
                        });
                    }
                }
            }
            ClientEvent::Error { message } => {
                out.client_errors += 1;
                warn::emit(WarnEvent {
                    code: "CLIENT_ERROR",
                    stage: "client",
                    action: "event",
                    chat: "",
                    message: "",
                    reason: "reported-by-client",
                    err: &message,
                });
                audit::append_event(&ctx.paths, "client", "error", &message)?;
            }
            ClientEvent::Disconnected { reason } => {
                audit::append_event(&ctx.paths, "client", "disconnected", &reason)?;
                out.stop = StopReason::Disconnected(reason);
                return Ok(out);
            }
        }
    }

    audit::append_event(&ctx.paths, "client", "disconnected", "event stream closed")?;
    out.stop = StopReason::StreamClosed;
    Ok(out)
}
