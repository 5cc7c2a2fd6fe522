use anyhow::Result;

use crate::backup::ArchiveContext;
use crate::backup::lock::instance_lock_path;
use crate::backup::state;
use crate::backup::viewer::list_chats;
use crate::bridge::process;
use crate::commands::CommandReport;

fn epoch_or_never(value: Option<u64>) -> String {
    value.map_or_else(|| "never".to_string(), |v| v.to_string())
}

pub fn run() -> Result<CommandReport> {
    let ctx = ArchiveContext::load()?;
    let paths = &ctx.paths;
    let cfg = &ctx.config;
    let mut report = CommandReport::new("status");

    report.detail(format!("backup_dir={}", paths.backup_dir.display()));
    report.detail(format!("chats_dir={}", paths.chats_dir.display()));
    report.detail(format!("media_dir={}", paths.media_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("session_dir={}", paths.session_dir.display()));
    report.detail(format!("instance_lock={}", instance_lock_path(paths).display()));

    report.detail(format!("config.headless={}", cfg.client.headless));
    report.detail(format!("config.save_groups={}", cfg.archive.save_groups));
    report.detail(format!("config.save_messages={}", cfg.archive.save_messages));
    report.detail(format!("config.save_media={}", cfg.archive.save_media));
    report.detail(format!(
        "config.sync_limit={}",
        cfg.sync
            .fetch_limit()
            .map_or_else(|| "all".to_string(), |l| l.to_string())
    ));
    report.detail(format!("config.sync_pause_ms={}", cfg.sync.pause_ms));
    report.detail(format!("config.sync_from_me_only={}", cfg.sync.from_me_only));
    report.detail(format!("config.sync_on_ready={}", cfg.sync.on_ready));

    report.detail(format!("archived_chats={}", list_chats(paths)?.len()));

    match state::load(paths) {
        Ok(current) => {
            report.detail(format!(
                "state.last_ready_epoch_secs={}",
                epoch_or_never(current.last_ready_epoch_secs)
            ));
            report.detail(format!(
                "state.last_sync_finished_epoch_secs={}",
                epoch_or_never(current.last_sync_finished_epoch_secs)
            ));
            report.detail(format!("state.synced_chats={}", current.synced_chats.len()));
        }
        Err(err) => report.issue(format!("backup state unreadable: {err:#}")),
    }

    match process::resolve_bridge_bin() {
        Ok(bin) => report.detail(format!("bridge_bin={}", bin.display())),
        Err(err) => report.issue(format!("{err:#}")),
    }

    Ok(report)
}
