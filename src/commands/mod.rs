pub mod run;
pub mod status;
pub mod sync;
pub mod view;

use crate::backup::ArchiveContext;
use crate::backup::listener::ListenOutcome;
use crate::backup::sync::SyncOutcome;
use crate::bridge::process::{self, BridgeLaunch, ProcessBridge};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

pub fn launch_bridge(ctx: &ArchiveContext) -> Result<ProcessBridge> {
    process::spawn(&BridgeLaunch {
        session_dir: ctx.paths.session_dir.clone(),
        headless: ctx.config.client.headless,
    })
}

pub fn report_sync(report: &mut CommandReport, sync: &SyncOutcome) {
    report.detail(format!("sync.chats={}", sync.chats_seen));
    report.detail(format!("sync.chats_synced={}", sync.chats_synced));
    report.detail(format!(
        "sync.chats_skipped_groups={}",
        sync.chats_skipped_groups
    ));
    report.detail(format!("sync.messages={}", sync.messages_seen));
    report.detail(format!("sync.appended={}", sync.messages_appended));
    report.detail(format!("sync.duplicates={}", sync.messages_duplicate));
    report.detail(format!("sync.media_saved={}", sync.media_saved));
    if sync.media_failed > 0 {
        report.detail(format!("sync.media_failed={}", sync.media_failed));
    }
    for failure in &sync.failures {
        report.issue(format!("sync failure: {failure}"));
    }
}

pub fn report_listen(report: &mut CommandReport, listen: &ListenOutcome) {
    report.detail(format!("client.ready_events={}", listen.ready_events));
    report.detail(format!("client.errors={}", listen.client_errors));
    report.detail(format!("live.messages={}", listen.messages_seen));
    report.detail(format!("live.appended={}", listen.messages_appended));
    if listen.messages_failed > 0 {
        report.issue(format!(
            "{} live messages could not be archived",
            listen.messages_failed
        ));
    }
    for sync in &listen.syncs {
        report_sync(report, sync);
    }
}
