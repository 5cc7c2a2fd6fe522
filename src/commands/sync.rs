use anyhow::Result;

use crate::backup::ArchiveContext;
use crate::backup::listener::{ListenOptions, StopReason, run_listener};
use crate::backup::lock;
use crate::bridge::ChatProvider;
use crate::commands::{CommandReport, launch_bridge, report_listen};

pub fn run() -> Result<CommandReport> {
    let ctx = ArchiveContext::load()?;
    let _instance = lock::acquire_instance(&ctx.paths)?;
    let mut report = CommandReport::new("sync");
    report.detail(format!("backup_dir={}", ctx.paths.backup_dir.display()));

    let mut bridge = launch_bridge(&ctx)?;
    let opts = ListenOptions {
        sync_on_ready: true,
        stop_after_sync: true,
    };
    let listened = run_listener(&ctx, &mut bridge, &opts);
    bridge.shutdown()?;
    let listened = listened?;

    report_listen(&mut report, &listened);
    match &listened.stop {
        StopReason::SyncCompleted => report.detail("sync pass completed"),
        StopReason::Disconnected(reason) => {
            report.issue(format!("client disconnected before ready: {reason}"))
        }
        StopReason::StreamClosed => report.issue("bridge exited before the session was ready"),
    }
    Ok(report)
}
