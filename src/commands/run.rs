use anyhow::Result;

use crate::backup::ArchiveContext;
use crate::backup::listener::{ListenOptions, StopReason, run_listener};
use crate::backup::lock;
use crate::bridge::ChatProvider;
use crate::commands::{CommandReport, launch_bridge, report_listen};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub no_sync: bool,
}

/// Archive live traffic until the client disconnects.
///
/// The report always ends with an issue, so the process exits non-zero and a
/// supervisor can restart it.
pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let ctx = ArchiveContext::load()?;
    let _instance = lock::acquire_instance(&ctx.paths)?;
    let mut report = CommandReport::new("run");
    report.detail(format!("backup_dir={}", ctx.paths.backup_dir.display()));

    let mut bridge = launch_bridge(&ctx)?;
    let listen_opts = ListenOptions {
        sync_on_ready: ctx.config.sync.on_ready && !opts.no_sync,
        stop_after_sync: false,
    };
    let listened = run_listener(&ctx, &mut bridge, &listen_opts);
    bridge.shutdown()?;
    let listened = listened?;

    report_listen(&mut report, &listened);
    match listened.stop {
        StopReason::Disconnected(reason) => report.issue(format!("client disconnected: {reason}")),
        StopReason::StreamClosed | StopReason::SyncCompleted => {
            report.issue("bridge event stream closed")
        }
    }
    Ok(report)
}
