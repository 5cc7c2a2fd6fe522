pub mod audit;
pub mod config;
pub mod ingest;
pub mod listener;
pub mod lock;
pub mod log;
pub mod media;
pub mod naming;
pub mod paths;
pub mod record;
pub mod state;
pub mod sync;
pub mod util;
pub mod viewer;
pub mod warn;

use crate::backup::config::BackupConfig;
use crate::backup::paths::BackupPaths;

/// Everything a handler needs, built once per command invocation.
#[derive(Debug, Clone)]
pub struct ArchiveContext {
    pub paths: BackupPaths,
    pub config: BackupConfig,
}

impl ArchiveContext {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::load_config()?;
        let paths = paths::resolve_paths()?;
        Ok(Self { paths, config })
    }
}
