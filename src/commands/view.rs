use anyhow::Result;
use std::io;

use crate::backup::paths::resolve_paths;
use crate::backup::viewer::run_viewer;

pub fn run() -> Result<()> {
    let paths = resolve_paths()?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_viewer(&paths, &mut stdin.lock(), &mut stdout.lock())
}
