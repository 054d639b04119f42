pub mod deploy;
pub mod init;
pub mod merge;
pub mod rollback;
pub mod run;
pub mod status;
pub mod steps;

use anyhow::Context;
use formport_core::cancel::CancelToken;
use formport_core::config::{FileConfig, RunConfig, WarnLevel};
use std::path::Path;

/// Load the project config, honouring the global `--config` override.
pub fn load_file_config(root: &Path, config: Option<&Path>) -> anyhow::Result<FileConfig> {
    match config {
        Some(path) => FileConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => FileConfig::load(root).context("failed to load formport.json"),
    }
}

/// Print validation findings on stderr and refuse to continue past hard
/// errors. Warnings never block.
pub fn report_config_warnings(cfg: &RunConfig) -> anyhow::Result<()> {
    let warnings = cfg.validate();
    for w in &warnings {
        let prefix = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("[{prefix}] {}", w.message);
    }
    if RunConfig::has_errors(&warnings) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

/// Flip `cancel` when the user hits Ctrl-C, from a thread of its own so
/// both async pipeline passes and blocking prompt loops observe it. A
/// second interrupt exits on the spot.
pub fn watch_interrupts(cancel: CancelToken) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(_) => return,
        };
        rt.block_on(async {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            eprintln!("\ninterrupt received; stopping at the next safe point (press again to exit now)");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
    });
}

/// Render a path relative to `base` when it sits under it.
pub fn display_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}
