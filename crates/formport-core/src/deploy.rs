use crate::config::RunConfig;
use crate::error::{ConvertError, Result};
use crate::io;
use crate::paths;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Target mapping
// ---------------------------------------------------------------------------

/// Map a path under `generated/` to its destination in the target projects:
/// `Models/` go to the shared project, `Controllers/` to the API project,
/// `Views/` and `wwwroot/` to the UI project. Anything else is unmapped and
/// reported rather than guessed at.
pub fn target_for(cfg: &RunConfig, rel: &Path) -> Option<PathBuf> {
    let first = rel.components().next()?.as_os_str().to_str()?;
    match first {
        "Models" => Some(cfg.shared_root.join(rel)),
        "Controllers" => Some(cfg.api_root.join(rel)),
        "Views" | "wwwroot" => Some(cfg.ui_root.join(rel)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Copied,
    SkippedExisting,
    Unmapped,
}

#[derive(Debug)]
pub struct DeployItem {
    pub source: PathBuf,
    pub target: Option<PathBuf>,
    pub action: DeployAction,
}

#[derive(Debug, Default)]
pub struct DeployReport {
    pub items: Vec<DeployItem>,
    pub copied: usize,
    pub skipped: usize,
    pub unmapped: usize,
}

/// Copy an entity's generated files into the target projects.
///
/// Files already present at the target are never overwritten; changing a
/// file that is in place is the merge command's job. With `dry_run` the
/// report says what would happen and nothing is written.
pub fn deploy_entity(cfg: &RunConfig, dry_run: bool) -> Result<DeployReport> {
    let gen_dir = paths::generated_dir(&cfg.output_root, &cfg.entity);
    if !gen_dir.is_dir() {
        return Err(ConvertError::Usage(format!(
            "no generated output for '{}': run the pipeline first",
            cfg.entity
        )));
    }

    let mut report = DeployReport::default();
    for entry in WalkDir::new(&gen_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let source = entry.path().to_path_buf();
        let rel = entry
            .path()
            .strip_prefix(&gen_dir)
            .expect("walk stays under the generated dir");

        match target_for(cfg, rel) {
            None => {
                tracing::debug!(file = %rel.display(), "no deployment target for file");
                report.unmapped += 1;
                report.items.push(DeployItem {
                    source,
                    target: None,
                    action: DeployAction::Unmapped,
                });
            }
            Some(target) => {
                let action = if target.exists() {
                    report.skipped += 1;
                    DeployAction::SkippedExisting
                } else {
                    if !dry_run {
                        io::copy_creating_dirs(&source, &target)?;
                    }
                    tracing::info!(target = %target.display(), dry_run, "deploying file");
                    report.copied += 1;
                    DeployAction::Copied
                };
                report.items.push(DeployItem {
                    source,
                    target: Some(target),
                    action,
                });
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
