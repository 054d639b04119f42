use crate::config::RunConfig;
use crate::deploy;
use crate::error::{ConvertError, Result};
use crate::io;
use crate::paths;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Targets restored from their backups.
    pub restored: Vec<PathBuf>,
    /// Merge candidates present on disk with no backup to restore.
    pub missing: Vec<PathBuf>,
}

/// Restore one file from its `.backup` sibling, byte for byte, and remove
/// the backup.
pub fn rollback_file(target: &Path) -> Result<()> {
    let backup = paths::backup_path(target);
    if !backup.is_file() {
        return Err(ConvertError::NoBackup(target.to_path_buf()));
    }
    let data = std::fs::read(&backup)?;
    io::atomic_write(target, &data)?;
    std::fs::remove_file(&backup)?;
    tracing::info!(target = %target.display(), "restored from backup");
    Ok(())
}

/// Whether a restored file would belong to `entity`: its name carries the
/// entity prefix (`Vendor.cs`, `VendorController.cs`) or it lives under
/// the entity's view folder (`Views/Vendor/...`).
fn belongs_to_entity(original: &Path, entity: &str) -> bool {
    if original
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(entity))
    {
        return true;
    }
    let comps: Vec<&str> = original
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    comps.windows(2).any(|w| w[0] == "Views" && w[1] == entity)
}

/// Undo the last merge for an entity. Backups are discovered by walking
/// the three deployment roots for `.backup` files, so a rollback works
/// even after the generated tree has been cleaned away.
///
/// Merge candidates that exist without a backup were never modified (or
/// were already rolled back); they are listed, not failed on.
pub fn rollback_entity(cfg: &RunConfig, dry_run: bool) -> Result<RollbackReport> {
    let mut report = RollbackReport::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for root in [&cfg.api_root, &cfg.ui_root, &cfg.shared_root] {
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(original) = paths::original_of(entry.path()) else {
                continue;
            };
            if !belongs_to_entity(&original, &cfg.entity) {
                continue;
            }
            if !seen.insert(original.clone()) {
                continue;
            }
            if !dry_run {
                rollback_file(&original)?;
            }
            report.restored.push(original);
        }
    }

    let gen_dir = paths::generated_dir(&cfg.output_root, &cfg.entity);
    if gen_dir.is_dir() {
        for entry in WalkDir::new(&gen_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&gen_dir)
                .expect("walk stays under the generated dir");
            let Some(target) = deploy::target_for(cfg, rel) else {
                continue;
            };
            if target.is_file() && !seen.contains(&target) && !paths::backup_path(&target).is_file()
            {
                report.missing.push(target);
            }
        }
    }
    Ok(report)
}
