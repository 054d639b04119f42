use crate::error::{ConvertError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File and directory constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "formport.json";
pub const MANIFEST_FILE: &str = "conversion-status.json";
pub const LOCK_FILE: &str = ".formport.lock";

pub const ANALYSIS_DIR: &str = "analysis";
pub const GENERATED_DIR: &str = "generated";

/// Extension suffix appended to a file before it is modified in place.
pub const BACKUP_SUFFIX: &str = ".backup";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Per-entity output directory: `output/{Entity}`.
pub fn entity_dir(output_root: &Path, entity: &str) -> PathBuf {
    output_root.join(entity)
}

pub fn manifest_path(output_root: &Path, entity: &str) -> PathBuf {
    entity_dir(output_root, entity).join(MANIFEST_FILE)
}

pub fn lock_path(output_root: &Path, entity: &str) -> PathBuf {
    entity_dir(output_root, entity).join(LOCK_FILE)
}

pub fn generated_dir(output_root: &Path, entity: &str) -> PathBuf {
    entity_dir(output_root, entity).join(GENERATED_DIR)
}

/// Resolve a step's relative artifact path under the entity directory.
pub fn artifact_path(output_root: &Path, entity: &str, rel: &str) -> PathBuf {
    entity_dir(output_root, entity).join(rel)
}

/// The `.backup` sibling for a target file: `Vendor.cs` → `Vendor.cs.backup`.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut os = target.as_os_str().to_owned();
    os.push(BACKUP_SUFFIX);
    PathBuf::from(os)
}

/// Inverse of [`backup_path`]: the original a backup file belongs to.
/// Returns `None` when the path does not end in the backup suffix.
pub fn original_of(backup: &Path) -> Option<PathBuf> {
    let s = backup.to_str()?;
    s.strip_suffix(BACKUP_SUFFIX).map(PathBuf::from)
}

// ---------------------------------------------------------------------------
// Entity name validation
// ---------------------------------------------------------------------------

static ENTITY_RE: OnceLock<Regex> = OnceLock::new();

fn entity_re() -> &'static Regex {
    ENTITY_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Entity names become C# type names, so they must be plain identifiers.
pub fn validate_entity(entity: &str) -> Result<()> {
    if entity.is_empty() || entity.len() > 128 || !entity_re().is_match(entity) {
        return Err(ConvertError::InvalidEntity(entity.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
